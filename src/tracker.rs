//! Correlates connection, statement, and result-set lifecycles with spans.
//!
//! The tracker is a state machine over a three-level resource hierarchy,
//! keyed by opaque ids supplied by the instrumented provider. Contexts live
//! in concurrent maps; membership is the state. Every operation tolerates
//! missing context silently: driver callbacks race arbitrarily against
//! application-level close calls, so "context already gone" is an expected
//! interleaving rather than an error. Spans are held in take-once cells,
//! so a span reachable from two places (a result set is tracked from both its
//! connection and, when resolvable, its statement) still finishes exactly
//! once no matter which close event arrives first, or whether one never
//! arrives at all.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::TracingConfig;
use crate::tracer::{Span, SpanKind, Tracer};

pub const SPAN_CONNECTION_SUFFIX: &str = "/connection";
pub const SPAN_QUERY_SUFFIX: &str = "/query";
pub const SPAN_FETCH_SUFFIX: &str = "/fetch";

pub const SPAN_SQL_TAG: &str = "sql";
pub const SPAN_ROW_COUNT_TAG: &str = "row.count";
pub const SPAN_ERROR_TAG: &str = "error";

/// A span that can be finished at most once.
///
/// Cloning the `Arc` shares the cell; whichever holder takes the span first
/// performs the real finish, every later attempt is a no-op.
struct SpanCell {
    inner: Mutex<Option<Box<dyn Span>>>,
}

impl SpanCell {
    fn start(tracer: &dyn Tracer, name: &str) -> Arc<Self> {
        let span = tracer.start_span(name);
        span.kind(SpanKind::Client);
        Arc::new(Self {
            inner: Mutex::new(Some(span)),
        })
    }

    fn tag(&self, key: &str, value: &str) {
        if let Some(span) = self.inner.lock().as_deref() {
            span.tag(key, value);
        }
    }

    fn tag_error<E: Display>(&self, error: Option<&E>) {
        if let Some(error) = error {
            self.tag(SPAN_ERROR_TAG, &error.to_string());
        }
    }

    fn annotate(&self, event: &str) {
        if let Some(span) = self.inner.lock().as_deref() {
            span.annotate(event);
        }
    }

    fn finish(&self) {
        if let Some(span) = self.inner.lock().take() {
            span.finish();
        }
    }
}

struct StatementContext<R> {
    span: Option<Arc<SpanCell>>,
    result_sets: DashMap<R, Arc<SpanCell>>,
}

struct ConnectionContext<S, R> {
    span: Option<Arc<SpanCell>>,
    statements: DashMap<S, StatementContext<R>>,
    result_sets: DashMap<R, Arc<SpanCell>>,
}

/// The resource lifecycle state machine.
///
/// Generic over the three key types so front ends can use whatever identity
/// the underlying interception technique preserves (object ids, pool-assigned
/// strings). Keys are unique among live resources and may be reused after
/// close.
///
/// All operations are synchronous, bounded-time, and safe to call from any
/// thread; a single connection may be driven from several threads and closed
/// from a thread other than the one that opened it.
pub struct LifecycleTracker<C, S, R> {
    connections: DashMap<C, ConnectionContext<S, R>>,
    tracer: Arc<dyn Tracer>,
    config: TracingConfig,
}

impl<C, S, R> LifecycleTracker<C, S, R>
where
    C: Eq + Hash,
    S: Eq + Hash,
    R: Eq + Hash + Clone,
{
    pub fn new(tracer: Arc<dyn Tracer>, config: TracingConfig) -> Self {
        Self {
            connections: DashMap::new(),
            tracer,
            config,
        }
    }

    /// Number of connections currently tracked. Introspection only.
    pub fn tracked_connections(&self) -> usize {
        self.connections.len()
    }

    /// Connection acquisition is starting. The context is stored whether or
    /// not a span was created; an empty context still tracks the connection
    /// so statement and fetch events can attach to it.
    pub fn before_acquire(&self, connection: C, name: &str) {
        let span = self
            .config
            .trace_connection
            .then(|| SpanCell::start(self.tracer.as_ref(), &format!("{name}{SPAN_CONNECTION_SUFFIX}")));
        self.connections.insert(
            connection,
            ConnectionContext {
                span,
                statements: DashMap::new(),
                result_sets: DashMap::new(),
            },
        );
    }

    /// Connection acquisition finished. On failure the just-created context
    /// is discarded and its span finished immediately; no connection
    /// lifecycle follows a failed acquire.
    pub fn after_acquire<E: Display>(&self, connection: &C, error: Option<&E>) {
        if error.is_none() {
            return;
        }
        if let Some((_, context)) = self.connections.remove(connection) {
            if let Some(span) = context.span {
                span.tag_error(error);
                span.finish();
            }
        }
    }

    /// A statement is about to execute. No-op if the connection is no longer
    /// tracked (closed between prepare and execute, which is a legal race).
    pub fn before_query(&self, connection: &C, statement: S, name: &str) {
        let Some(conn) = self.connections.get(connection) else {
            return;
        };
        let span = self
            .config
            .trace_query
            .then(|| SpanCell::start(self.tracer.as_ref(), &format!("{name}{SPAN_QUERY_SUFFIX}")));
        conn.statements.insert(
            statement,
            StatementContext {
                span,
                result_sets: DashMap::new(),
            },
        );
    }

    /// Best-effort row count tag on the statement span; silently ignored if
    /// either context is gone.
    pub fn add_query_row_count(&self, connection: &C, statement: &S, row_count: u64) {
        let Some(conn) = self.connections.get(connection) else {
            return;
        };
        let Some(stmt) = conn.statements.get(statement) else {
            return;
        };
        if let Some(span) = &stmt.span {
            span.tag(SPAN_ROW_COUNT_TAG, &row_count.to_string());
        }
    }

    /// Statement execution finished: tag and finish the statement span. The
    /// statement context stays in place since result sets produced by this
    /// statement may still be pending; removal happens on explicit close.
    pub fn after_query<E: Display>(
        &self,
        connection: &C,
        statement: &S,
        sql: &str,
        error: Option<&E>,
    ) {
        let Some(conn) = self.connections.get(connection) else {
            return;
        };
        let Some(stmt) = conn.statements.get(statement) else {
            return;
        };
        if let Some(span) = &stmt.span {
            span.tag(SPAN_SQL_TAG, sql);
            span.tag_error(error);
            span.finish();
        }
    }

    /// First row fetch on a result set opens its span; subsequent calls for
    /// the same key are no-ops. The span is tracked under the connection
    /// and, when the owning statement is resolvable, under that statement
    /// too; whichever ancestor closes first will finish it.
    pub fn before_result_set_next(
        &self,
        connection: &C,
        statement: Option<&S>,
        result_set: R,
        name: &str,
    ) {
        if !self.config.trace_fetch {
            return;
        }
        let Some(conn) = self.connections.get(connection) else {
            return;
        };
        let span = match conn.result_sets.entry(result_set.clone()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(slot) => {
                let span =
                    SpanCell::start(self.tracer.as_ref(), &format!("{name}{SPAN_FETCH_SUFFIX}"));
                slot.insert(span.clone());
                span
            }
        };
        // The statement that produced this result set is not always the one
        // being tracked; a lookup miss here just leaves the span tracked
        // from the connection end only.
        if let Some(statement) = statement {
            if let Some(stmt) = conn.statements.get(statement) {
                stmt.result_sets.insert(result_set, span);
            }
        }
    }

    /// Result set closed: tag and finish its span. No-op if the span was
    /// already finished through an ancestor's close, or never opened.
    pub fn after_result_set_close<E: Display>(
        &self,
        connection: &C,
        result_set: &R,
        row_count: Option<u64>,
        error: Option<&E>,
    ) {
        let Some(conn) = self.connections.get(connection) else {
            return;
        };
        let Some((_, span)) = conn.result_sets.remove(result_set) else {
            return;
        };
        if let Some(row_count) = row_count {
            span.tag(SPAN_ROW_COUNT_TAG, &row_count.to_string());
        }
        span.tag_error(error);
        span.finish();
    }

    /// Statement closed: drop its context and finish every result-set span
    /// still hanging off it (a result set whose own close was never observed
    /// must not leak). Double close is legal and a no-op.
    pub fn after_statement_close(&self, connection: &C, statement: &S) {
        let Some(conn) = self.connections.get(connection) else {
            return;
        };
        let Some((_, context)) = conn.statements.remove(statement) else {
            return;
        };
        let StatementContext { span, result_sets } = context;
        for (key, cell) in result_sets {
            // Also unlink from the connection so a late result-set close
            // becomes a plain no-op.
            conn.result_sets.remove(&key);
            cell.finish();
        }
        if let Some(span) = span {
            span.finish();
        }
    }

    /// Transaction committed: annotate the connection span, which stays
    /// open until the connection closes.
    pub fn after_commit<E: Display>(&self, connection: &C, error: Option<&E>) {
        self.annotate_connection(connection, "commit", error);
    }

    /// Transaction rolled back: annotate the connection span.
    pub fn after_rollback<E: Display>(&self, connection: &C, error: Option<&E>) {
        self.annotate_connection(connection, "rollback", error);
    }

    fn annotate_connection<E: Display>(&self, connection: &C, event: &str, error: Option<&E>) {
        let Some(conn) = self.connections.get(connection) else {
            return;
        };
        if let Some(span) = &conn.span {
            span.tag_error(error);
            span.annotate(event);
        }
    }

    /// Connection closed: drop the whole context and finish everything that
    /// is still open under it: result-set spans first, then statement
    /// spans, then the connection's own span. Double close is legal and a
    /// no-op.
    pub fn after_connection_close<E: Display>(&self, connection: &C, error: Option<&E>) {
        let Some((_, context)) = self.connections.remove(connection) else {
            return;
        };
        let ConnectionContext {
            span,
            statements,
            result_sets,
        } = context;
        for (_, cell) in result_sets {
            cell.finish();
        }
        for (_, statement) in statements {
            let StatementContext { span, result_sets } = statement;
            for (_, cell) in result_sets {
                cell.finish();
            }
            if let Some(cell) = span {
                cell.finish();
            }
        }
        if let Some(cell) = span {
            cell.tag_error(error);
            cell.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DbError;
    use crate::tracer::test_support::RecordingTracer;

    type Tracker = LifecycleTracker<u64, u64, u64>;

    const NO_ERR: Option<&DbError> = None;

    fn tracker(tracer: &Arc<RecordingTracer>) -> Tracker {
        LifecycleTracker::new(tracer.clone(), TracingConfig::default())
    }

    fn open_connection(tracker: &Tracker, conn: u64) {
        tracker.before_acquire(conn, "db");
        tracker.after_acquire(&conn, NO_ERR);
    }

    #[test]
    fn full_lifecycle_produces_three_finished_spans() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        tracker.after_query(&1, &10, "SELECT 1", NO_ERR);
        tracker.before_result_set_next(&1, Some(&10), 100, "db");
        tracker.before_result_set_next(&1, Some(&10), 100, "db");
        tracker.after_result_set_close(&1, &100, Some(1), NO_ERR);
        tracker.after_statement_close(&1, &10);
        tracker.after_connection_close(&1, NO_ERR);

        let spans = tracer.spans();
        assert_eq!(spans.len(), 3);
        let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["db/connection", "db/query", "db/fetch"]);
        for span in &spans {
            assert_eq!(*span.kind.lock(), Some(SpanKind::Client));
            assert!(span.tag_value(SPAN_ERROR_TAG).is_none());
        }
        let query = tracer.span_named("db/query").unwrap();
        assert_eq!(query.tag_value(SPAN_SQL_TAG).as_deref(), Some("SELECT 1"));
        let fetch = tracer.span_named("db/fetch").unwrap();
        assert_eq!(fetch.tag_value(SPAN_ROW_COUNT_TAG).as_deref(), Some("1"));
        tracer.assert_all_finished_once();
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn connection_closed_before_children_cascades() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        tracker.after_query(&1, &10, "SELECT 1", NO_ERR);
        tracker.before_result_set_next(&1, Some(&10), 100, "db");
        tracker.after_connection_close(&1, NO_ERR);

        assert_eq!(tracer.spans().len(), 3);
        tracer.assert_all_finished_once();

        // Late closes for resources the cascade already finished.
        tracker.after_result_set_close(&1, &100, Some(5), NO_ERR);
        tracker.after_statement_close(&1, &10);
        tracer.assert_all_finished_once();
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn statement_close_finishes_unclosed_result_set() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        tracker.after_query(&1, &10, "SELECT 1", NO_ERR);
        tracker.before_result_set_next(&1, Some(&10), 100, "db");
        tracker.after_statement_close(&1, &10);

        let fetch = tracer.span_named("db/fetch").unwrap();
        assert_eq!(fetch.finish_count(), 1);

        // The result set's own close arrives late and must be a no-op.
        tracker.after_result_set_close(&1, &100, Some(3), NO_ERR);
        assert_eq!(fetch.finish_count(), 1);
        assert!(fetch.tag_value(SPAN_ROW_COUNT_TAG).is_none());

        tracker.after_connection_close(&1, NO_ERR);
        tracer.assert_all_finished_once();
    }

    #[test]
    fn double_close_is_a_noop_at_every_level() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        tracker.after_query(&1, &10, "SELECT 1", NO_ERR);
        tracker.before_result_set_next(&1, Some(&10), 100, "db");

        tracker.after_result_set_close(&1, &100, None, NO_ERR);
        tracker.after_result_set_close(&1, &100, None, NO_ERR);
        tracker.after_statement_close(&1, &10);
        tracker.after_statement_close(&1, &10);
        tracker.after_connection_close(&1, NO_ERR);
        tracker.after_connection_close(&1, NO_ERR);

        tracer.assert_all_finished_once();
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn events_for_unknown_connection_leave_no_state() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        tracker.before_query(&9, 10, "db");
        tracker.add_query_row_count(&9, &10, 4);
        tracker.after_query(&9, &10, "SELECT 1", NO_ERR);
        tracker.before_result_set_next(&9, Some(&10), 100, "db");
        tracker.after_result_set_close(&9, &100, None, NO_ERR);
        tracker.after_statement_close(&9, &10);
        tracker.after_commit(&9, NO_ERR);
        tracker.after_rollback(&9, NO_ERR);
        tracker.after_connection_close(&9, NO_ERR);

        assert!(tracer.spans().is_empty());
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn failed_acquire_finishes_connection_span_with_error() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        tracker.before_acquire(1, "db");
        tracker.after_acquire(&1, Some(&DbError::new("pool exhausted")));

        let span = tracer.span_named("db/connection").unwrap();
        assert_eq!(span.finish_count(), 1);
        assert_eq!(
            span.tag_value(SPAN_ERROR_TAG).as_deref(),
            Some("pool exhausted")
        );
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn commit_and_rollback_annotate_without_finishing() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.after_commit(&1, NO_ERR);
        tracker.after_rollback(&1, Some(&DbError::new("deadlock detected")));

        let span = tracer.span_named("db/connection").unwrap();
        assert!(!span.is_finished());
        assert_eq!(span.annotations.lock().as_slice(), ["commit", "rollback"]);
        assert_eq!(
            span.tag_value(SPAN_ERROR_TAG).as_deref(),
            Some("deadlock detected")
        );

        tracker.after_connection_close(&1, NO_ERR);
        tracer.assert_all_finished_once();
    }

    #[test]
    fn row_count_is_best_effort() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        tracker.add_query_row_count(&1, &10, 7);
        tracker.after_query(&1, &10, "UPDATE t SET x = 1", NO_ERR);

        let query = tracer.span_named("db/query").unwrap();
        assert_eq!(query.tag_value(SPAN_ROW_COUNT_TAG).as_deref(), Some("7"));

        tracker.after_statement_close(&1, &10);
        // Statement context is gone; tagging is silently dropped.
        tracker.add_query_row_count(&1, &10, 9);
        assert_eq!(query.tag_value(SPAN_ROW_COUNT_TAG).as_deref(), Some("7"));

        tracker.after_connection_close(&1, NO_ERR);
    }

    #[test]
    fn query_error_is_tagged_before_finish() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        tracker.after_query(&1, &10, "SELECT boom", Some(&DbError::new("syntax error")));

        let query = tracer.span_named("db/query").unwrap();
        assert_eq!(query.finish_count(), 1);
        assert_eq!(
            query.tag_value(SPAN_ERROR_TAG).as_deref(),
            Some("syntax error")
        );

        tracker.after_statement_close(&1, &10);
        tracker.after_connection_close(&1, NO_ERR);
        tracer.assert_all_finished_once();
    }

    #[test]
    fn disabled_levels_track_contexts_without_spans() {
        let tracer = RecordingTracer::new();
        let config = TracingConfig::new()
            .with_connection_tracing(false)
            .with_query_tracing(false)
            .with_fetch_tracing(false);
        let tracker: Tracker = LifecycleTracker::new(tracer.clone(), config);

        open_connection(&tracker, 1);
        assert_eq!(tracker.tracked_connections(), 1);
        tracker.before_query(&1, 10, "db");
        tracker.after_query(&1, &10, "SELECT 1", NO_ERR);
        tracker.before_result_set_next(&1, Some(&10), 100, "db");
        tracker.after_result_set_close(&1, &100, None, NO_ERR);
        tracker.after_statement_close(&1, &10);
        tracker.after_connection_close(&1, NO_ERR);

        assert!(tracer.spans().is_empty());
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn fetch_span_opens_once_per_result_set() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        for _ in 0..5 {
            tracker.before_result_set_next(&1, Some(&10), 100, "db");
        }
        assert_eq!(
            tracer.spans().iter().filter(|s| s.name == "db/fetch").count(),
            1
        );
        tracker.after_connection_close(&1, NO_ERR);
        tracer.assert_all_finished_once();
    }

    #[test]
    fn unresolvable_statement_still_tracks_fetch_span() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        // Owning statement unknown at fetch time.
        tracker.before_result_set_next(&1, None, 100, "db");
        let fetch = tracer.span_named("db/fetch").unwrap();

        // A statement close cannot reach this span; the connection can.
        tracker.after_statement_close(&1, &10);
        assert!(!fetch.is_finished());

        tracker.after_connection_close(&1, NO_ERR);
        assert_eq!(fetch.finish_count(), 1);
    }

    #[test]
    fn statement_mismatch_at_fetch_falls_back_to_connection_end() {
        let tracer = RecordingTracer::new();
        let tracker = tracker(&tracer);

        open_connection(&tracker, 1);
        tracker.before_query(&1, 10, "db");
        // The driver handed back a statement the tracker never saw.
        tracker.before_result_set_next(&1, Some(&77), 100, "db");
        tracker.after_result_set_close(&1, &100, Some(2), NO_ERR);

        let fetch = tracer.span_named("db/fetch").unwrap();
        assert_eq!(fetch.finish_count(), 1);

        tracker.after_connection_close(&1, NO_ERR);
        tracer.assert_all_finished_once();
    }

    #[test]
    fn concurrent_lifecycles_finish_every_span_exactly_once() {
        let tracer = RecordingTracer::new();
        let tracker = Arc::new(LifecycleTracker::<u64, u64, u64>::new(
            tracer.clone(),
            TracingConfig::default(),
        ));

        let mut handles = Vec::new();
        for t in 0..4u64 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                for c in 0..8u64 {
                    let conn = t * 100 + c;
                    tracker.before_acquire(conn, "db");
                    tracker.after_acquire(&conn, NO_ERR);
                    for s in 0..3u64 {
                        let stmt = conn * 10 + s;
                        let rs = stmt;
                        tracker.before_query(&conn, stmt, "db");
                        tracker.before_result_set_next(&conn, Some(&stmt), rs, "db");
                        tracker.after_query(&conn, &stmt, "SELECT 1", NO_ERR);
                        match (c + s) % 3 {
                            0 => {
                                // Orderly close, then a duplicate.
                                tracker.after_result_set_close(&conn, &rs, Some(1), NO_ERR);
                                tracker.after_statement_close(&conn, &stmt);
                                tracker.after_result_set_close(&conn, &rs, Some(1), NO_ERR);
                            }
                            1 => {
                                // Result-set close never observed.
                                tracker.after_statement_close(&conn, &stmt);
                            }
                            _ => {
                                // Neither close observed; connection cascade.
                            }
                        }
                    }
                    tracker.after_connection_close(&conn, NO_ERR);
                    tracker.after_connection_close(&conn, NO_ERR);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 1 connection + 3 query + 3 fetch spans per connection.
        assert_eq!(tracer.spans().len(), 4 * 8 * 7);
        tracer.assert_all_finished_once();
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn one_connection_shared_across_threads() {
        let tracer = RecordingTracer::new();
        let tracker = Arc::new(LifecycleTracker::<u64, u64, u64>::new(
            tracer.clone(),
            TracingConfig::default(),
        ));

        tracker.before_acquire(1, "db");
        tracker.after_acquire(&1, NO_ERR);

        let mut handles = Vec::new();
        for t in 0..4u64 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                for s in 0..5u64 {
                    let stmt = t * 10 + s;
                    tracker.before_query(&1, stmt, "db");
                    tracker.before_result_set_next(&1, Some(&stmt), stmt, "db");
                    tracker.after_query(&1, &stmt, "SELECT 1", NO_ERR);
                    if s % 2 == 0 {
                        tracker.after_result_set_close(&1, &stmt, Some(1), NO_ERR);
                        tracker.after_statement_close(&1, &stmt);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Closed from a different thread than any opener; everything left
        // open is finished by the cascade.
        tracker.after_connection_close(&1, NO_ERR);
        assert_eq!(tracer.spans().len(), 1 + 4 * 5 * 2);
        tracer.assert_all_finished_once();
        assert_eq!(tracker.tracked_connections(), 0);
    }

    #[test]
    fn connection_close_racing_statement_events_never_leaks() {
        for _ in 0..20 {
            let tracer = RecordingTracer::new();
            let tracker = Arc::new(LifecycleTracker::<u64, u64, u64>::new(
                tracer.clone(),
                TracingConfig::default(),
            ));
            tracker.before_acquire(1, "db");
            tracker.after_acquire(&1, NO_ERR);

            let worker = {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for s in 0..50u64 {
                        tracker.before_query(&1, s, "db");
                        tracker.before_result_set_next(&1, Some(&s), s, "db");
                        tracker.after_query(&1, &s, "SELECT 1", NO_ERR);
                    }
                })
            };
            let closer = {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    tracker.after_connection_close(&1, NO_ERR);
                })
            };
            worker.join().unwrap();
            closer.join().unwrap();

            // Events after the close raced are no-ops; whatever got tracked
            // before the close was finished by the cascade, exactly once.
            tracer.assert_all_finished_once();
            assert_eq!(tracker.tracked_connections(), 0);
        }
    }
}
