//! Method-interception front end for the lifecycle tracker.
//!
//! Some decorators intercept at the proxy level instead of hooking driver
//! callbacks: they see "method X was called on an object acting as a
//! provider / connection / statement / result set", with timing and an
//! optional error. That shape arrives here as [`InterceptedCall`], a closed
//! vocabulary of the calls the tracker cares about, so dispatch is an
//! exhaustive match instead of string comparison on method names. Query
//! executions come through the separate [`TracingCallListener::before_query`]
//! / [`TracingCallListener::after_query`] pair, which also carries the
//! executed batch.
//!
//! Proxies do not always preserve reference identity, so identity here is a
//! provider-assigned id rather than the object itself.

use std::sync::Arc;

use crate::config::TracingConfig;
use crate::ids::{ConnectionId, ResultSetId, StatementId};
use crate::name::NameResolver;
use crate::provider::{ConnectionProvider, DbError};
use crate::tracker::LifecycleTracker;
use crate::tracer::Tracer;

/// One intercepted method call, reduced to the calls that drive the
/// resource lifecycle. Anything else a proxy observes is not our business
/// and never reaches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptedCall {
    /// `acquire` on the provider.
    ProviderAcquire { connection: ConnectionId },
    /// `commit` on a connection.
    ConnectionCommit { connection: ConnectionId },
    /// `rollback` on a connection.
    ConnectionRollback { connection: ConnectionId },
    /// `close` on a connection.
    ConnectionClose { connection: ConnectionId },
    /// `close` on a statement.
    StatementClose {
        connection: ConnectionId,
        statement: StatementId,
    },
    /// `next` on a result set. The owning statement may not be recoverable
    /// from the proxied object, hence optional.
    ResultSetNext {
        connection: ConnectionId,
        statement: Option<StatementId>,
        result_set: ResultSetId,
    },
    /// `close` on a result set.
    ResultSetClose {
        connection: ConnectionId,
        result_set: ResultSetId,
    },
}

/// Represents each connection and sql query as a span, driven by
/// intercepted method calls.
pub struct TracingCallListener {
    tracker: LifecycleTracker<ConnectionId, StatementId, ResultSetId>,
    resolver: Arc<NameResolver>,
}

impl TracingCallListener {
    pub fn new(tracer: Arc<dyn Tracer>, resolver: Arc<NameResolver>, config: TracingConfig) -> Self {
        Self {
            tracker: LifecycleTracker::new(tracer, config),
            resolver,
        }
    }

    /// Called before the intercepted method runs.
    pub fn before_call(&self, call: InterceptedCall, provider: &Arc<dyn ConnectionProvider>) {
        match call {
            InterceptedCall::ProviderAcquire { connection } => {
                let name = self.resolver.resolve(provider);
                self.tracker.before_acquire(connection, &name);
            }
            InterceptedCall::ResultSetNext {
                connection,
                statement,
                result_set,
            } => {
                let name = self.resolver.resolve(provider);
                self.tracker.before_result_set_next(
                    &connection,
                    statement.as_ref(),
                    result_set,
                    &name,
                );
            }
            InterceptedCall::ConnectionCommit { .. }
            | InterceptedCall::ConnectionRollback { .. }
            | InterceptedCall::ConnectionClose { .. }
            | InterceptedCall::StatementClose { .. }
            | InterceptedCall::ResultSetClose { .. } => {}
        }
    }

    /// Called after the intercepted method returned or failed.
    pub fn after_call(&self, call: InterceptedCall, error: Option<&DbError>) {
        match call {
            InterceptedCall::ProviderAcquire { connection } => {
                self.tracker.after_acquire(&connection, error);
            }
            InterceptedCall::ConnectionCommit { connection } => {
                self.tracker.after_commit(&connection, error);
            }
            InterceptedCall::ConnectionRollback { connection } => {
                self.tracker.after_rollback(&connection, error);
            }
            InterceptedCall::ConnectionClose { connection } => {
                self.tracker.after_connection_close(&connection, error);
            }
            InterceptedCall::StatementClose {
                connection,
                statement,
            } => {
                self.tracker.after_statement_close(&connection, &statement);
            }
            InterceptedCall::ResultSetClose {
                connection,
                result_set,
            } => {
                self.tracker
                    .after_result_set_close(&connection, &result_set, None, error);
            }
            InterceptedCall::ResultSetNext { .. } => {}
        }
    }

    /// A statement batch is about to execute.
    pub fn before_query(
        &self,
        connection: ConnectionId,
        statement: StatementId,
        provider: &Arc<dyn ConnectionProvider>,
    ) {
        let name = self.resolver.resolve(provider);
        self.tracker.before_query(&connection, statement, &name);
    }

    /// A statement batch finished. `queries` holds every statement executed
    /// in the batch; they are joined with a newline for the span tag.
    /// `row_count` is the update count, when the call reported one.
    pub fn after_query(
        &self,
        connection: ConnectionId,
        statement: StatementId,
        queries: &[&str],
        row_count: Option<u64>,
        error: Option<&DbError>,
    ) {
        if error.is_none() {
            if let Some(row_count) = row_count {
                self.tracker
                    .add_query_row_count(&connection, &statement, row_count);
            }
        }
        let sql = queries.join("\n");
        self.tracker.after_query(&connection, &statement, &sql, error);
    }
}
