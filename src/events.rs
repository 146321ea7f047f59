//! Driver-event front end for the lifecycle tracker.
//!
//! Instrumented decorators that hook the driver at the callback level (one
//! callback per primitive event: connection opened, statement executed,
//! result-set row fetched, resource closed) forward those callbacks here.
//! This listener resolves the provider's logical name, translates each
//! callback into the corresponding tracker operation, and otherwise stays
//! out of the way: errors pass through untouched and the wrapped
//! provider's behavior is never altered.

use std::sync::Arc;

use crate::config::TracingConfig;
use crate::ids::{ConnectionId, ResultSetId, StatementId};
use crate::name::NameResolver;
use crate::provider::{ConnectionProvider, DbError};
use crate::tracker::LifecycleTracker;
use crate::tracer::Tracer;

/// Represents each connection, executed statement, and result set as a span.
pub struct TracingEventListener {
    tracker: LifecycleTracker<ConnectionId, StatementId, ResultSetId>,
    resolver: Arc<NameResolver>,
    include_parameter_values: bool,
}

impl TracingEventListener {
    pub fn new(tracer: Arc<dyn Tracer>, resolver: Arc<NameResolver>, config: TracingConfig) -> Self {
        let include_parameter_values = config.include_parameter_values;
        Self {
            tracker: LifecycleTracker::new(tracer, config),
            resolver,
            include_parameter_values,
        }
    }

    pub fn on_before_acquire(
        &self,
        connection: ConnectionId,
        provider: &Arc<dyn ConnectionProvider>,
    ) {
        let name = self.resolver.resolve(provider);
        self.tracker.before_acquire(connection, &name);
    }

    pub fn on_after_acquire(&self, connection: ConnectionId, error: Option<&DbError>) {
        self.tracker.after_acquire(&connection, error);
    }

    pub fn on_before_execute(
        &self,
        connection: ConnectionId,
        statement: StatementId,
        provider: &Arc<dyn ConnectionProvider>,
    ) {
        let name = self.resolver.resolve(provider);
        self.tracker.before_query(&connection, statement, &name);
    }

    /// Row count reported by an update-style execution. Recorded only when
    /// the execution succeeded.
    pub fn on_after_update(
        &self,
        connection: ConnectionId,
        statement: StatementId,
        row_count: u64,
        error: Option<&DbError>,
    ) {
        if error.is_none() {
            self.tracker
                .add_query_row_count(&connection, &statement, row_count);
        }
    }

    pub fn on_after_execute(
        &self,
        connection: ConnectionId,
        statement: StatementId,
        sql: &str,
        sql_with_values: Option<&str>,
        error: Option<&DbError>,
    ) {
        let text = self.sql_text(sql, sql_with_values);
        self.tracker.after_query(&connection, &statement, text, error);
    }

    pub fn on_before_result_set_next(
        &self,
        connection: ConnectionId,
        statement: StatementId,
        result_set: ResultSetId,
        provider: &Arc<dyn ConnectionProvider>,
    ) {
        let name = self.resolver.resolve(provider);
        self.tracker
            .before_result_set_next(&connection, Some(&statement), result_set, &name);
    }

    pub fn on_after_result_set_close(
        &self,
        connection: ConnectionId,
        result_set: ResultSetId,
        row_count: Option<u64>,
        error: Option<&DbError>,
    ) {
        self.tracker
            .after_result_set_close(&connection, &result_set, row_count, error);
    }

    pub fn on_after_statement_close(&self, connection: ConnectionId, statement: StatementId) {
        self.tracker.after_statement_close(&connection, &statement);
    }

    pub fn on_after_commit(&self, connection: ConnectionId, error: Option<&DbError>) {
        self.tracker.after_commit(&connection, error);
    }

    pub fn on_after_rollback(&self, connection: ConnectionId, error: Option<&DbError>) {
        self.tracker.after_rollback(&connection, error);
    }

    pub fn on_after_connection_close(&self, connection: ConnectionId, error: Option<&DbError>) {
        self.tracker.after_connection_close(&connection, error);
    }

    fn sql_text<'a>(&self, sql: &'a str, sql_with_values: Option<&'a str>) -> &'a str {
        match sql_with_values {
            Some(with_values) if self.include_parameter_values && !with_values.is_empty() => {
                with_values
            }
            _ => sql,
        }
    }
}
