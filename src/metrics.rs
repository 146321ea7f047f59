//! Pool metrics emission.
//!
//! Counters, gauges, and histograms for connection acquisition and usage,
//! published through the `metrics` facade and labeled with the pool's
//! logical name. With no recorder installed every emission is inert, so the
//! listeners can always be wired in. Metrics listeners are independent of
//! the tracing listeners; installations may run either or both.

use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::{counter, gauge, histogram};

use crate::ids::ConnectionId;
use crate::intercept::InterceptedCall;
use crate::name::NameResolver;
use crate::provider::{ConnectionProvider, DbError};

pub const CONNECTIONS_WAIT: &str = "datasource.connections.wait";
pub const CONNECTIONS_USAGE: &str = "datasource.connections.usage";
pub const CONNECTIONS_CREATED: &str = "datasource.connections.created";
pub const CONNECTIONS_FAILED: &str = "datasource.connections.failed";
pub const CONNECTIONS_ACTIVE: &str = "datasource.connections.active";
pub const CONNECTIONS_PENDING: &str = "datasource.connections.pending";

/// Per-pool connection meters, keyed by the pool's logical name.
pub struct PoolMetrics<C> {
    pool: String,
    active: AtomicI64,
    pending: AtomicI64,
    acquired_at: DashMap<C, Instant>,
}

impl<C: Eq + Hash> PoolMetrics<C> {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            active: AtomicI64::new(0),
            pending: AtomicI64::new(0),
            acquired_at: DashMap::new(),
        }
    }

    /// A caller started waiting for a connection.
    pub fn before_acquire(&self) {
        let pending = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!(CONNECTIONS_PENDING, "pool" => self.pool.clone()).set(pending as f64);
    }

    /// Acquisition finished, successfully or not.
    pub fn after_acquire(&self, connection: C, wait: Duration, error: Option<&DbError>) {
        histogram!(CONNECTIONS_WAIT, "pool" => self.pool.clone()).record(wait.as_secs_f64());
        let pending = self.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        gauge!(CONNECTIONS_PENDING, "pool" => self.pool.clone()).set(pending as f64);
        if error.is_none() {
            self.acquired_at.insert(connection, Instant::now());
            counter!(CONNECTIONS_CREATED, "pool" => self.pool.clone()).increment(1);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            gauge!(CONNECTIONS_ACTIVE, "pool" => self.pool.clone()).set(active as f64);
        } else {
            counter!(CONNECTIONS_FAILED, "pool" => self.pool.clone()).increment(1);
        }
    }

    /// Connection released. Unknown keys are tolerated; the close may race
    /// a failed or never-observed acquire.
    pub fn after_close(&self, connection: &C) {
        let Some((_, acquired)) = self.acquired_at.remove(connection) else {
            return;
        };
        histogram!(CONNECTIONS_USAGE, "pool" => self.pool.clone())
            .record(acquired.elapsed().as_secs_f64());
        let active = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        gauge!(CONNECTIONS_ACTIVE, "pool" => self.pool.clone()).set(active as f64);
    }

    pub fn active_connections(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn pending_connections(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }
}

/// One [`PoolMetrics`] holder per pool name, created on first use.
pub struct PoolMetricsRegistry<C> {
    metrics: DashMap<String, Arc<PoolMetrics<C>>>,
}

impl<C: Eq + Hash> PoolMetricsRegistry<C> {
    pub fn new() -> Self {
        Self {
            metrics: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, pool: &str) -> Arc<PoolMetrics<C>> {
        self.metrics
            .entry(pool.to_string())
            .or_insert_with(|| Arc::new(PoolMetrics::new(pool)))
            .clone()
    }
}

impl<C: Eq + Hash> Default for PoolMetricsRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Driver-event front end for pool metrics.
pub struct MetricsEventListener {
    registry: Arc<PoolMetricsRegistry<ConnectionId>>,
    resolver: Arc<NameResolver>,
}

impl MetricsEventListener {
    pub fn new(registry: Arc<PoolMetricsRegistry<ConnectionId>>, resolver: Arc<NameResolver>) -> Self {
        Self { registry, resolver }
    }

    pub fn on_before_acquire(&self, provider: &Arc<dyn ConnectionProvider>) {
        self.metrics_for(provider).before_acquire();
    }

    pub fn on_after_acquire(
        &self,
        connection: ConnectionId,
        provider: &Arc<dyn ConnectionProvider>,
        wait: Duration,
        error: Option<&DbError>,
    ) {
        self.metrics_for(provider).after_acquire(connection, wait, error);
    }

    pub fn on_after_connection_close(
        &self,
        connection: ConnectionId,
        provider: &Arc<dyn ConnectionProvider>,
    ) {
        self.metrics_for(provider).after_close(&connection);
    }

    fn metrics_for(&self, provider: &Arc<dyn ConnectionProvider>) -> Arc<PoolMetrics<ConnectionId>> {
        let name = self.resolver.resolve(provider);
        self.registry.get_or_create(&name)
    }
}

/// Intercepted-call front end for pool metrics.
pub struct MetricsCallListener {
    registry: Arc<PoolMetricsRegistry<ConnectionId>>,
    resolver: Arc<NameResolver>,
}

impl MetricsCallListener {
    pub fn new(registry: Arc<PoolMetricsRegistry<ConnectionId>>, resolver: Arc<NameResolver>) -> Self {
        Self { registry, resolver }
    }

    pub fn before_call(&self, call: InterceptedCall, provider: &Arc<dyn ConnectionProvider>) {
        match call {
            InterceptedCall::ProviderAcquire { .. } => {
                self.metrics_for(provider).before_acquire();
            }
            InterceptedCall::ConnectionCommit { .. }
            | InterceptedCall::ConnectionRollback { .. }
            | InterceptedCall::ConnectionClose { .. }
            | InterceptedCall::StatementClose { .. }
            | InterceptedCall::ResultSetNext { .. }
            | InterceptedCall::ResultSetClose { .. } => {}
        }
    }

    pub fn after_call(
        &self,
        call: InterceptedCall,
        elapsed: Duration,
        error: Option<&DbError>,
        provider: &Arc<dyn ConnectionProvider>,
    ) {
        match call {
            InterceptedCall::ProviderAcquire { connection } => {
                self.metrics_for(provider).after_acquire(connection, elapsed, error);
            }
            InterceptedCall::ConnectionClose { connection } => {
                self.metrics_for(provider).after_close(&connection);
            }
            InterceptedCall::ConnectionCommit { .. }
            | InterceptedCall::ConnectionRollback { .. }
            | InterceptedCall::StatementClose { .. }
            | InterceptedCall::ResultSetNext { .. }
            | InterceptedCall::ResultSetClose { .. } => {}
        }
    }

    fn metrics_for(&self, provider: &Arc<dyn ConnectionProvider>) -> Arc<PoolMetrics<ConnectionId>> {
        let name = self.resolver.resolve(provider);
        self.registry.get_or_create(&name)
    }
}
