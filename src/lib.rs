//! # datasource-tracing
//!
//! Transparent observability decorators for database connection providers.
//!
//! This crate instruments an existing connection provider without changing
//! its observable behavior: decorators wrap the provider, interception
//! produces lifecycle events (acquire, execute, fetch, close), and a
//! race-free tracker turns those events into correctly nested spans and
//! pool metrics, even when resources are closed out of order or never
//! closed at all.
//!
//! ## Features
//!
//! - **Pass-through decoration**: wrapped providers keep their exact
//!   behavioral contract; errors are tagged and rethrown, never swallowed
//! - **Ordered decorator chains**: decorators apply by priority and are
//!   introspectable through the [`DecoratedProvider`] facade
//! - **Span per resource**: one span per connection, statement execution,
//!   and result-set read, finished exactly once under any interleaving
//! - **Two interception styles**: driver-level event callbacks
//!   ([`TracingEventListener`]) and proxy-level method interception
//!   ([`TracingCallListener`]) feed the same lifecycle tracker
//! - **Pool metrics**: pending/active gauges, created/failed counters, and
//!   wait/usage histograms through the `metrics` facade
//! - **Fail transparent**: a decorator that cannot initialize declines to
//!   wrap; with no tracing backend the spans are inert no-ops
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use datasource_tracing::prelude::*;
//!
//! // Wire the decorators once, at startup.
//! let chain = DecoratorChain::new().with(my_tracing_decorator);
//! let provider = chain.apply("orders", raw_provider)?;
//!
//! // Register the result so spans carry the pool's logical name.
//! let registry = Arc::new(ProviderRegistry::new());
//! registry.register("orders", provider.clone());
//!
//! // Use `provider` exactly like the raw provider.
//! let conn = provider.acquire()?;
//! ```
//!
//! ## Span Attributes
//!
//! Spans are named `<pool>/connection`, `<pool>/query`, and `<pool>/fetch`.
//! The following tags and annotations are recorded:
//!
//! | Key | Description |
//! |-----------|-------------|
//! | `sql` | Executed statement text (batches joined with newlines) |
//! | `row.count` | Rows updated or fetched, when known |
//! | `error` | Error rendering, on failure |
//! | `commit` / `rollback` | Annotations on the connection span |

mod config;
mod decorator;
mod events;
mod ids;
mod intercept;
mod metrics;
mod name;
mod provider;
mod tracer;
mod tracker;

pub use config::TracingConfig;
pub use decorator::{
    DecoratedProvider, DecorationError, DecorationStage, DecoratorChain, ProviderDecorator,
};
pub use events::TracingEventListener;
pub use ids::{ConnectionId, IdAllocator, ResultSetId, StatementId};
pub use intercept::{InterceptedCall, TracingCallListener};
pub use self::metrics::{
    MetricsCallListener, MetricsEventListener, PoolMetrics, PoolMetricsRegistry,
};
pub use name::{shorten_url, NameResolver, ProviderRegistry, DEFAULT_PROVIDER_NAME};
pub use provider::{Connection, ConnectionProvider, DbError};
pub use tracer::{NoopTracer, Span, SpanKind, Tracer, TracingTracer};
pub use tracker::{
    LifecycleTracker, SPAN_CONNECTION_SUFFIX, SPAN_ERROR_TAG, SPAN_FETCH_SUFFIX,
    SPAN_QUERY_SUFFIX, SPAN_ROW_COUNT_TAG, SPAN_SQL_TAG,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Connection, ConnectionProvider, DecoratedProvider, DecoratorChain, IdAllocator,
        LifecycleTracker, NameResolver, ProviderDecorator, ProviderRegistry, TracingCallListener,
        TracingConfig, TracingEventListener, TracingTracer,
    };
}
