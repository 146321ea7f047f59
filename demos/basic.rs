//! Basic example showing how to wire datasource tracing.
//!
//! Run with: cargo run --example basic

use std::sync::Arc;

use datasource_tracing::prelude::*;
use datasource_tracing::{
    ConnectionId, DbError, DecorationError, ResultSetId, StatementId,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Toy in-memory provider standing in for a real pool.
#[derive(Debug)]
struct MemoryProvider;

struct MemoryConnection;

impl Connection for MemoryConnection {
    fn close(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

impl ConnectionProvider for MemoryProvider {
    fn acquire(&self) -> Result<Box<dyn Connection>, DbError> {
        Ok(Box::new(MemoryConnection))
    }

    fn url(&self) -> Option<String> {
        Some("memory://localhost/demo".into())
    }
}

/// Provider wrapper that reports acquire and close to the event listener.
///
/// A real integration would sit at the driver level and forward statement
/// and result-set callbacks as well; the connection-level hooks are enough
/// to show the wiring.
struct InstrumentedProvider {
    inner: Arc<dyn ConnectionProvider>,
    listener: Arc<TracingEventListener>,
    ids: IdAllocator,
}

struct InstrumentedConnection {
    inner: Box<dyn Connection>,
    id: ConnectionId,
    listener: Arc<TracingEventListener>,
}

impl Connection for InstrumentedConnection {
    fn close(self: Box<Self>) -> Result<(), DbError> {
        let this = *self;
        let result = this.inner.close();
        this.listener
            .on_after_connection_close(this.id, result.as_ref().err());
        result
    }
}

impl ConnectionProvider for InstrumentedProvider {
    fn acquire(&self) -> Result<Box<dyn Connection>, DbError> {
        let id = self.ids.next_connection();
        self.listener.on_before_acquire(id, &self.inner);
        let result = self.inner.acquire();
        self.listener.on_after_acquire(id, result.as_ref().err());
        result.map(|inner| {
            Box::new(InstrumentedConnection {
                inner,
                id,
                listener: self.listener.clone(),
            }) as Box<dyn Connection>
        })
    }

    fn url(&self) -> Option<String> {
        self.inner.url()
    }
}

struct TracingDecorator {
    listener: Arc<TracingEventListener>,
}

impl ProviderDecorator for TracingDecorator {
    fn id(&self) -> &str {
        "tracing"
    }

    fn decorate(
        &self,
        _name: &str,
        provider: Arc<dyn ConnectionProvider>,
    ) -> Result<Arc<dyn ConnectionProvider>, DecorationError> {
        Ok(Arc::new(InstrumentedProvider {
            inner: provider,
            listener: self.listener.clone(),
            ids: IdAllocator::new(),
        }))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Name resolution: providers registered here label the spans.
    let registry = Arc::new(ProviderRegistry::new());
    let resolver = Arc::new(NameResolver::new(registry.clone()));
    let listener = Arc::new(TracingEventListener::new(
        Arc::new(TracingTracer::new()),
        resolver,
        TracingConfig::default(),
    ));

    // Wire the decorators once, at startup.
    let raw: Arc<dyn ConnectionProvider> = Arc::new(MemoryProvider);
    let chain = DecoratorChain::new().with(Arc::new(TracingDecorator {
        listener: listener.clone(),
    }));
    let provider = chain.apply("demo", raw)?;
    registry.register("demo", provider.clone());

    if let Some(facade) = provider.as_decorated() {
        tracing::info!("decoration chain: {}", facade.describe());
    }

    // Use the provider exactly like the raw one.
    let conn = provider.acquire()?;

    // The statement and fetch callbacks a driver integration would emit:
    let connection = ConnectionId(0);
    let statement = StatementId(0);
    let result_set = ResultSetId(0);
    listener.on_before_execute(connection, statement, &provider);
    listener.on_after_execute(connection, statement, "SELECT 1", None, None);
    listener.on_before_result_set_next(connection, statement, result_set, &provider);
    listener.on_after_result_set_close(connection, result_set, Some(1), None);
    listener.on_after_statement_close(connection, statement);

    conn.close()?;

    tracing::info!("lifecycle complete; three spans were emitted");
    Ok(())
}
