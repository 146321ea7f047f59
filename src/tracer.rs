//! The tracer capability consumed by the lifecycle tracker.
//!
//! The tracker only needs to start a span, set its kind, tag it, attach
//! named annotations, and finish it. Parent/child relationships between
//! connection, query, and fetch spans are the backend's concern: the
//! default [`TracingTracer`] backend inherits the `tracing` crate's current
//! span context, so spans nest under whatever span is active when the
//! resource event fires.

use tracing::field;

/// How a span relates to the remote datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// An outbound call to the datastore.
    Client,
    /// Local bookkeeping work.
    Internal,
}

impl SpanKind {
    fn as_str(self) -> &'static str {
        match self {
            SpanKind::Client => "client",
            SpanKind::Internal => "internal",
        }
    }
}

/// One bounded unit of datastore work.
///
/// Handles are owned by the lifecycle tracker until finished; `finish`
/// consumes the handle, so the type system already rules out most
/// double-finish paths.
pub trait Span: Send + Sync {
    fn kind(&self, kind: SpanKind);
    fn tag(&self, key: &str, value: &str);
    /// Attaches a named point-in-time event to the span.
    fn annotate(&self, event: &str);
    fn finish(self: Box<Self>);
}

/// Creates spans. Implementations must be cheap to call on the hot path.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str) -> Box<dyn Span>;
}

/// Backend over the `tracing` crate.
///
/// The dynamic span name goes into `otel.name` (macro span names must be
/// static); the fields the tracker may record later are declared empty up
/// front. Unknown tag keys are dropped by `tracing` itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracer;

impl TracingTracer {
    pub fn new() -> Self {
        Self
    }
}

struct TracingSpan {
    span: tracing::Span,
}

impl Span for TracingSpan {
    fn kind(&self, kind: SpanKind) {
        self.span.record("otel.kind", kind.as_str());
    }

    fn tag(&self, key: &str, value: &str) {
        self.span.record(key, value);
    }

    fn annotate(&self, event: &str) {
        tracing::info!(parent: &self.span, "{event}");
    }

    fn finish(self: Box<Self>) {}
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str) -> Box<dyn Span> {
        let span = tracing::info_span!(
            "db.client",
            otel.name = %name,
            otel.kind = field::Empty,
            sql = field::Empty,
            row.count = field::Empty,
            error = field::Empty,
        );
        Box::new(TracingSpan { span })
    }
}

/// Inert backend for when no tracing infrastructure is wired up.
///
/// Every operation is a no-op; the lifecycle tracker still runs its state
/// machine so metrics listeners and pass-through behavior are unaffected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

struct NoopSpan;

impl Span for NoopSpan {
    fn kind(&self, _kind: SpanKind) {}
    fn tag(&self, _key: &str, _value: &str) {}
    fn annotate(&self, _event: &str) {}
    fn finish(self: Box<Self>) {}
}

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}
