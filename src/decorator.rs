//! Decorator chain construction and the decorated-provider facade.
//!
//! Decorators are applied functionally: each one receives the provider
//! produced by the previous step and returns either the same value
//! (declining to wrap) or a new one. The fold records every step that
//! changed identity, and the result is wrapped in a [`DecoratedProvider`]
//! facade that behaves like the outermost decorator while exposing the
//! whole chain for introspection.

use std::sync::Arc;

use crate::provider::{same_provider, Connection, ConnectionProvider, DbError};

/// A decorator failed while wrapping a provider.
///
/// This is a hard configuration error: it propagates out of
/// [`DecoratorChain::apply`] at wiring time and is never retried.
#[derive(Debug, thiserror::Error)]
#[error("decorator {decorator} failed to wrap provider {provider}: {message}")]
pub struct DecorationError {
    decorator: String,
    provider: String,
    message: String,
}

impl DecorationError {
    pub fn new(
        decorator: impl Into<String>,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            decorator: decorator.into(),
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Wraps a connection provider with additional behavior.
///
/// A decorator that does not apply to the given provider (an unsupported
/// pool type, a missing optional backend) returns its input unchanged;
/// that is an expected, silent no-op. Returning an error aborts wiring.
pub trait ProviderDecorator: Send + Sync {
    /// Identifier rendered in chain descriptions.
    fn id(&self) -> &str;

    /// Priority; lower values wrap closer to the raw provider. Ties apply
    /// in registration order.
    fn order(&self) -> i32 {
        0
    }

    fn decorate(
        &self,
        name: &str,
        provider: Arc<dyn ConnectionProvider>,
    ) -> Result<Arc<dyn ConnectionProvider>, DecorationError>;
}

/// One decorator application that changed the provider's identity.
#[derive(Clone)]
pub struct DecorationStage {
    decorator_id: String,
    provider: Arc<dyn ConnectionProvider>,
}

impl DecorationStage {
    pub fn decorator_id(&self) -> &str {
        &self.decorator_id
    }

    /// The provider produced by this decorator.
    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.provider
    }
}

impl std::fmt::Debug for DecorationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecorationStage")
            .field("decorator_id", &self.decorator_id)
            .field("provider", &self.provider.provider_type())
            .finish()
    }
}

/// Pass-through facade over a decorated provider.
///
/// Delegates every provider operation to the outermost decorator while
/// keeping the undecorated provider and the applied chain reachable, so
/// consumers can locate a specific decorator's state without reaching into
/// implementation internals. Immutable once built; all accessors are pure
/// queries.
pub struct DecoratedProvider {
    name: String,
    original: Arc<dyn ConnectionProvider>,
    decorated: Arc<dyn ConnectionProvider>,
    chain: Vec<DecorationStage>,
}

impl DecoratedProvider {
    /// The logical name the provider was wired under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider as it was before any decorator ran.
    pub fn original(&self) -> &Arc<dyn ConnectionProvider> {
        &self.original
    }

    /// The fully decorated provider all operations delegate to.
    pub fn decorated(&self) -> &Arc<dyn ConnectionProvider> {
        &self.decorated
    }

    /// Applied decorators, outermost first.
    pub fn decoration_chain(&self) -> &[DecorationStage] {
        &self.chain
    }

    /// Human-readable rendering of the chain, outermost first, ending with
    /// the undecorated provider:
    /// `"outer [OuterType] -> inner [InnerType] -> name [BaseType]"`.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .chain
            .iter()
            .map(|stage| {
                format!(
                    "{} [{}]",
                    stage.decorator_id,
                    stage.provider.provider_type()
                )
            })
            .collect();
        parts.push(format!("{} [{}]", self.name, self.original.provider_type()));
        parts.join(" -> ")
    }
}

impl std::fmt::Debug for DecoratedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratedProvider")
            .field("name", &self.name)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl ConnectionProvider for DecoratedProvider {
    fn acquire(&self) -> Result<Box<dyn Connection>, DbError> {
        self.decorated.acquire()
    }

    fn url(&self) -> Option<String> {
        self.decorated.url()
    }

    fn as_decorated(&self) -> Option<&DecoratedProvider> {
        Some(self)
    }
}

/// Ordered set of decorators applied to providers at wiring time.
#[derive(Default)]
pub struct DecoratorChain {
    decorators: Vec<Arc<dyn ProviderDecorator>>,
}

impl DecoratorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, decorator: Arc<dyn ProviderDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    pub fn push(&mut self, decorator: Arc<dyn ProviderDecorator>) {
        self.decorators.push(decorator);
    }

    /// Applies all decorators to `provider` in ascending `order()`.
    ///
    /// Returns the original `Arc` untouched when no decorator changed the
    /// provider's identity; otherwise returns a [`DecoratedProvider`]
    /// facade reachable through
    /// [`ConnectionProvider::as_decorated`].
    pub fn apply(
        &self,
        name: &str,
        provider: Arc<dyn ConnectionProvider>,
    ) -> Result<Arc<dyn ConnectionProvider>, DecorationError> {
        let mut ordered: Vec<&Arc<dyn ProviderDecorator>> = self.decorators.iter().collect();
        ordered.sort_by_key(|decorator| decorator.order());

        let original = provider.clone();
        let mut current = provider;
        let mut stages = Vec::new();
        for decorator in ordered {
            let before = current.clone();
            let after = decorator.decorate(name, before.clone())?;
            if !same_provider(&before, &after) {
                stages.push(DecorationStage {
                    decorator_id: decorator.id().to_string(),
                    provider: after.clone(),
                });
            }
            current = after;
        }

        if same_provider(&original, &current) {
            return Ok(original);
        }

        // Callers see wrapping layers peeled from the outside in.
        stages.reverse();
        Ok(Arc::new(DecoratedProvider {
            name: name.to_string(),
            original,
            decorated: current,
            chain: stages,
        }))
    }
}
