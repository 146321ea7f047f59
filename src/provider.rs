//! Capability traits for the wrapped datastore handle.

use std::sync::Arc;

use crate::decorator::DecoratedProvider;

/// An opaque error surfaced by the underlying driver or pool.
///
/// The instrumentation layer never constructs or interprets driver errors;
/// it only renders them into span tags and passes them back unchanged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DbError {
    message: String,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An open connection to the datastore.
///
/// The driver owns the real resource; this handle only needs to be closable
/// so decorators can observe the release.
pub trait Connection: Send {
    /// Closes the connection, returning it to whatever produced it.
    fn close(self: Box<Self>) -> Result<(), DbError>;
}

/// A factory capable of producing connections to a datastore.
///
/// This is the unit that decorators wrap. Implementations are shared as
/// `Arc<dyn ConnectionProvider>`; two handles refer to the same provider
/// exactly when their data pointers are equal.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Produces a connection. May block on pool exhaustion; that blocking is
    /// opaque to the instrumentation layer.
    fn acquire(&self) -> Result<Box<dyn Connection>, DbError>;

    /// URL of the datastore this provider connects to, when known.
    /// Feeds the span-name fallback in [`crate::name::NameResolver`].
    fn url(&self) -> Option<String> {
        None
    }

    /// Concrete type name, rendered in decoration chain descriptions.
    fn provider_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the decoration facade view of this provider, if it is one.
    fn as_decorated(&self) -> Option<&DecoratedProvider> {
        None
    }
}

/// Reference identity for shared providers.
///
/// Compares data pointers only; vtable pointers are ignored so the same
/// value seen through different trait-object instantiations still matches.
pub(crate) fn same_provider(
    a: &Arc<dyn ConnectionProvider>,
    b: &Arc<dyn ConnectionProvider>,
) -> bool {
    provider_addr(a) == provider_addr(b)
}

pub(crate) fn provider_addr(provider: &Arc<dyn ConnectionProvider>) -> usize {
    Arc::as_ptr(provider) as *const () as usize
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// In-memory provider used across the crate's tests.
    #[derive(Debug, Default)]
    pub(crate) struct StubProvider {
        pub(crate) url: Option<String>,
        pub(crate) fail_acquire: bool,
    }

    pub(crate) struct StubConnection;

    impl Connection for StubConnection {
        fn close(self: Box<Self>) -> Result<(), DbError> {
            Ok(())
        }
    }

    impl ConnectionProvider for StubProvider {
        fn acquire(&self) -> Result<Box<dyn Connection>, DbError> {
            if self.fail_acquire {
                Err(DbError::new("pool exhausted"))
            } else {
                Ok(Box::new(StubConnection))
            }
        }

        fn url(&self) -> Option<String> {
            self.url.clone()
        }
    }
}
