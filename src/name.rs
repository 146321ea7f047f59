//! Logical name resolution for provider handles.
//!
//! Spans and metrics are labeled with the name a provider was wired under.
//! Interception hands us whatever handle the driver saw, which may be the
//! registered provider itself, the undecorated provider behind a facade, or
//! any intermediate layer of the decoration chain. All of them resolve to
//! the registered name by reference identity.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use regex::Regex;

use crate::provider::{provider_addr, same_provider, ConnectionProvider};
use crate::tracker::SPAN_CONNECTION_SUFFIX;

/// Name used when a handle matches no registered provider and has no URL.
pub const DEFAULT_PROVIDER_NAME: &str = "datasource";

static PORT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d+").unwrap());

const MAX_SPAN_NAME: usize = 50;

/// Shortens a datastore URL for use as a span-name prefix.
///
/// The scheme is always stripped. If the remainder would push the
/// connection span name past the budget, the trailing `:port` is removed
/// too; host and database path stay, which keeps names unique enough for
/// correlation.
pub fn shorten_url(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    if without_scheme.len() + SPAN_CONNECTION_SUFFIX.len() <= MAX_SPAN_NAME {
        return without_scheme.to_string();
    }
    if let Some(colon) = without_scheme.rfind(':') {
        if let Some(port) = PORT_PATTERN.find(&without_scheme[colon..]) {
            let mut shortened = String::with_capacity(without_scheme.len());
            shortened.push_str(&without_scheme[..colon]);
            shortened.push_str(&without_scheme[colon + port.end()..]);
            return shortened;
        }
    }
    without_scheme.to_string()
}

/// Named providers, registered at wiring time.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<Vec<(String, Arc<dyn ConnectionProvider>)>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn ConnectionProvider>) {
        self.providers.write().push((name.into(), provider));
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn ConnectionProvider>)> {
        self.providers.read().clone()
    }
}

/// Resolves a provider handle to its logical name.
///
/// The registry is consulted once, lazily, on the first resolution; the
/// snapshot lives for the resolver's lifetime (construct a new resolver to
/// pick up later registrations). Individual handles are cached by
/// reference, so the linear scan runs at most once per distinct handle;
/// resolution sits on the hot path of every query and fetch event.
pub struct NameResolver {
    registry: Arc<ProviderRegistry>,
    snapshot: OnceCell<Vec<(String, Arc<dyn ConnectionProvider>)>>,
    cache: DashMap<usize, String>,
}

impl NameResolver {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            snapshot: OnceCell::new(),
            cache: DashMap::new(),
        }
    }

    pub fn resolve(&self, provider: &Arc<dyn ConnectionProvider>) -> String {
        let key = provider_addr(provider);
        if let Some(name) = self.cache.get(&key) {
            return name.clone();
        }
        let snapshot = self.snapshot.get_or_init(|| self.registry.snapshot());
        let name = snapshot
            .iter()
            .find(|(_, candidate)| Self::matches(candidate, provider))
            .map(|(name, _)| name.clone())
            .or_else(|| provider.url().map(|url| shorten_url(&url)))
            .unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string());
        self.cache.insert(key, name.clone());
        name
    }

    fn matches(
        candidate: &Arc<dyn ConnectionProvider>,
        handle: &Arc<dyn ConnectionProvider>,
    ) -> bool {
        if same_provider(candidate, handle) {
            return true;
        }
        match candidate.as_decorated() {
            Some(decorated) => {
                same_provider(decorated.original(), handle)
                    || decorated
                        .decoration_chain()
                        .iter()
                        .any(|stage| same_provider(stage.provider(), handle))
            }
            None => false,
        }
    }
}
