//! Opaque resource keys handed out by instrumented providers.
//!
//! Keys distinguish one live connection/statement/result set from another.
//! They are unique among currently open resources and may be reused after
//! the resource is closed, so nothing here is globally unique over time.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultSetId(pub u64);

/// Mints resource keys for an instrumented provider.
///
/// One allocator per provider is enough; ids only need to be unique among
/// resources that are open at the same instant.
#[derive(Debug, Default)]
pub struct IdAllocator {
    connections: AtomicU64,
    statements: AtomicU64,
    result_sets: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_connection(&self) -> ConnectionId {
        ConnectionId(self.connections.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_statement(&self) -> StatementId {
        StatementId(self.statements.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_result_set(&self) -> ResultSetId {
        ResultSetId(self.result_sets.fetch_add(1, Ordering::Relaxed))
    }
}
