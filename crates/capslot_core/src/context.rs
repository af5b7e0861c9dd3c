//! Execution context handles and lifecycle scope.
//!
//! # Responsibility
//! - Identify one isolation boundary (thread, task, request scope).
//! - Tie value lifetime in the store to context lifetime.
//!
//! # Invariants
//! - A context handle is never derived from caller-supplied text or numbers.
//! - `ContextGuard` ends its context exactly once, on drop.

use crate::store::ContextLocalStore;
use std::fmt::{Debug, Formatter};
use uuid::Uuid;

/// Opaque handle for one execution context.
///
/// Created by the lifecycle owner; borrowed by store calls.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionContext(Uuid);

impl ExecutionContext {
    /// Creates a new, never-before-seen context handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub(crate) fn shard_seed(self) -> u64 {
        self.0.as_u64_pair().1
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ExecutionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Short prefix only; enough to correlate log lines.
        let simple = self.0.simple().to_string();
        write!(f, "ExecutionContext({})", &simple[..8])
    }
}

/// RAII scope that owns one context inside a store.
///
/// Dropping the guard calls [`ContextLocalStore::on_context_end`].
pub struct ContextGuard<'store> {
    store: &'store ContextLocalStore,
    context: ExecutionContext,
}

impl<'store> ContextGuard<'store> {
    pub(crate) fn new(store: &'store ContextLocalStore) -> Self {
        Self {
            store,
            context: ExecutionContext::new(),
        }
    }

    /// Context owned by this guard.
    pub fn context(&self) -> ExecutionContext {
        self.context
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.store.on_context_end(self.context);
    }
}

impl Debug for ContextGuard<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGuard")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionContext;

    #[test]
    fn new_contexts_are_distinct() {
        let first = ExecutionContext::new();
        let second = ExecutionContext::new();
        assert_ne!(first, second);
        assert_eq!(first, first);
    }

    #[test]
    fn debug_uses_short_prefix() {
        let rendered = format!("{:?}", ExecutionContext::new());
        assert!(rendered.starts_with("ExecutionContext("));
        assert_eq!(rendered.len(), "ExecutionContext()".len() + 8);
    }
}
