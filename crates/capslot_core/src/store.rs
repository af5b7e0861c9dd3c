//! Context-local value store.
//!
//! # Responsibility
//! - Map `(ExecutionContext, CapabilityKey<T>)` to one owned value of type `T`.
//! - Release every value of a context when that context ends.
//!
//! # Invariants
//! - A value set under one context is never visible from another context.
//! - Each context maps to exactly one shard; operations lock only that shard,
//!   and only for the duration of the map access. Caller code (closures,
//!   `Clone`, `Drop`) never runs under a shard lock.
//! - Absence is a normal outcome (`None`), never an error.
//! - Lock poisoning never propagates as a panic to callers.

use crate::config::StoreConfig;
use crate::context::{ContextGuard, ExecutionContext};
use crate::key::{CapabilityKey, KeyId};
use log::{debug, warn};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Slot = Arc<dyn Any + Send + Sync>;
type Bucket = HashMap<KeyId, Slot>;
type Shard = HashMap<ExecutionContext, Bucket>;

/// Sharded store of context-local values.
pub struct ContextLocalStore {
    shards: Box<[Mutex<Shard>]>,
    mask: usize,
}

impl ContextLocalStore {
    /// Creates a store with default sharding.
    pub fn new() -> Self {
        Self::build(StoreConfig::default().shard_count)
    }

    /// Creates a store from validated settings.
    ///
    /// Invalid shard counts fall back to the default with a warning.
    pub fn with_config(config: &StoreConfig) -> Self {
        match config.validate() {
            Ok(()) => Self::build(config.shard_count),
            Err(err) => {
                warn!("event=store_config module=store status=fallback reason={err}");
                Self::new()
            }
        }
    }

    fn build(shard_count: usize) -> Self {
        let shards = (0..shard_count)
            .map(|_| Mutex::new(Shard::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            mask: shard_count - 1,
        }
    }

    /// Opens a new context scoped to the returned guard.
    pub fn enter(&self) -> ContextGuard<'_> {
        ContextGuard::new(self)
    }

    /// Installs `value` for `(ctx, key)`, replacing any previous value.
    pub fn set<T>(&self, ctx: ExecutionContext, key: &CapabilityKey<T>, value: T)
    where
        T: Send + Sync + 'static,
    {
        let previous = self
            .lock_shard(ctx)
            .entry(ctx)
            .or_default()
            .insert(key.id(), Arc::new(value));
        // Replaced value drops here, after the shard lock is released.
        drop(previous);
    }

    /// Returns a clone of the value for `(ctx, key)`, or `None` when absent.
    ///
    /// `T::clone` runs after the shard lock is released.
    pub fn get<T>(&self, ctx: ExecutionContext, key: &CapabilityKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_shared(ctx, key).map(|value| T::clone(&value))
    }

    /// Returns a shared pointer to the value for `(ctx, key)`.
    ///
    /// Works for values that are not `Clone`. The pointer stays valid after a
    /// later `set`, `clear`, or context end; it just no longer reflects the slot.
    pub fn get_shared<T>(&self, ctx: ExecutionContext, key: &CapabilityKey<T>) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let slot = self
            .lock_shard(ctx)
            .get(&ctx)
            .and_then(|bucket| bucket.get(&key.id()))
            .cloned();
        slot.and_then(|value| value.downcast::<T>().ok())
    }

    /// Runs `f` with a borrow of the value for `(ctx, key)`.
    ///
    /// No lock is held while `f` runs, so `f` may call back into the store for
    /// any context.
    pub fn with<T, R>(
        &self,
        ctx: ExecutionContext,
        key: &CapabilityKey<T>,
        f: impl FnOnce(Option<&T>) -> R,
    ) -> R
    where
        T: Send + Sync + 'static,
    {
        let value = self.get_shared(ctx, key);
        f(value.as_deref())
    }

    /// Removes the value for `(ctx, key)`. Clearing an absent value is a no-op.
    pub fn clear<T>(&self, ctx: ExecutionContext, key: &CapabilityKey<T>)
    where
        T: Send + Sync + 'static,
    {
        let removed = {
            let mut shard = self.lock_shard(ctx);
            let Some(bucket) = shard.get_mut(&ctx) else {
                return;
            };
            let removed = bucket.remove(&key.id());
            if bucket.is_empty() {
                shard.remove(&ctx);
            }
            removed
        };
        drop(removed);
    }

    /// Returns whether a value is installed for `(ctx, key)`.
    pub fn contains<T>(&self, ctx: ExecutionContext, key: &CapabilityKey<T>) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.lock_shard(ctx)
            .get(&ctx)
            .is_some_and(|bucket| bucket.contains_key(&key.id()))
    }

    /// Releases every value held for `ctx`.
    ///
    /// Called once by the lifecycle owner when the context terminates. Only the
    /// shard owning `ctx` is locked, and values are dropped after unlocking.
    pub fn on_context_end(&self, ctx: ExecutionContext) {
        let detached = self.lock_shard(ctx).remove(&ctx);
        let released = detached.as_ref().map_or(0, HashMap::len);
        drop(detached);
        debug!("event=context_end module=store status=ok context={ctx:?} released={released}");
    }

    /// Number of contexts currently holding at least one value.
    pub fn context_count(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Number of values held for `ctx`.
    pub fn value_count(&self, ctx: ExecutionContext) -> usize {
        self.lock_shard(ctx).get(&ctx).map_or(0, HashMap::len)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn lock_shard(&self, ctx: ExecutionContext) -> MutexGuard<'_, Shard> {
        let index = (ctx.shard_seed() as usize) & self.mask;
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ContextLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ContextLocalStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextLocalStore")
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}
