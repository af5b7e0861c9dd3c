//! Unforgeable, typed capability keys.
//!
//! # Responsibility
//! - Issue identity tokens that index one logical slot in the context store.
//! - Fix the value type of that slot at compile time.
//!
//! # Invariants
//! - Every `issue()` allocates a new identity; keys are equal only when they
//!   share that identity (clones of one issued key).
//! - No API exposes the identity as text or a number, so a key cannot be
//!   rebuilt from outside input.
//! - Labels are diagnostic only and never take part in equality or hashing.

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Internal identity of one issued key.
///
/// Kept crate-private: the store indexes buckets by it, nothing else sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct KeyId(Uuid);

struct KeyCell {
    id: KeyId,
    label: Option<String>,
}

/// Typed capability token for one context-local slot.
///
/// `T` is the only value type the slot can ever hold.
pub struct CapabilityKey<T> {
    cell: Arc<KeyCell>,
    // fn() -> T keeps the key Send + Sync whatever T is.
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> CapabilityKey<T> {
    /// Issues a fresh key. No two calls ever return equal keys.
    pub fn issue() -> Self {
        Self::from_cell(KeyCell {
            id: KeyId(Uuid::new_v4()),
            label: None,
        })
    }

    /// Issues a fresh key carrying a diagnostic label.
    ///
    /// Two keys issued with the same label are still distinct.
    pub fn issue_labeled(label: impl Into<String>) -> Self {
        Self::from_cell(KeyCell {
            id: KeyId(Uuid::new_v4()),
            label: Some(label.into()),
        })
    }

    fn from_cell(cell: KeyCell) -> Self {
        Self {
            cell: Arc::new(cell),
            _marker: PhantomData,
        }
    }
}

impl<T> CapabilityKey<T> {
    /// Diagnostic label, if one was given at issue time.
    pub fn label(&self) -> Option<&str> {
        self.cell.label.as_deref()
    }

    pub(crate) fn id(&self) -> KeyId {
        self.cell.id
    }
}

impl<T> Clone for CapabilityKey<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for CapabilityKey<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Eq for CapabilityKey<T> {}

impl<T> Hash for CapabilityKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.id.hash(state);
    }
}

impl<T> Debug for CapabilityKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("CapabilityKey");
        debug.field("value_type", &std::any::type_name::<T>());
        if let Some(label) = self.label() {
            debug.field("label", &label);
        }
        debug.finish_non_exhaustive()
    }
}
