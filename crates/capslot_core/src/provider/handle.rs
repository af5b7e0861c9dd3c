//! Capability-typed provider handles.

use crate::contract::{CapabilityContract, OperationSignature};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Loaded provider, visible only through interface `I`.
///
/// The concrete type is erased; `Deref` reaches `I` and nothing else. Calls
/// are ordinary dynamic dispatch with no per-call contract check.
pub struct ProviderHandle<I: ?Sized> {
    inner: Arc<I>,
    contract: Arc<CapabilityContract>,
    implementation: Arc<str>,
}

impl<I: ?Sized> ProviderHandle<I> {
    pub(crate) fn new(
        inner: Arc<I>,
        contract: Arc<CapabilityContract>,
        implementation: &str,
    ) -> Self {
        Self {
            inner,
            contract,
            implementation: Arc::from(implementation),
        }
    }

    /// Contract this handle was validated against.
    pub fn contract(&self) -> &CapabilityContract {
        &self.contract
    }

    /// Operations callable through this handle: exactly the contract's.
    pub fn operations(&self) -> impl Iterator<Item = &OperationSignature> {
        self.contract.operations()
    }

    /// Registered name the provider was loaded from.
    pub fn implementation_name(&self) -> &str {
        &self.implementation
    }

    /// Shared pointer to the interface view.
    pub fn share(&self) -> Arc<I> {
        Arc::clone(&self.inner)
    }
}

impl<I: ?Sized> Clone for ProviderHandle<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            contract: Arc::clone(&self.contract),
            implementation: Arc::clone(&self.implementation),
        }
    }
}

impl<I: ?Sized> Deref for ProviderHandle<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.inner
    }
}

impl<I: ?Sized> Debug for ProviderHandle<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("interface", &std::any::type_name::<I>())
            .field("contract", &self.contract.name())
            .field("implementation", &self.implementation)
            .finish()
    }
}
