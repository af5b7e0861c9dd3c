//! Name-driven provider loading.
//!
//! # Responsibility
//! - Run resolve -> constructor lookup -> permission -> construct -> conform
//!   -> wrap, in that order, for one implementation name.
//! - Map each way this can fail onto exactly one `LoadError` variant.
//!
//! # Invariants
//! - Contract conformance is checked once per load, never per call.
//! - A constructor panic is contained, kept off stderr, and reported as
//!   `ConstructorFailed`.

use crate::contract::CapabilityContract;
use crate::logging::{contain_panics, panic_payload_text};
use crate::provider::error::{
    ConstructorFailure, ContractMismatch, IncompatibleOperation, LoadError, LoadOutcome,
    MisboundInterface,
};
use crate::provider::handle::ProviderHandle;
use crate::provider::implementation::{
    CallerScope, Implementation, ImplementationKind, ImplementationSource,
};
use log::{debug, warn};
use std::sync::Arc;

/// Loads providers from one implementation source.
#[derive(Clone)]
pub struct ProviderLoader {
    source: Arc<dyn ImplementationSource>,
}

impl ProviderLoader {
    pub fn new(source: Arc<dyn ImplementationSource>) -> Self {
        Self { source }
    }

    /// Loads `name` as an anonymous public caller.
    pub fn load<I>(&self, name: &str, contract: &CapabilityContract) -> LoadOutcome<I>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.load_as(&CallerScope::public(), name, contract)
    }

    /// Loads `name` on behalf of `caller`.
    pub fn load_as<I>(
        &self,
        caller: &CallerScope,
        name: &str,
        contract: &CapabilityContract,
    ) -> LoadOutcome<I>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let name = name.trim();
        let outcome = self.load_inner::<I>(caller, name, contract);
        match &outcome {
            Ok(_) => debug!(
                "event=provider_load module=provider status=ok name={name} contract={} caller={caller}",
                contract.name()
            ),
            Err(err) => warn!(
                "event=provider_load module=provider status=error kind={} name={name} contract={} caller={caller}",
                err.kind().as_str(),
                contract.name()
            ),
        }
        outcome
    }

    /// Tries `names` in order, moving on only when the failure allows fallback.
    ///
    /// Returns the first success, the first non-fallback failure, or the last
    /// failure when every name was tried.
    pub fn load_first<I>(
        &self,
        caller: &CallerScope,
        names: &[&str],
        contract: &CapabilityContract,
    ) -> LoadOutcome<I>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let mut last_error = None;
        for name in names {
            match self.load_as::<I>(caller, name, contract) {
                Ok(handle) => return Ok(handle),
                Err(err) if err.kind().allows_fallback() => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| LoadError::ImplementationNotFound {
            name: String::new(),
        }))
    }

    fn load_inner<I>(
        &self,
        caller: &CallerScope,
        name: &str,
        contract: &CapabilityContract,
    ) -> LoadOutcome<I>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let implementation =
            self.source
                .resolve(name)
                .ok_or_else(|| LoadError::ImplementationNotFound {
                    name: name.to_string(),
                })?;

        if !implementation.has_constructor() {
            return Err(LoadError::NoUsableConstructor {
                name: name.to_string(),
            });
        }

        if !implementation.visibility().permits(caller) {
            return Err(LoadError::ConstructionNotPermitted {
                name: name.to_string(),
                caller: caller.clone(),
            });
        }

        if implementation.kind() == ImplementationKind::Abstract {
            return Err(LoadError::NotInstantiable {
                name: name.to_string(),
            });
        }

        let instance = match contain_panics(|| implementation.construct()) {
            Ok(Some(Ok(instance))) => instance,
            Ok(Some(Err(err))) => {
                return Err(LoadError::ConstructorFailed {
                    name: name.to_string(),
                    cause: ConstructorFailure::Error(err),
                })
            }
            Ok(None) => {
                return Err(LoadError::NoUsableConstructor {
                    name: name.to_string(),
                })
            }
            Err(payload) => {
                return Err(LoadError::ConstructorFailed {
                    name: name.to_string(),
                    cause: ConstructorFailure::Panicked(panic_payload_text(payload.as_ref())),
                })
            }
        };

        let mismatch = check_conformance::<I>(&implementation, contract);
        if !mismatch.is_empty() {
            return Err(LoadError::ContractMismatch {
                name: name.to_string(),
                contract: contract.name().to_string(),
                mismatch,
            });
        }

        let Some(inner) = implementation.bind::<I>(instance) else {
            return Err(LoadError::ContractMismatch {
                name: name.to_string(),
                contract: contract.name().to_string(),
                mismatch: ContractMismatch {
                    unbound_interface: Some(std::any::type_name::<I>()),
                    ..ContractMismatch::default()
                },
            });
        };

        Ok(ProviderHandle::new(
            inner,
            Arc::new(contract.clone()),
            implementation.name(),
        ))
    }
}

/// Compares the declared surface of `implementation` with `contract`, and
/// checks that interface `I` is bound for that same contract.
fn check_conformance<I: ?Sized + 'static>(
    implementation: &Implementation,
    contract: &CapabilityContract,
) -> ContractMismatch {
    let mut mismatch = ContractMismatch::default();
    for required in contract.operations() {
        match implementation.operation(&required.name) {
            None => mismatch.missing.push(required.clone()),
            Some(provided) if !required.is_compatible_with(provided) => {
                mismatch.incompatible.push(IncompatibleOperation {
                    required: required.clone(),
                    provided: provided.clone(),
                });
            }
            Some(_) => {}
        }
    }
    match implementation.bound_contract::<I>() {
        None => mismatch.unbound_interface = Some(std::any::type_name::<I>()),
        Some(bound) if bound != contract.name() => {
            mismatch.misbound_interface = Some(MisboundInterface {
                interface: std::any::type_name::<I>(),
                bound_contract: bound.to_string(),
            });
        }
        Some(_) => {}
    }
    mismatch
}

impl std::fmt::Debug for ProviderLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderLoader").finish_non_exhaustive()
    }
}
