//! Capability-keyed, context-local value store with dynamically-loaded,
//! contract-validated providers.
//! This crate is the single source of truth for the store and loader invariants.

pub mod config;
pub mod context;
pub mod contract;
pub mod key;
pub mod logging;
pub mod provider;
pub mod store;

pub use config::{ConfigError, CoreConfig, StoreConfig};
pub use context::{ContextGuard, ExecutionContext};
pub use contract::{
    CapabilityContract, ContractBuilder, ContractRegistry, ContractRegistryError, ContractResult,
    ContractValidationError, OperationSignature,
};
pub use key::CapabilityKey;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use provider::error::{
    ConstructorFailure, ContractMismatch, IncompatibleOperation, LoadError, LoadErrorKind,
    LoadOutcome, MisboundInterface,
};
pub use provider::handle::ProviderHandle;
pub use provider::implementation::{
    BoxError, CallerScope, Implementation, ImplementationBuilder, ImplementationKind,
    ImplementationRegistryError, ImplementationSource, StaticImplementationRegistry, Visibility,
};
pub use provider::loader::ProviderLoader;
pub use store::ContextLocalStore;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
