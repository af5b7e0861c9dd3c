//! Capability contracts and the contract registry.
//!
//! # Responsibility
//! - Describe the operation set a provider implementation must expose.
//! - Publish immutable contracts by name for structural validation.
//!
//! # Invariants
//! - A published contract never changes; republishing the identical contract
//!   under the same name is idempotent, a different one is rejected.
//! - `resolve` calls never block one another; `publish` is exclusive.

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

static CONTRACT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*$")
        .expect("valid contract name regex")
});
static OPERATION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid operation name regex"));
static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S(.*\S)?$").expect("valid type name regex"));

pub type ContractResult<T> = Result<T, ContractRegistryError>;

/// Returns whether `value` is a well-formed contract or implementation name.
pub fn is_valid_capability_name(value: &str) -> bool {
    CONTRACT_NAME_RE.is_match(value)
}

/// One required operation: name, parameter types, return type.
///
/// Types are compared by their declared names; two signatures are compatible
/// only when all three parts match exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationSignature {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "unit_type_name")]
    pub returns: String,
}

fn unit_type_name() -> String {
    "()".to_string()
}

impl OperationSignature {
    pub fn new<P, S>(name: impl Into<String>, params: P, returns: impl Into<String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            returns: returns.into(),
        }
    }

    /// Returns whether `other` can stand in for this required operation.
    pub fn is_compatible_with(&self, other: &OperationSignature) -> bool {
        self == other
    }

    fn validate(&self) -> Result<(), ContractValidationError> {
        if !OPERATION_NAME_RE.is_match(&self.name) {
            return Err(ContractValidationError::InvalidOperationName(
                self.name.clone(),
            ));
        }
        for type_name in self.params.iter().chain(std::iter::once(&self.returns)) {
            if !TYPE_NAME_RE.is_match(type_name) {
                return Err(ContractValidationError::InvalidTypeName {
                    operation: self.name.clone(),
                    type_name: type_name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Display for OperationSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.name,
            self.params.join(", "),
            self.returns
        )
    }
}

/// Named, immutable set of required operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityContract {
    name: String,
    operations: BTreeSet<OperationSignature>,
}

impl CapabilityContract {
    pub fn builder(name: impl Into<String>) -> ContractBuilder {
        ContractBuilder {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationSignature> {
        self.operations.iter()
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSignature> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Validates declaration-level invariants.
    ///
    /// Deserialized contracts bypass the builder, so the registry re-checks.
    pub fn validate(&self) -> Result<(), ContractValidationError> {
        if self.name.trim().is_empty() {
            return Err(ContractValidationError::EmptyName);
        }
        if !is_valid_capability_name(&self.name) {
            return Err(ContractValidationError::InvalidName(self.name.clone()));
        }
        if self.operations.is_empty() {
            return Err(ContractValidationError::MissingOperations);
        }
        let mut seen = BTreeSet::<&str>::new();
        for operation in &self.operations {
            operation.validate()?;
            if !seen.insert(operation.name.as_str()) {
                return Err(ContractValidationError::DuplicateOperation(
                    operation.name.clone(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`CapabilityContract`].
#[derive(Debug, Clone)]
pub struct ContractBuilder {
    name: String,
    operations: Vec<OperationSignature>,
}

impl ContractBuilder {
    pub fn operation<P, S>(
        mut self,
        name: impl Into<String>,
        params: P,
        returns: impl Into<String>,
    ) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operations
            .push(OperationSignature::new(name, params, returns));
        self
    }

    pub fn signature(mut self, signature: OperationSignature) -> Self {
        self.operations.push(signature);
        self
    }

    pub fn build(self) -> Result<CapabilityContract, ContractValidationError> {
        let mut operations = BTreeSet::new();
        for operation in self.operations {
            if operations.iter().any(|op: &OperationSignature| op.name == operation.name) {
                return Err(ContractValidationError::DuplicateOperation(operation.name));
            }
            operations.insert(operation);
        }
        let contract = CapabilityContract {
            name: self.name.trim().to_string(),
            operations,
        };
        contract.validate()?;
        Ok(contract)
    }
}

/// Contract declaration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractValidationError {
    EmptyName,
    InvalidName(String),
    MissingOperations,
    DuplicateOperation(String),
    InvalidOperationName(String),
    InvalidTypeName { operation: String, type_name: String },
}

impl Display for ContractValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "contract name must not be empty"),
            Self::InvalidName(value) => write!(f, "contract name is invalid: {value}"),
            Self::MissingOperations => write!(f, "contract must declare at least one operation"),
            Self::DuplicateOperation(value) => {
                write!(f, "contract declares operation more than once: {value}")
            }
            Self::InvalidOperationName(value) => write!(f, "operation name is invalid: {value}"),
            Self::InvalidTypeName {
                operation,
                type_name,
            } => write!(f, "operation `{operation}` has invalid type name `{type_name}`"),
        }
    }
}

impl Error for ContractValidationError {}

/// Contract registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractRegistryError {
    InvalidName(String),
    InvalidContract(ContractValidationError),
    DuplicateContract(String),
}

impl Display for ContractRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "contract registry name is invalid: {value}"),
            Self::InvalidContract(err) => write!(f, "invalid capability contract: {err}"),
            Self::DuplicateContract(value) => write!(
                f,
                "a different contract is already published under: {value}"
            ),
        }
    }
}

impl Error for ContractRegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidContract(err) => Some(err),
            Self::InvalidName(_) | Self::DuplicateContract(_) => None,
        }
    }
}

impl From<ContractValidationError> for ContractRegistryError {
    fn from(value: ContractValidationError) -> Self {
        Self::InvalidContract(value)
    }
}

/// Shared, read-mostly registry of published contracts.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: RwLock<BTreeMap<String, Arc<CapabilityContract>>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `contract` under `name`.
    ///
    /// Returns the shared published instance; an identical republish returns
    /// the instance already stored.
    pub fn publish(
        &self,
        name: &str,
        contract: CapabilityContract,
    ) -> ContractResult<Arc<CapabilityContract>> {
        let name = name.trim();
        if !is_valid_capability_name(name) {
            return Err(ContractRegistryError::InvalidName(name.to_string()));
        }
        contract.validate()?;

        let mut contracts = self
            .contracts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = contracts.get(name) {
            if **existing == contract {
                return Ok(Arc::clone(existing));
            }
            warn!("event=contract_publish module=contract status=rejected reason=duplicate name={name}");
            return Err(ContractRegistryError::DuplicateContract(name.to_string()));
        }

        let published = Arc::new(contract);
        contracts.insert(name.to_string(), Arc::clone(&published));
        info!(
            "event=contract_publish module=contract status=ok name={name} operations={}",
            published.len()
        );
        Ok(published)
    }

    /// Looks up a published contract by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<CapabilityContract>> {
        self.contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name.trim())
            .cloned()
    }

    /// Returns sorted published names.
    pub fn names(&self) -> Vec<String> {
        self.contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
