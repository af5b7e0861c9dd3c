//! Load failure taxonomy.

use crate::contract::OperationSignature;
use crate::provider::implementation::{BoxError, CallerScope};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of one provider load.
pub type LoadOutcome<I> = Result<crate::provider::handle::ProviderHandle<I>, LoadError>;

/// Discriminant of [`LoadError`], for deterministic branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadErrorKind {
    ImplementationNotFound,
    NoUsableConstructor,
    ConstructionNotPermitted,
    NotInstantiable,
    ConstructorFailed,
    ContractMismatch,
}

impl LoadErrorKind {
    /// Whether trying a different implementation name is a sensible recovery.
    ///
    /// `ConstructorFailed` and `ContractMismatch` indicate a broken environment
    /// or a wrong contract; retrying other names would mask them.
    pub fn allows_fallback(self) -> bool {
        matches!(
            self,
            Self::ImplementationNotFound
                | Self::NoUsableConstructor
                | Self::ConstructionNotPermitted
                | Self::NotInstantiable
        )
    }

    /// Stable string id used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImplementationNotFound => "implementation_not_found",
            Self::NoUsableConstructor => "no_usable_constructor",
            Self::ConstructionNotPermitted => "construction_not_permitted",
            Self::NotInstantiable => "not_instantiable",
            Self::ConstructorFailed => "constructor_failed",
            Self::ContractMismatch => "contract_mismatch",
        }
    }
}

/// Why a constructor did not produce an instance.
#[derive(Debug)]
pub enum ConstructorFailure {
    /// The constructor returned an error.
    Error(BoxError),
    /// The constructor panicked; payload is sanitized and truncated.
    Panicked(String),
}

impl Display for ConstructorFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{err}"),
            Self::Panicked(payload) => write!(f, "constructor panicked: {payload}"),
        }
    }
}

/// A required operation the implementation declares with another signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatibleOperation {
    pub required: OperationSignature,
    pub provided: OperationSignature,
}

/// Interface `I` is bound, but for a contract other than the requested one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisboundInterface {
    pub interface: &'static str,
    pub bound_contract: String,
}

/// Structural conformance report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractMismatch {
    pub missing: Vec<OperationSignature>,
    pub incompatible: Vec<IncompatibleOperation>,
    /// Set when the implementation has no binding to the requested interface.
    pub unbound_interface: Option<&'static str>,
    /// Set when the interface binding serves a different contract.
    pub misbound_interface: Option<MisboundInterface>,
}

impl ContractMismatch {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
            && self.incompatible.is_empty()
            && self.unbound_interface.is_none()
            && self.misbound_interface.is_none()
    }
}

impl Display for ContractMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            let missing = self
                .missing
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            parts.push(format!("missing [{missing}]"));
        }
        for op in &self.incompatible {
            parts.push(format!(
                "incompatible `{}` (required {}, provided {})",
                op.required.name, op.required, op.provided
            ));
        }
        if let Some(interface) = self.unbound_interface {
            parts.push(format!("no binding to interface `{interface}`"));
        }
        if let Some(misbound) = &self.misbound_interface {
            parts.push(format!(
                "interface `{}` is bound for contract `{}`",
                misbound.interface, misbound.bound_contract
            ));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Classified load failure. Every variant is recoverable by the caller.
#[derive(Debug)]
pub enum LoadError {
    ImplementationNotFound {
        name: String,
    },
    NoUsableConstructor {
        name: String,
    },
    ConstructionNotPermitted {
        name: String,
        caller: CallerScope,
    },
    NotInstantiable {
        name: String,
    },
    ConstructorFailed {
        name: String,
        cause: ConstructorFailure,
    },
    ContractMismatch {
        name: String,
        contract: String,
        mismatch: ContractMismatch,
    },
}

impl LoadError {
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            Self::ImplementationNotFound { .. } => LoadErrorKind::ImplementationNotFound,
            Self::NoUsableConstructor { .. } => LoadErrorKind::NoUsableConstructor,
            Self::ConstructionNotPermitted { .. } => LoadErrorKind::ConstructionNotPermitted,
            Self::NotInstantiable { .. } => LoadErrorKind::NotInstantiable,
            Self::ConstructorFailed { .. } => LoadErrorKind::ConstructorFailed,
            Self::ContractMismatch { .. } => LoadErrorKind::ContractMismatch,
        }
    }

    /// Implementation name the failed load asked for.
    pub fn implementation_name(&self) -> &str {
        match self {
            Self::ImplementationNotFound { name }
            | Self::NoUsableConstructor { name }
            | Self::ConstructionNotPermitted { name, .. }
            | Self::NotInstantiable { name }
            | Self::ConstructorFailed { name, .. }
            | Self::ContractMismatch { name, .. } => name,
        }
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImplementationNotFound { name } => {
                write!(f, "implementation not found: {name}")
            }
            Self::NoUsableConstructor { name } => {
                write!(f, "implementation has no usable constructor: {name}")
            }
            Self::ConstructionNotPermitted { name, caller } => {
                write!(f, "caller `{caller}` may not construct implementation: {name}")
            }
            Self::NotInstantiable { name } => {
                write!(f, "implementation cannot be instantiated: {name}")
            }
            Self::ConstructorFailed { name, cause } => {
                write!(f, "constructor of `{name}` failed: {cause}")
            }
            Self::ContractMismatch {
                name,
                contract,
                mismatch,
            } => write!(
                f,
                "implementation `{name}` does not satisfy contract `{contract}`: {mismatch}"
            ),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConstructorFailed {
                cause: ConstructorFailure::Error(err),
                ..
            } => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ContractMismatch, IncompatibleOperation, LoadErrorKind, MisboundInterface};
    use crate::contract::OperationSignature;

    #[test]
    fn only_resolution_failures_allow_fallback() {
        assert!(LoadErrorKind::ImplementationNotFound.allows_fallback());
        assert!(LoadErrorKind::NoUsableConstructor.allows_fallback());
        assert!(LoadErrorKind::ConstructionNotPermitted.allows_fallback());
        assert!(LoadErrorKind::NotInstantiable.allows_fallback());
        assert!(!LoadErrorKind::ConstructorFailed.allows_fallback());
        assert!(!LoadErrorKind::ContractMismatch.allows_fallback());
    }

    #[test]
    fn mismatch_report_lists_every_problem() {
        let mismatch = ContractMismatch {
            missing: vec![OperationSignature::new("close", Vec::<String>::new(), "()")],
            incompatible: vec![IncompatibleOperation {
                required: OperationSignature::new("read", ["usize"], "Vec<u8>"),
                provided: OperationSignature::new("read", ["u32"], "Vec<u8>"),
            }],
            unbound_interface: Some("dyn Reader"),
            misbound_interface: None,
        };
        let rendered = mismatch.to_string();
        assert!(rendered.contains("missing [close() -> ()]"));
        assert!(rendered.contains("incompatible `read`"));
        assert!(rendered.contains("dyn Reader"));
        assert!(!mismatch.is_empty());
        assert!(ContractMismatch::default().is_empty());

        let misbound = ContractMismatch {
            misbound_interface: Some(MisboundInterface {
                interface: "dyn Greeter",
                bound_contract: "Greeter".to_string(),
            }),
            ..ContractMismatch::default()
        };
        assert!(!misbound.is_empty());
        assert!(misbound
            .to_string()
            .contains("interface `dyn Greeter` is bound for contract `Greeter`"));
    }
}
