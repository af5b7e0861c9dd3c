//! Implementation descriptors and the bundled static implementation source.

use crate::contract::{is_valid_capability_name, OperationSignature};
use log::info;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

/// Error type a constructor may fail with.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

pub(crate) type Instance = Box<dyn Any + Send + Sync>;
type Constructor = Box<dyn Fn() -> Result<Instance, BoxError> + Send + Sync>;
// Turns an erased instance into an erased `Arc<I>` for one interface `I`.
type Binder = Box<dyn Fn(Instance) -> Option<Instance> + Send + Sync>;

/// One interface view of an implementation, tied to the contract it serves.
struct Binding {
    contract: String,
    binder: Binder,
}

/// Identity of the code asking for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerScope(Option<String>);

impl CallerScope {
    /// Anonymous caller; only `Visibility::Public` implementations admit it.
    pub fn public() -> Self {
        Self(None)
    }

    /// Named caller scope, e.g. a module or subsystem id.
    pub fn named(scope: impl Into<String>) -> Self {
        Self(Some(scope.into()))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl Display for CallerScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(scope) => write!(f, "{scope}"),
            None => write!(f, "<public>"),
        }
    }
}

/// Who may construct an implementation through the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Only the listed caller scopes may construct.
    Restricted(BTreeSet<String>),
    /// Never constructible through the loader.
    Private,
}

impl Visibility {
    pub fn restricted_to<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Restricted(scopes.into_iter().map(Into::into).collect())
    }

    pub fn permits(&self, caller: &CallerScope) -> bool {
        match self {
            Self::Public => true,
            Self::Restricted(scopes) => caller.name().is_some_and(|name| scopes.contains(name)),
            Self::Private => false,
        }
    }
}

/// Whether an implementation can be instantiated at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationKind {
    Concrete,
    /// Declared but incomplete; construction always fails.
    Abstract,
}

/// A constructible type registered under a name.
pub struct Implementation {
    name: String,
    type_name: &'static str,
    visibility: Visibility,
    kind: ImplementationKind,
    constructor: Option<Constructor>,
    operations: BTreeSet<OperationSignature>,
    bindings: HashMap<TypeId, Binding>,
}

impl Implementation {
    /// Starts describing concrete type `C` under `name`.
    pub fn builder<C: Send + Sync + 'static>(name: impl Into<String>) -> ImplementationBuilder<C> {
        ImplementationBuilder {
            name: name.into(),
            visibility: Visibility::Public,
            kind: ImplementationKind::Concrete,
            constructor: None,
            operations: BTreeSet::new(),
            bindings: HashMap::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type name of the concrete type, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn kind(&self) -> ImplementationKind {
        self.kind
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Declared operation surface.
    pub fn operations(&self) -> impl Iterator<Item = &OperationSignature> {
        self.operations.iter()
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSignature> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Returns whether the implementation can be viewed as interface `I`.
    pub fn binds<I: ?Sized + 'static>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<I>())
    }

    /// Contract name interface `I` was bound for, if bound at all.
    pub fn bound_contract<I: ?Sized + 'static>(&self) -> Option<&str> {
        self.bindings
            .get(&TypeId::of::<I>())
            .map(|binding| binding.contract.as_str())
    }

    pub(crate) fn construct(&self) -> Option<Result<Instance, BoxError>> {
        self.constructor.as_ref().map(|ctor| ctor())
    }

    pub(crate) fn bind<I: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Instance,
    ) -> Option<Arc<I>> {
        let binding = self.bindings.get(&TypeId::of::<I>())?;
        let bound = (binding.binder)(instance)?;
        bound.downcast::<Arc<I>>().ok().map(|arc| *arc)
    }
}

impl Debug for Implementation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Implementation")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("visibility", &self.visibility)
            .field("kind", &self.kind)
            .field("has_constructor", &self.constructor.is_some())
            .field("operations", &self.operations)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Builder for [`Implementation`].
pub struct ImplementationBuilder<C> {
    name: String,
    visibility: Visibility,
    kind: ImplementationKind,
    constructor: Option<Constructor>,
    operations: BTreeSet<OperationSignature>,
    bindings: HashMap<TypeId, Binding>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> ImplementationBuilder<C> {
    /// Sets the parameterless construction path.
    pub fn constructor<F>(mut self, ctor: F) -> Self
    where
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        let constructor: Constructor =
            Box::new(move || ctor().map(|value| Box::new(value) as Instance));
        self.constructor = Some(constructor);
        self
    }

    /// Uses `C::default()` as the construction path.
    pub fn default_constructor(self) -> Self
    where
        C: Default,
    {
        self.constructor(|| Ok(C::default()))
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Marks the implementation as not instantiable.
    pub fn abstract_type(mut self) -> Self {
        self.kind = ImplementationKind::Abstract;
        self
    }

    /// Declares one operation the concrete type exposes.
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
            .insert(OperationSignature::new(name, params, returns));
        self
    }

    /// Declares that `C` serves contract `contract` through interface `I`.
    ///
    /// `bind` performs the unsizing, e.g. `|c| Arc::new(c) as Arc<dyn Greeter>`.
    /// A load of `I` succeeds only under a contract with this name.
    pub fn implements<I, F>(mut self, contract: impl Into<String>, bind: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(C) -> Arc<I> + Send + Sync + 'static,
    {
        let binder: Binder = Box::new(move |instance: Instance| {
            let concrete = instance.downcast::<C>().ok()?;
            Some(Box::new(bind(*concrete)) as Instance)
        });
        self.bindings.insert(
            TypeId::of::<I>(),
            Binding {
                contract: contract.into().trim().to_string(),
                binder,
            },
        );
        self
    }

    pub fn build(self) -> Result<Implementation, ImplementationRegistryError> {
        let name = self.name.trim().to_string();
        if !is_valid_capability_name(&name) {
            return Err(ImplementationRegistryError::InvalidName(name));
        }
        Ok(Implementation {
            name,
            type_name: std::any::type_name::<C>(),
            visibility: self.visibility,
            kind: self.kind,
            constructor: self.constructor,
            operations: self.operations,
            bindings: self.bindings,
        })
    }
}

/// Name-to-implementation resolution mechanism used by the loader.
///
/// Any backing is acceptable: a static table, a plugin directory scan, a
/// configuration-driven map. `resolve` must not block other `resolve` calls.
pub trait ImplementationSource: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<Implementation>>;
}

/// Implementation registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplementationRegistryError {
    InvalidName(String),
    DuplicateImplementation(String),
}

impl Display for ImplementationRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "implementation name is invalid: {value}"),
            Self::DuplicateImplementation(value) => {
                write!(f, "implementation already registered: {value}")
            }
        }
    }
}

impl Error for ImplementationRegistryError {}

/// In-process, `RwLock`-backed implementation table.
#[derive(Debug, Default)]
pub struct StaticImplementationRegistry {
    entries: RwLock<BTreeMap<String, Arc<Implementation>>>,
}

impl StaticImplementationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one implementation; names are unique.
    pub fn register(
        &self,
        implementation: Implementation,
    ) -> Result<(), ImplementationRegistryError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(implementation.name()) {
            return Err(ImplementationRegistryError::DuplicateImplementation(
                implementation.name().to_string(),
            ));
        }
        info!(
            "event=implementation_register module=provider status=ok name={} type={}",
            implementation.name(),
            implementation.type_name()
        );
        entries.insert(implementation.name().to_string(), Arc::new(implementation));
        Ok(())
    }

    /// Returns sorted implementation names.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImplementationSource for StaticImplementationRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<Implementation>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name.trim())
            .cloned()
    }
}
