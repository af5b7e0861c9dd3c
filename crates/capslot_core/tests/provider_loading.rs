use capslot_core::{
    CallerScope, CapabilityContract, ContractRegistry, Implementation, LoadError, LoadErrorKind,
    OperationSignature, ProviderLoader, StaticImplementationRegistry, Visibility,
};
use std::sync::Arc;

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

trait Translator: Send + Sync {
    fn translate(&self, text: &str, target: &str) -> String;
}

#[derive(Default)]
struct ValidType {
    greeting: String,
}

impl ValidType {
    // Not part of any contract; must stay unreachable through a handle.
    #[allow(dead_code)]
    fn reset(&mut self) {
        self.greeting.clear();
    }
}

impl Greeter for ValidType {
    fn greet(&self, name: &str) -> String {
        format!("{} {name}", self.greeting)
    }
}

struct PrivateGreeter;

impl Greeter for PrivateGreeter {
    fn greet(&self, name: &str) -> String {
        format!("psst {name}")
    }
}

struct MultiType;

impl Greeter for MultiType {
    fn greet(&self, name: &str) -> String {
        format!("hi {name}")
    }
}

fn contract_x() -> CapabilityContract {
    CapabilityContract::builder("Greeter")
        .operation("greet", ["&str"], "String")
        .build()
        .expect("contract x")
}

fn contract_y() -> CapabilityContract {
    CapabilityContract::builder("Translator")
        .operation("translate", ["&str", "&str"], "String")
        .build()
        .expect("contract y")
}

fn loader() -> ProviderLoader {
    let registry = StaticImplementationRegistry::new();
    registry
        .register(
            Implementation::builder::<ValidType>("ValidType")
                .constructor(|| {
                    Ok(ValidType {
                        greeting: "hello".to_string(),
                    })
                })
                .operation("greet", ["&str"], "String")
                .operation("reset", Vec::<String>::new(), "()")
                .implements("Greeter", |value| Arc::new(value) as Arc<dyn Greeter>)
                .build()
                .expect("valid type"),
        )
        .expect("register valid type");
    registry
        .register(
            Implementation::builder::<PrivateGreeter>("TypeWithPrivateCtor")
                .constructor(|| Ok(PrivateGreeter))
                .visibility(Visibility::Private)
                .operation("greet", ["&str"], "String")
                .implements("Greeter", |value| Arc::new(value) as Arc<dyn Greeter>)
                .build()
                .expect("private type"),
        )
        .expect("register private type");
    registry
        .register(
            Implementation::builder::<MultiType>("MultiType")
                .constructor(|| Ok(MultiType))
                .operation("greet", ["&str"], "String")
                .operation("translate", ["&str", "&str"], "String")
                .implements("Greeter", |value| Arc::new(value) as Arc<dyn Greeter>)
                .build()
                .expect("multi type"),
        )
        .expect("register multi type");
    ProviderLoader::new(Arc::new(registry))
}

#[test]
fn missing_type_is_implementation_not_found() {
    let err = loader()
        .load::<dyn Greeter>("MissingType", &contract_x())
        .expect_err("missing type must fail");
    assert_eq!(err.kind(), LoadErrorKind::ImplementationNotFound);
    assert!(err.kind().allows_fallback());
    assert!(matches!(err, LoadError::ImplementationNotFound { ref name } if name == "MissingType"));
}

#[test]
fn private_constructor_is_not_permitted() {
    let err = loader()
        .load::<dyn Greeter>("TypeWithPrivateCtor", &contract_x())
        .expect_err("private constructor must fail");
    assert_eq!(err.kind(), LoadErrorKind::ConstructionNotPermitted);

    let err = loader()
        .load_as::<dyn Greeter>(
            &CallerScope::named("greeting"),
            "TypeWithPrivateCtor",
            &contract_x(),
        )
        .expect_err("private constructor must fail for named callers too");
    assert_eq!(err.kind(), LoadErrorKind::ConstructionNotPermitted);
}

#[test]
fn valid_type_loads_and_exposes_exactly_the_contract() {
    let contract = contract_x();
    let handle = loader()
        .load::<dyn Greeter>("ValidType", &contract)
        .expect("valid type should load");

    assert_eq!(handle.greet("world"), "hello world");
    let exposed: Vec<&OperationSignature> = handle.operations().collect();
    let declared: Vec<&OperationSignature> = contract.operations().collect();
    assert_eq!(exposed, declared);
    assert!(handle.contract().operation("reset").is_none());
}

#[test]
fn valid_type_against_unimplemented_contract_is_mismatch() {
    let err = loader()
        .load::<dyn Translator>("ValidType", &contract_y())
        .expect_err("unimplemented contract must fail");
    assert_eq!(err.kind(), LoadErrorKind::ContractMismatch);
    assert!(!err.kind().allows_fallback());

    match err {
        LoadError::ContractMismatch {
            contract, mismatch, ..
        } => {
            assert_eq!(contract, "Translator");
            assert_eq!(mismatch.missing.len(), 1);
            assert_eq!(mismatch.missing[0].name, "translate");
            assert!(mismatch.unbound_interface.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn handles_are_shareable_across_threads() {
    let handle = loader()
        .load::<dyn Greeter>("ValidType", &contract_x())
        .expect("valid type should load");

    std::thread::scope(|scope| {
        for index in 0..4 {
            let handle = handle.clone();
            scope.spawn(move || {
                assert_eq!(handle.greet(&index.to_string()), format!("hello {index}"));
            });
        }
    });
}

#[test]
fn loads_against_contracts_resolved_from_registry() {
    let contracts = ContractRegistry::new();
    contracts.publish("Greeter", contract_x()).expect("publish");
    let contract = contracts.resolve("Greeter").expect("published contract");

    let handle = loader()
        .load::<dyn Greeter>("ValidType", &contract)
        .expect("valid type should load");
    assert_eq!(handle.contract().name(), "Greeter");
}

#[test]
fn interface_must_describe_the_requested_contract() {
    let err = loader()
        .load::<dyn Greeter>("MultiType", &contract_y())
        .expect_err("greeter view must not load under translator contract");
    assert_eq!(err.kind(), LoadErrorKind::ContractMismatch);

    match err {
        LoadError::ContractMismatch {
            contract, mismatch, ..
        } => {
            assert_eq!(contract, "Translator");
            assert!(mismatch.missing.is_empty());
            assert!(mismatch.incompatible.is_empty());
            assert!(mismatch.unbound_interface.is_none());
            let misbound = mismatch.misbound_interface.expect("misbound interface");
            assert_eq!(misbound.bound_contract, "Greeter");
        }
        other => panic!("unexpected error: {other}"),
    }

    let handle = loader()
        .load::<dyn Greeter>("MultiType", &contract_x())
        .expect("greeter view should load under greeter contract");
    assert_eq!(handle.greet("x"), "hi x");
}
