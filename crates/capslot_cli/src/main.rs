//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `capslot_core` linkage with one store round-trip and one load.
//! - Keep output deterministic for quick local sanity checks.

use capslot_core::{
    CapabilityContract, CapabilityKey, ContextLocalStore, CoreConfig, Implementation,
    ProviderLoader, StaticImplementationRegistry,
};
use std::process::ExitCode;
use std::sync::Arc;

trait Echo: Send + Sync {
    fn echo(&self, input: &str) -> String;
}

#[derive(Default)]
struct UpperEcho;

impl Echo for UpperEcho {
    fn echo(&self, input: &str) -> String {
        input.to_uppercase()
    }
}

fn main() -> ExitCode {
    let config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("capslot config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = capslot_core::init_logging_from_config(&config) {
        eprintln!("capslot logging error: {err}");
        return ExitCode::FAILURE;
    }

    println!("capslot_core ping={}", capslot_core::ping());
    println!("capslot_core version={}", capslot_core::core_version());

    let store = ContextLocalStore::with_config(&config.store);
    let key = CapabilityKey::<u32>::issue_labeled("smoke");
    let roundtrip = {
        let scope = store.enter();
        store.set(scope.context(), &key, 7);
        store.get(scope.context(), &key)
    };
    println!("capslot_core store_roundtrip={roundtrip:?}");

    match load_echo() {
        Ok(output) => println!("capslot_core provider_load=ok echo={output}"),
        Err(err) => {
            println!("capslot_core provider_load=error reason={err}");
            return ExitCode::FAILURE;
        }
    }
    log::info!("event=cli_smoke module=cli status=ok");
    ExitCode::SUCCESS
}

fn load_echo() -> Result<String, Box<dyn std::error::Error>> {
    let contract = CapabilityContract::builder("Echo")
        .operation("echo", ["&str"], "String")
        .build()?;
    let registry = StaticImplementationRegistry::new();
    registry.register(
        Implementation::builder::<UpperEcho>("UpperEcho")
            .default_constructor()
            .operation("echo", ["&str"], "String")
            .implements("Echo", |echo| Arc::new(echo) as Arc<dyn Echo>)
            .build()?,
    )?;
    let loader = ProviderLoader::new(Arc::new(registry));
    let handle = loader.load::<dyn Echo>("UpperEcho", &contract)?;
    Ok(handle.echo("ping"))
}
