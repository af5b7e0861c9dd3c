//! Dynamically-loaded, contract-validated providers.
//!
//! # Responsibility
//! - Describe constructible implementations registered under a name.
//! - Resolve, construct, and validate an implementation against a
//!   `CapabilityContract`, classifying every failure.
//! - Hand the instance out only through the capability interface.
//!
//! # Invariants
//! - Validation runs once, at load time; calls through a `ProviderHandle` are
//!   plain trait-object calls.
//! - Expected failures are returned as `LoadError`, never raised as panics.

pub mod error;
pub mod handle;
pub mod implementation;
pub mod loader;
