//! Test Utilities Crate
//!
//! Shared test infrastructure for the E-Klaim gateway test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built claim payloads, configs and contexts
//! - `builders`: Claims and audit entries in any lifecycle state
//! - `generators`: Property-based test data generators
//! - `assertions`: Assertion helpers for claims and audit trails
//! - `fake_eklaim`: Wiremock server speaking the encrypted wire protocol
//! - `harness`: Gateway wired to in-memory stores and the fake server
//! - `database`: PostgreSQL test containers

pub mod fixtures;
pub mod builders;
pub mod generators;
pub mod assertions;
pub mod fake_eklaim;
pub mod harness;
pub mod database;

pub use fixtures::*;
pub use builders::*;
pub use generators::*;
pub use assertions::*;
pub use fake_eklaim::FakeEklaim;
pub use harness::GatewayHarness;
pub use database::*;
