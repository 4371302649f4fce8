//! Port adapters over PostgreSQL
//!
//! Each repository implements one `domain_claims` port with runtime-checked
//! SQLx queries and maps rows into domain types.

pub mod claims;
pub mod configs;
pub mod audit;

pub use claims::PgClaimRepository;
pub use configs::PgConfigRepository;
pub use audit::PgAuditRepository;
