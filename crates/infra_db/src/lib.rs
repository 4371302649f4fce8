//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the gateway: the connection pool, embedded
//! migrations, and the adapters behind the `ClaimStore`, `ConfigStore` and
//! `AuditStore` ports.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgClaimRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/eklaim")).await?;
//! run_migrations(&pool).await?;
//! let claims = PgClaimRepository::new(pool.clone());
//! ```

pub mod pool;
pub mod error;
pub mod repositories;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use repositories::{PgAuditRepository, PgClaimRepository, PgConfigRepository};
