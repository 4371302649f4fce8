//! E-Klaim Claim Lifecycle
//!
//! This crate keeps the hospital's local claim mirror consistent with the
//! claim held by E-Klaim and records every call in the audit trail.
//!
//! # Claim Lifecycle
//!
//! ```text
//! Draft -> DataEntered -> GroupedIdrg -> GroupedInacbg -> Finalized -> Submitted
//!             ^                                              |
//!             +----------------- reedit ---------------------+
//! ```

pub mod claim;
pub mod audit;
pub mod gateway;
pub mod ports;
pub mod error;

pub use claim::{Claim, ClaimEvent, ClaimStatus, GrouperStage, IdrgGrouping, InacbgGrouping, NewClaim, TopUps};
pub use audit::{AuditLogEntry, AuditQuery, AuditWriter};
pub use gateway::ClaimGateway;
pub use ports::{AuditStore, ClaimStore, ConfigStore};
pub use error::ClaimError;
