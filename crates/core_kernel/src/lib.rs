//! Core Kernel - Foundational types for the E-Klaim gateway
//!
//! This crate provides the building blocks shared by every other crate:
//! - Strongly-typed identifiers for claims and audit entries
//! - Port plumbing (errors, health checks) for swappable adapters
//! - The request context that travels with every lifecycle call

pub mod identifiers;
pub mod ports;

pub use identifiers::{ClaimId, AuditEventId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    RequestContext,
};
