//! Ports and Adapters Infrastructure
//!
//! Foundational types for the hexagonal layout used across the gateway.
//! The claim mirror, the provider configuration and the audit trail are all
//! owned by external collaborators; the domain reaches them through port
//! traits that extend the marker traits defined here.
//!
//! ```text
//!            ClaimGateway / AuditWriter
//!                       │
//!                       ▼
//!   ClaimStore · ConfigStore · AuditStore   (domain_claims::ports)
//!          ▲                         ▲
//!          │                         │
//!   PostgreSQL adapters        In-memory adapters
//!       (infra_db)            (feature = "mock")
//! ```

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error type for port operations
///
/// Every storage adapter reports failures through this type so the domain
/// does not depend on a particular database driver.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
    },

    /// The operation conflicts with existing data (unique constraint)
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A data transformation error occurred
    #[error("Transformation error: {message}")]
    Transformation {
        message: String,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    ///
    /// # Arguments
    ///
    /// * `entity_type` - Kind of record that was looked up (e.g., "Claim")
    /// * `id` - Identifier used in the lookup
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_kernel::PortError;
    ///
    /// let err = PortError::not_found("Claim", "EK-0001");
    /// assert!(err.is_not_found());
    /// assert_eq!(err.to_string(), "Not found: Claim with id EK-0001");
    /// ```
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a Transformation error
    pub fn transformation(message: impl Into<String>) -> Self {
        PortError::Transformation {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    ///
    /// Only connection failures qualify. A conflict or validation error will
    /// fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. })
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    /// Returns true if this error is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

/// Marker trait for all domain ports
///
/// All port traits extend this marker so they are thread-safe and can be
/// shared behind `Arc<dyn _>` in async contexts.
pub trait DomainPort: Send + Sync + 'static {}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    /// Adapter is healthy and operational
    Healthy,
    /// Adapter is degraded but operational
    Degraded,
    /// Adapter is unhealthy and not operational
    Unhealthy,
    /// Health status is unknown
    Unknown,
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Adapter identifier
    pub adapter_id: String,
    /// Current health status
    pub status: AdapterHealth,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
    /// Optional message with additional details
    pub message: Option<String>,
    /// Timestamp of the health check
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

impl HealthCheckResult {
    /// Builds a healthy result with no message
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: chrono::Utc::now(),
        }
    }

    /// Builds an unhealthy result carrying the failure reason
    ///
    /// # Arguments
    ///
    /// * `adapter_id` - Name of the adapter that was checked
    /// * `latency_ms` - Time spent on the failed check
    /// * `message` - Failure reason reported to operators
    pub fn unhealthy(adapter_id: impl Into<String>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: chrono::Utc::now(),
        }
    }
}

/// Trait for adapters that support health checks
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    /// Performs a health check on the adapter
    async fn health_check(&self) -> HealthCheckResult;
}

/// Who triggered a lifecycle call and from where
///
/// Travels with every gateway operation so the audit trail can attribute an
/// attempt to an actor even when the call never reached the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// User or system that initiated the operation
    pub actor_id: String,
    /// Client IP address as seen by the API layer
    pub client_ip: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Correlation ID for tracing across systems
    pub correlation_id: Option<String>,
}

impl RequestContext {
    /// Creates a context for the given actor
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_kernel::RequestContext;
    ///
    /// let ctx = RequestContext::for_actor("coder-01").with_correlation_id("req-42");
    /// assert_eq!(ctx.actor_id, "coder-01");
    /// assert!(ctx.client_ip.is_none());
    /// ```
    pub fn for_actor(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            ..Default::default()
        }
    }

    /// Context used by scheduled jobs and other non-interactive callers
    pub fn system() -> Self {
        Self::for_actor("system")
    }

    /// Attaches client connection details
    pub fn with_client(mut self, client_ip: Option<String>, user_agent: Option<String>) -> Self {
        self.client_ip = client_ip;
        self.user_agent = user_agent;
        self
    }

    /// Attaches a correlation ID
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
