//! E-Klaim protocol errors
//!
//! Every failure the codec, the limiter or the client can produce. The
//! variants line up with how the gateway treats them: cryptographic and
//! configuration errors never reach the network, transient errors have
//! already been retried by the time they surface, and protocol errors are
//! final answers from the remote service.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to E-Klaim
#[derive(Debug, Error)]
pub enum EklaimError {
    /// The envelope is not valid Base64 or is too short to hold a header
    #[error("Malformed envelope: {0}")]
    Format(String),

    /// The truncated HMAC did not match; payload tampered or key mismatch
    #[error("Envelope signature mismatch")]
    Integrity,

    /// The configured secret key is missing or malformed
    #[error("Invalid secret key: {0}")]
    KeyConfig(String),

    /// Encryption could not be performed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The decrypted payload carried invalid PKCS7 padding
    #[error("Decrypted payload has invalid padding")]
    Padding,

    /// Provider configuration is unusable (bad URL, empty credentials)
    #[error("Invalid provider configuration: {0}")]
    Configuration(String),

    /// Credentials rejected, either by HTTP status or an embedded error code
    #[error("Authentication rejected by E-Klaim: {message}")]
    Authentication {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// The local per-hospital throttle tripped; nothing was sent
    #[error("Rate limit exceeded for hospital {scope} ({limit} requests per minute)")]
    RateLimitExceeded {
        scope: String,
        limit: u32,
    },

    /// 5xx/429 or transport failure that persisted through every retry
    #[error("E-Klaim unavailable after {attempts} attempts: {cause}")]
    TransientService {
        status: Option<u16>,
        attempts: u32,
        cause: String,
    },

    /// The remote service answered with a non-authentication error
    #[error("E-Klaim rejected the request ({code}): {message}")]
    Protocol {
        code: String,
        message: String,
    },

    /// The whole call, including backoff, exceeded its deadline
    #[error("E-Klaim call exceeded its {0:?} deadline")]
    Timeout(Duration),

    /// Request payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EklaimError {
    /// Stable marker stored in the audit trail
    pub fn kind(&self) -> &'static str {
        match self {
            EklaimError::Format(_) => "format_error",
            EklaimError::Integrity => "integrity_error",
            EklaimError::KeyConfig(_) => "key_config_error",
            EklaimError::Encryption(_) => "encryption_error",
            EklaimError::Padding => "padding_error",
            EklaimError::Configuration(_) => "configuration_error",
            EklaimError::Authentication { .. } => "authentication_error",
            EklaimError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            EklaimError::TransientService { .. } => "transient_service_error",
            EklaimError::Protocol { .. } => "protocol_error",
            EklaimError::Timeout(_) => "timeout",
            EklaimError::Serialization(_) => "serialization_error",
        }
    }

    /// Returns true if the caller may requeue the operation later
    ///
    /// The client never retries these itself beyond its own backoff loop.
    pub fn is_retryable_later(&self) -> bool {
        matches!(
            self,
            EklaimError::RateLimitExceeded { .. }
                | EklaimError::TransientService { .. }
                | EklaimError::Timeout(_)
        )
    }

    /// Returns true if the error was raised before anything hit the network
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            EklaimError::KeyConfig(_)
                | EklaimError::Encryption(_)
                | EklaimError::Configuration(_)
                | EklaimError::RateLimitExceeded { .. }
                | EklaimError::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_markers_are_snake_case() {
        assert_eq!(EklaimError::Integrity.kind(), "integrity_error");
        assert_eq!(
            EklaimError::RateLimitExceeded { scope: "HOSP01".into(), limit: 5 }.kind(),
            "rate_limit_exceeded"
        );
    }

    #[test]
    fn test_retryable_later() {
        let transient = EklaimError::TransientService {
            status: Some(503),
            attempts: 4,
            cause: "HTTP 503".into(),
        };
        assert!(transient.is_retryable_later());
        assert!(!EklaimError::Integrity.is_retryable_later());
        assert!(!EklaimError::Protocol { code: "E2101".into(), message: "bad".into() }.is_retryable_later());
    }

    #[test]
    fn test_local_errors() {
        assert!(EklaimError::KeyConfig("short".into()).is_local());
        assert!(!EklaimError::Padding.is_local());
    }
}
