//! Claims gateway errors

use thiserror::Error;

use core_kernel::PortError;
use infra_eklaim::EklaimError;

use crate::claim::ClaimStatus;

/// Errors that can occur in the claims gateway
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error(transparent)]
    Gateway(#[from] EklaimError),

    #[error("Claim is {actual}, operation requires {required}")]
    InvalidState { required: String, actual: ClaimStatus },

    #[error("A claim already exists for eligibility number {0}")]
    DuplicateClaim(String),

    #[error("No E-Klaim configuration for hospital {0}")]
    ConfigNotFound(String),

    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Unknown grouper stage '{0}', expected \"1\" or \"2\"")]
    InvalidStage(String),

    #[error("Unexpected E-Klaim response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl ClaimError {
    /// Stable marker stored in the audit trail
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimError::Gateway(e) => e.kind(),
            ClaimError::InvalidState { .. } => "invalid_state",
            ClaimError::DuplicateClaim(_) => "duplicate_claim",
            ClaimError::ConfigNotFound(_) => "config_not_found",
            ClaimError::ClaimNotFound(_) => "claim_not_found",
            ClaimError::InvalidStage(_) => "invalid_stage",
            ClaimError::InvalidResponse(_) => "invalid_response",
            ClaimError::Validation(_) => "validation_error",
            ClaimError::Storage(_) => "storage_error",
        }
    }
}
