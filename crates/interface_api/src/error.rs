//! API error handling
//!
//! Domain and gateway failures are folded into HTTP statuses here, once, so
//! handlers can use `?` on every gateway call.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain_claims::ClaimError;
use infra_eklaim::rate_limiter::WINDOW;
use infra_eklaim::EklaimError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Local per-hospital limit; carries the stable error marker
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// E-Klaim answered but refused or could not be understood
    #[error("Upstream error: {0}")]
    BadGateway(String),

    /// E-Klaim unreachable after every attempt, or the call timed out
    #[error("Upstream unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation(_) => "validation_error",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::Validation(msg)
            | ApiError::RateLimited(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.error_type().to_string(),
            message: self.message(),
            details: None,
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::RateLimited(_)) {
            if let Ok(value) = HeaderValue::from_str(&WINDOW.as_secs().to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<EklaimError> for ApiError {
    fn from(err: EklaimError) -> Self {
        let message = err.to_string();
        match err {
            EklaimError::RateLimitExceeded { .. } => ApiError::RateLimited(message),
            EklaimError::Authentication { .. } | EklaimError::Protocol { .. } => ApiError::BadGateway(message),
            EklaimError::TransientService { .. } | EklaimError::Timeout(_) => ApiError::ServiceUnavailable(message),
            EklaimError::Format(_)
            | EklaimError::Integrity
            | EklaimError::KeyConfig(_)
            | EklaimError::Encryption(_)
            | EklaimError::Padding
            | EklaimError::Configuration(_)
            | EklaimError::Serialization(_) => ApiError::Internal(message),
        }
    }
}

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        let message = err.to_string();
        match err {
            ClaimError::Gateway(inner) => inner.into(),
            ClaimError::InvalidState { .. } | ClaimError::DuplicateClaim(_) => ApiError::Conflict(message),
            ClaimError::ClaimNotFound(_) | ClaimError::ConfigNotFound(_) => ApiError::NotFound(message),
            ClaimError::InvalidStage(_) | ClaimError::Validation(_) => ApiError::Validation(message),
            ClaimError::InvalidResponse(_) => ApiError::BadGateway(message),
            ClaimError::Storage(port) if port.is_not_found() => ApiError::NotFound(message),
            ClaimError::Storage(port) if port.is_conflict() => ApiError::Conflict(message),
            ClaimError::Storage(port) if port.is_transient() => ApiError::ServiceUnavailable(message),
            ClaimError::Storage(_) => ApiError::Internal(message),
        }
    }
}

impl From<core_kernel::PortError> for ApiError {
    fn from(err: core_kernel::PortError) -> Self {
        ClaimError::Storage(err).into()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::TokenExpired => ApiError::Unauthorized,
            AuthError::MissingPermission(permission) => {
                ApiError::Forbidden(format!("missing permission {}", permission))
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;
    use domain_claims::ClaimStatus;
    use std::time::Duration;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().status()
    }

    #[test]
    fn test_lifecycle_errors() {
        assert_eq!(
            status_of(ClaimError::InvalidState { required: "Finalized".into(), actual: ClaimStatus::Draft }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(ClaimError::DuplicateClaim("SEP-1".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(ClaimError::ClaimNotFound("EK-1".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ClaimError::ConfigNotFound("3171015".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ClaimError::InvalidStage("3".into())), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_gateway_errors() {
        let limited = EklaimError::RateLimitExceeded { scope: "3171015".into(), limit: 60 };
        assert_eq!(status_of(ClaimError::Gateway(limited)), StatusCode::TOO_MANY_REQUESTS);

        let auth = EklaimError::Authentication { status: Some(401), code: None, message: "bad key".into() };
        assert_eq!(status_of(auth), StatusCode::BAD_GATEWAY);

        let exhausted = EklaimError::TransientService { status: Some(503), attempts: 4, cause: "503".into() };
        assert_eq!(status_of(exhausted), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(EklaimError::Timeout(Duration::from_secs(150))), StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(status_of(EklaimError::Integrity), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(EklaimError::KeyConfig("short".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_storage_errors() {
        assert_eq!(status_of(PortError::not_found("Claim", "EK-1")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(PortError::conflict("duplicate")), StatusCode::CONFLICT);
        assert_eq!(status_of(PortError::connection("pool closed")), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(PortError::internal("boom")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited("limit".into()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }
}
