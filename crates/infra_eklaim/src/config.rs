//! Provider configuration
//!
//! The hospital back office owns one provider record per hospital code. It
//! arrives here as a raw [`EklaimConfigRecord`] and is validated once into an
//! [`EklaimConfig`] before any request is built.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::SecretKey;
use crate::error::EklaimError;

/// Default throttle when the record does not carry one
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Provider configuration as stored by the hospital back office
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EklaimConfigRecord {
    /// Hospital code registered with the insurer; also the throttle scope
    pub hospital_code: String,
    /// Consumer id sent as the `X-cons-id` header
    pub consumer_id: String,
    /// User key sent as the `user_key` header
    pub user_key: String,
    /// 64 hex characters, possibly grouped with separators
    pub secret_key: String,
    /// Endpoint every action is POSTed to
    pub base_url: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
}

impl fmt::Debug for EklaimConfigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EklaimConfigRecord")
            .field("hospital_code", &self.hospital_code)
            .field("consumer_id", &self.consumer_id)
            .field("user_key", &"**redacted**")
            .field("secret_key", &"**redacted**")
            .field("base_url", &self.base_url)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("max_retry_attempts", &self.max_retry_attempts)
            .finish()
    }
}

fn default_requests_per_minute() -> u32 {
    DEFAULT_REQUESTS_PER_MINUTE
}

fn default_max_retry_attempts() -> u32 {
    DEFAULT_MAX_RETRY_ATTEMPTS
}

/// Validated provider configuration
#[derive(Clone)]
pub struct EklaimConfig {
    pub hospital_code: String,
    pub consumer_id: String,
    pub user_key: String,
    pub secret_key: SecretKey,
    pub base_url: Url,
    pub requests_per_minute: u32,
    pub max_retry_attempts: u32,
}

impl EklaimConfig {
    /// Total attempts the client may make for one call
    pub fn max_attempts(&self) -> u32 {
        self.max_retry_attempts.saturating_add(1)
    }
}

impl fmt::Debug for EklaimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EklaimConfig")
            .field("hospital_code", &self.hospital_code)
            .field("consumer_id", &self.consumer_id)
            .field("user_key", &"**redacted**")
            .field("secret_key", &self.secret_key)
            .field("base_url", &self.base_url.as_str())
            .field("requests_per_minute", &self.requests_per_minute)
            .field("max_retry_attempts", &self.max_retry_attempts)
            .finish()
    }
}

impl TryFrom<EklaimConfigRecord> for EklaimConfig {
    type Error = EklaimError;

    fn try_from(record: EklaimConfigRecord) -> Result<Self, Self::Error> {
        let hospital_code = record.hospital_code.trim().to_string();
        if hospital_code.is_empty() {
            return Err(EklaimError::Configuration("hospital code is empty".to_string()));
        }
        if record.consumer_id.trim().is_empty() {
            return Err(EklaimError::Configuration(format!(
                "consumer id is empty for hospital {}",
                hospital_code
            )));
        }

        let base_url = Url::parse(record.base_url.trim()).map_err(|e| {
            EklaimError::Configuration(format!("invalid base url '{}': {}", record.base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(EklaimError::Configuration(format!(
                "base url must be http or https, got '{}'",
                base_url.scheme()
            )));
        }

        let secret_key = SecretKey::parse(&record.secret_key)?;

        Ok(Self {
            hospital_code,
            consumer_id: record.consumer_id.trim().to_string(),
            user_key: record.user_key,
            secret_key,
            base_url,
            requests_per_minute: record.requests_per_minute,
            max_retry_attempts: record.max_retry_attempts,
        })
    }
}
