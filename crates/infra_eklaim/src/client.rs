//! Resilient E-Klaim client
//!
//! Throttles, encrypts, sends, retries and classifies one call. The client
//! never writes audit entries itself; it hands back an [`Exchange`] whose
//! trace holds everything the audit trail needs, on success and on failure.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::EklaimConfig;
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::EklaimError;
use crate::rate_limiter::RateLimiterRegistry;
use crate::retry::RetryPolicy;
use crate::transport::{HttpConfig, ReqwestTransport, Transport, TransportRequest};

/// Default bound for one whole call, backoff included
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(150);

/// Snapshots taken while a call was in flight
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeTrace {
    pub request_plain: Option<String>,
    pub request_encrypted: Option<String>,
    pub response_encrypted: Option<String>,
    pub response_plain: Option<String>,
    /// Status of the last HTTP response received, if any
    pub http_status: Option<u16>,
    /// Attempts made against the transport; zero when rejected locally
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Result of one call together with its trace
#[derive(Debug)]
pub struct Exchange {
    pub trace: ExchangeTrace,
    pub outcome: Result<ResponseEnvelope, EklaimError>,
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Client for the E-Klaim web service
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    limiter: RateLimiterRegistry,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>, limiter: RateLimiterRegistry) -> Self {
        Self {
            transport,
            limiter,
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Builds a client over a pooled `reqwest` transport
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_http_config(http: &HttpConfig, limiter: RateLimiterRegistry) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(http)?), limiter))
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn limiter(&self) -> &RateLimiterRegistry {
        &self.limiter
    }

    /// Sends one request to E-Klaim
    ///
    /// Dropping the returned future cancels the in-flight attempt and any
    /// pending backoff.
    pub async fn send(&self, request: &RequestEnvelope, config: &EklaimConfig) -> Exchange {
        let started = Instant::now();
        let mut trace = ExchangeTrace::default();

        let result = tokio::time::timeout(self.call_timeout, self.run(request, config, &mut trace)).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    action = %request.action(),
                    hospital_code = %config.hospital_code,
                    attempts = trace.attempts,
                    "E-Klaim call exceeded its deadline"
                );
                Err(EklaimError::Timeout(self.call_timeout))
            }
        };

        trace.elapsed = started.elapsed();
        Exchange { trace, outcome }
    }

    async fn run(
        &self,
        request: &RequestEnvelope,
        config: &EklaimConfig,
        trace: &mut ExchangeTrace,
    ) -> Result<ResponseEnvelope, EklaimError> {
        let action = request.action();
        let plaintext = request.to_json()?;
        trace.request_plain = Some(plaintext.clone());

        if !self
            .limiter
            .allow(&config.hospital_code, config.requests_per_minute)
            .await
        {
            warn!(
                action = %action,
                hospital_code = %config.hospital_code,
                limit = config.requests_per_minute,
                "E-Klaim call throttled"
            );
            return Err(EklaimError::RateLimitExceeded {
                scope: config.hospital_code.clone(),
                limit: config.requests_per_minute,
            });
        }

        let encrypted = codec::encrypt(plaintext.as_bytes(), config.secret_key.as_bytes())?;
        trace.request_encrypted = Some(encrypted.clone());

        let outbound = TransportRequest {
            url: config.base_url.clone(),
            headers: vec![
                ("X-cons-id", config.consumer_id.clone()),
                ("user_key", config.user_key.clone()),
                ("Content-Type", "application/json".to_string()),
                ("Accept", "application/json".to_string()),
            ],
            body: encrypted,
        };

        let max_attempts = config.max_attempts();
        let mut last_status = None;
        let mut last_cause = String::new();

        for attempt in 1..=max_attempts {
            trace.attempts = attempt;
            debug!(action = %action, attempt, bytes = outbound.body.len(), "Sending E-Klaim request");

            match self.transport.execute(outbound.clone()).await {
                Ok(response) if response.is_success() => {
                    trace.http_status = Some(response.status);
                    trace.response_encrypted = Some(response.body.clone());
                    let envelope = Self::decode(&response.body, config, trace)?;
                    info!(action = %action, attempt, status = response.status, "E-Klaim call completed");
                    return envelope.into_result();
                }
                Ok(response) => {
                    trace.http_status = Some(response.status);
                    match response.status {
                        401 | 403 => {
                            warn!(action = %action, status = response.status, "E-Klaim rejected credentials");
                            return Err(EklaimError::Authentication {
                                status: Some(response.status),
                                code: None,
                                message: format!("HTTP {}", response.status),
                            });
                        }
                        429 | 500..=599 => {
                            last_status = Some(response.status);
                            last_cause = format!("HTTP {}", response.status);
                        }
                        status => {
                            return Err(EklaimError::Protocol {
                                code: status.to_string(),
                                message: format!("unexpected HTTP status {}", status),
                            });
                        }
                    }
                }
                Err(err) => {
                    last_status = None;
                    last_cause = err.to_string();
                }
            }

            if attempt < max_attempts {
                let delay = self.retry.delay_for_attempt(attempt);
                warn!(
                    action = %action,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    cause = %last_cause,
                    "Transient E-Klaim failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(EklaimError::TransientService {
            status: last_status,
            attempts: max_attempts,
            cause: last_cause,
        })
    }

    fn decode(
        body: &str,
        config: &EklaimConfig,
        trace: &mut ExchangeTrace,
    ) -> Result<ResponseEnvelope, EklaimError> {
        let bytes = codec::decrypt(body, config.secret_key.as_bytes())?;
        let plain = String::from_utf8(bytes)
            .map_err(|_| EklaimError::Format("decrypted response is not UTF-8".to_string()))?;
        trace.response_plain = Some(plain.clone());
        ResponseEnvelope::parse(&plain)
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}
