//! Scripted transport for tests
//!
//! Plays back a queue of canned answers, encrypting envelopes with the
//! supplied provider key, and records every request it receives along with
//! the (tokio) instant it arrived.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::codec;
use crate::config::{EklaimConfig, EklaimConfigRecord};
use crate::envelope::ResponseEnvelope;
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// Key used by [`test_config`]
pub const TEST_SECRET_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c762e7160f38b4da56a784d9045190cfe";

/// Provider configuration for tests
pub fn test_config_record() -> EklaimConfigRecord {
    EklaimConfigRecord {
        hospital_code: "3171015".to_string(),
        consumer_id: "cons-test".to_string(),
        user_key: "user-key-test".to_string(),
        secret_key: TEST_SECRET_KEY.to_string(),
        base_url: "http://eklaim.mock/ws".to_string(),
        requests_per_minute: 100,
        max_retry_attempts: 3,
    }
}

/// Validated provider configuration for tests
pub fn test_config() -> EklaimConfig {
    match EklaimConfig::try_from(test_config_record()) {
        Ok(config) => config,
        Err(e) => panic!("test config must be valid: {}", e),
    }
}

/// One canned answer
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Encrypted envelope with status 200
    Envelope(ResponseEnvelope),
    /// Bare status with an empty body
    Status(u16),
    /// Status with a literal body
    Raw(u16, String),
    /// Transport-level failure
    Error(TransportError),
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    requests: Vec<(Instant, TransportRequest)>,
}

/// Transport that answers from a script
#[derive(Clone)]
pub struct ScriptedTransport {
    config: EklaimConfig,
    latency: Duration,
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new(config: EklaimConfig) -> Self {
        Self {
            config,
            latency: Duration::ZERO,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    /// Delays every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn push(&self, answer: Scripted) {
        self.script.lock().await.queue.push_back(answer);
    }

    pub async fn push_envelope(&self, envelope: ResponseEnvelope) {
        self.push(Scripted::Envelope(envelope)).await;
    }

    pub async fn push_status(&self, status: u16) {
        self.push(Scripted::Status(status)).await;
    }

    pub async fn push_raw(&self, status: u16, body: impl Into<String>) {
        self.push(Scripted::Raw(status, body.into())).await;
    }

    pub async fn push_error(&self, error: TransportError) {
        self.push(Scripted::Error(error)).await;
    }

    /// Answer used once the queue is empty
    pub async fn set_fallback(&self, answer: Scripted) {
        self.script.lock().await.fallback = Some(answer);
    }

    pub async fn requests(&self) -> Vec<TransportRequest> {
        self.script.lock().await.requests.iter().map(|(_, r)| r.clone()).collect()
    }

    pub async fn request_count(&self) -> usize {
        self.script.lock().await.requests.len()
    }

    /// Arrival instants of every request, in order
    pub async fn attempt_instants(&self) -> Vec<Instant> {
        self.script.lock().await.requests.iter().map(|(at, _)| *at).collect()
    }

    /// Decrypts the body of the `index`th request
    pub async fn decrypted_request(&self, index: usize) -> Option<String> {
        let body = self.script.lock().await.requests.get(index)?.1.body.clone();
        let bytes = codec::decrypt(&body, self.config.secret_key.as_bytes()).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn render(&self, answer: Scripted) -> Result<TransportResponse, TransportError> {
        match answer {
            Scripted::Envelope(envelope) => {
                let json = serde_json::to_string(&envelope).map_err(|e| TransportError::Other(e.to_string()))?;
                let body = codec::encrypt(json.as_bytes(), self.config.secret_key.as_bytes())
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                Ok(TransportResponse::new(200, body))
            }
            Scripted::Status(status) => Ok(TransportResponse::new(status, "")),
            Scripted::Raw(status, body) => Ok(TransportResponse::new(status, body)),
            Scripted::Error(error) => Err(error),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let answer = {
            let mut script = self.script.lock().await;
            script.requests.push((Instant::now(), request));
            script.queue.pop_front().or_else(|| script.fallback.clone())
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match answer {
            Some(answer) => self.render(answer),
            None => Err(TransportError::Other("script exhausted".to_string())),
        }
    }
}
