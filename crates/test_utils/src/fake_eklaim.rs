//! Fake E-Klaim Server
//!
//! A wiremock server that speaks the real wire protocol: it decrypts every
//! request with the fixture key, answers per action with an encrypted
//! envelope, and remembers what it received. Faults can be queued ahead of
//! the normal answers to exercise retries and remote rejections.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use infra_eklaim::{codec, EklaimConfigRecord, ResponseEnvelope, SecretKey};

use crate::fixtures;

/// Path the fake listens on
pub const WS_PATH: &str = "/ws";

/// Grand total the fake's stage-2 grouping adds up to
pub fn expected_inacbg_total() -> Decimal {
    dec!(6075000.50)
}

enum Fault {
    Status(u16),
    Envelope(ResponseEnvelope),
}

#[derive(Default)]
struct FakeState {
    next_claim: u32,
    issued: HashSet<String>,
    faults: VecDeque<Fault>,
    received: Vec<Value>,
}

struct EklaimResponder {
    key: SecretKey,
    consumer_id: String,
    state: Arc<Mutex<FakeState>>,
}

impl EklaimResponder {
    fn sealed(&self, envelope: &ResponseEnvelope) -> ResponseTemplate {
        let sealed = serde_json::to_vec(envelope)
            .ok()
            .and_then(|json| codec::encrypt(&json, self.key.as_bytes()).ok());
        match sealed {
            Some(body) => ResponseTemplate::new(200).set_body_string(body),
            None => ResponseTemplate::new(500),
        }
    }

    fn answer(&self, state: &mut FakeState, envelope: &Value) -> ResponseEnvelope {
        let action = envelope["metadata"]["method"].as_str().unwrap_or_default();
        let claim_number = envelope["metadata"]["claim_number"].as_str();

        if action != "new_claim" && !claim_number.is_some_and(|n| state.issued.contains(n)) {
            return ResponseEnvelope::error(404, "E4004", "claim not found");
        }

        match action {
            "new_claim" => {
                state.next_claim += 1;
                let number = format!("EK-FAKE-{:06}", state.next_claim);
                state.issued.insert(number.clone());
                ResponseEnvelope::ok(json!({"claim_number": number}))
            }
            "set_claim_data" | "idrg_diagnosa_set" | "idrg_procedure_set" | "claim_final" | "reedit_claim" => {
                ResponseEnvelope::ok(json!({"claim_number": claim_number}))
            }
            "grouper" => match envelope["metadata"]["stage"].as_str() {
                Some("1") => ResponseEnvelope::ok(json!({
                    "idrg": {"code": "K-4-15-I", "description": "APPENDECTOMY", "tariff": 4800000}
                })),
                Some("2") => ResponseEnvelope::ok(json!({
                    "inacbg": {
                        "code": "K-1-14-I",
                        "description": "PROSEDUR APPENDIX",
                        "base_tariff": 5200000,
                        "special_procedure": 750000,
                        "special_drug": "125000.50",
                        "chronic": null
                    }
                })),
                _ => ResponseEnvelope::error(400, "E4002", "unknown grouper stage"),
            },
            "send_claim_individual" => ResponseEnvelope::ok(json!({"claim_number": claim_number, "sent": true})),
            _ => ResponseEnvelope::error(400, "E4000", "unknown method"),
        }
    }
}

impl Respond for EklaimResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = lock(&self.state);

        let consumer = request.headers.get("X-cons-id").and_then(|v| v.to_str().ok());
        if consumer != Some(self.consumer_id.as_str()) {
            return self.sealed(&ResponseEnvelope::error(401, "E2001", "unknown consumer"));
        }

        let envelope = std::str::from_utf8(&request.body)
            .ok()
            .and_then(|body| codec::decrypt(body, self.key.as_bytes()).ok())
            .and_then(|plain| serde_json::from_slice::<Value>(&plain).ok());
        let Some(envelope) = envelope else {
            return ResponseTemplate::new(400).set_body_string("payload could not be decrypted");
        };
        state.received.push(envelope.clone());

        match state.faults.pop_front() {
            Some(Fault::Status(status)) => ResponseTemplate::new(status),
            Some(Fault::Envelope(rejection)) => self.sealed(&rejection),
            None => {
                let answer = self.answer(&mut state, &envelope);
                self.sealed(&answer)
            }
        }
    }
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Running fake E-Klaim endpoint
pub struct FakeEklaim {
    server: MockServer,
    record: EklaimConfigRecord,
    state: Arc<Mutex<FakeState>>,
}

impl FakeEklaim {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let record = fixtures::config_record(format!("{}{}", server.uri(), WS_PATH));
        let key = match SecretKey::parse(&record.secret_key) {
            Ok(key) => key,
            Err(e) => panic!("fixture key must parse: {}", e),
        };
        let state = Arc::new(Mutex::new(FakeState::default()));

        Mock::given(method("POST"))
            .and(path(WS_PATH))
            .respond_with(EklaimResponder {
                key,
                consumer_id: record.consumer_id.clone(),
                state: state.clone(),
            })
            .mount(&server)
            .await;

        Self { server, record, state }
    }

    /// Provider configuration pointing at this server
    pub fn config_record(&self) -> EklaimConfigRecord {
        self.record.clone()
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Answers the next `times` requests with a bare HTTP status
    pub fn fail_next(&self, status: u16, times: usize) {
        let mut state = lock(&self.state);
        for _ in 0..times {
            state.faults.push_back(Fault::Status(status));
        }
    }

    /// Answers the next request with an encrypted error envelope
    pub fn reject_next(&self, code: u16, error_no: &str, message: &str) {
        lock(&self.state)
            .faults
            .push_back(Fault::Envelope(ResponseEnvelope::error(code, error_no, message)));
    }

    /// Every decrypted request envelope, in arrival order
    pub fn received(&self) -> Vec<Value> {
        lock(&self.state).received.clone()
    }

    pub fn received_actions(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|e| e["metadata"]["method"].as_str().map(str::to_string))
            .collect()
    }
}
