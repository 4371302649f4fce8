//! Client tests against a wiremock E-Klaim endpoint over real HTTP

use infra_eklaim::{
    codec, EklaimAction, EklaimConfig, EklaimConfigRecord, EklaimError, HttpConfig,
    RateLimiterRegistry, RequestEnvelope, ResilientClient, ResponseEnvelope, RetryPolicy,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const KEY: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";

fn config_for(server: &MockServer) -> EklaimConfig {
    EklaimConfig::try_from(EklaimConfigRecord {
        hospital_code: "3273011".to_string(),
        consumer_id: "cons-wire".to_string(),
        user_key: "uk-wire".to_string(),
        secret_key: KEY.to_string(),
        base_url: format!("{}/ws", server.uri()),
        requests_per_minute: 60,
        max_retry_attempts: 2,
    })
    .unwrap()
}

fn client() -> ResilientClient {
    let http = HttpConfig::default().with_timeout(Duration::from_secs(5));
    ResilientClient::from_http_config(&http, RateLimiterRegistry::new())
        .unwrap()
        .with_retry_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(10)))
}

fn encrypted(config: &EklaimConfig, envelope: &ResponseEnvelope) -> String {
    let json = serde_json::to_string(envelope).unwrap();
    codec::encrypt(json.as_bytes(), config.secret_key.as_bytes()).unwrap()
}

fn decrypt_request(config: &EklaimConfig, request: &Request) -> Value {
    let body = String::from_utf8(request.body.clone()).unwrap();
    let plain = codec::decrypt(&body, config.secret_key.as_bytes()).unwrap();
    serde_json::from_slice(&plain).unwrap()
}

#[tokio::test]
async fn sends_encrypted_body_with_credentials() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    Mock::given(method("POST"))
        .and(path("/ws"))
        .and(header("X-cons-id", "cons-wire"))
        .and(header("user_key", "uk-wire"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(encrypted(&config, &ResponseEnvelope::ok(json!({"claim_number": "0001R"})))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = RequestEnvelope::new(EklaimAction::NewClaim, json!({"eligibility_number": "0301R0011"}));
    let exchange = client().send(&request, &config).await;

    let envelope = exchange.outcome.unwrap();
    assert_eq!(envelope.field("claim_number"), Some(&json!("0001R")));

    let received = server.received_requests().await.unwrap();
    let decrypted = decrypt_request(&config, &received[0]);
    assert_eq!(decrypted["metadata"]["method"], "new_claim");
    assert_eq!(decrypted["data"]["eligibility_number"], "0301R0011");
}

#[tokio::test]
async fn armored_response_is_accepted() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let body = format!(
        "----BEGIN ENCRYPTED DATA----\n{}\n----END ENCRYPTED DATA----\n",
        encrypted(&config, &ResponseEnvelope::ok(json!({"ok": true})))
    );

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let exchange = client()
        .send(&RequestEnvelope::new(EklaimAction::ClaimFinal, json!({})), &config)
        .await;

    assert!(exchange.outcome.is_ok());
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(encrypted(&config, &ResponseEnvelope::ok(json!({})))))
        .with_priority(2)
        .mount(&server)
        .await;

    let exchange = client()
        .send(&RequestEnvelope::new(EklaimAction::SetClaimData, json!({})), &config)
        .await;

    assert!(exchange.outcome.is_ok());
    assert_eq!(exchange.trace.attempts, 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let exchange = client()
        .send(&RequestEnvelope::new(EklaimAction::Grouper, json!({})).with_stage("1"), &config)
        .await;

    assert!(matches!(
        exchange.outcome,
        Err(EklaimError::TransientService { status: Some(500), attempts: 3, .. })
    ));
}

#[tokio::test]
async fn forbidden_is_authentication_error() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let exchange = client()
        .send(&RequestEnvelope::new(EklaimAction::NewClaim, json!({})), &config)
        .await;

    assert!(matches!(exchange.outcome, Err(EklaimError::Authentication { status: Some(403), .. })));
}

#[tokio::test]
async fn embedded_auth_code_is_authentication_error() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(encrypted(&config, &ResponseEnvelope::error(400, "E2001", "consumer not registered"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let exchange = client()
        .send(&RequestEnvelope::new(EklaimAction::NewClaim, json!({})), &config)
        .await;

    assert!(matches!(exchange.outcome, Err(EklaimError::Authentication { status: None, .. })));
}

#[tokio::test]
async fn response_signed_with_another_key_fails_integrity() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let other = [9u8; codec::KEY_LEN];
    let forged = codec::encrypt(br#"{"metadata":{"code":200}}"#, &other).unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(forged))
        .mount(&server)
        .await;

    let exchange = client()
        .send(&RequestEnvelope::new(EklaimAction::NewClaim, json!({})), &config)
        .await;

    assert!(matches!(exchange.outcome, Err(EklaimError::Integrity)));
    assert!(exchange.trace.response_encrypted.is_some());
}
