//! Every lifecycle call leaves exactly one audit entry, whatever its outcome

use std::sync::Arc;

use domain_claims::ports::mock::FailingAuditStore;
use domain_claims::{AuditQuery, ClaimError, ClaimStatus};
use test_utils::{
    assert_audit_actions, assert_audit_failure, claim_data, coder_context, diagnoses, new_claim, FakeEklaim,
    GatewayHarness,
};

#[tokio::test]
async fn test_failures_are_audited_as_well_as_successes() {
    let fake = FakeEklaim::start().await;
    let h = GatewayHarness::over_http(&fake).await;
    let ctx = coder_context();
    let gw = &h.gateway;

    let number = gw.new_claim(new_claim("0301R0040001V000001"), &ctx).await.unwrap().claim_number;

    // Local rejections: wrong state, unknown stage, unknown claim, duplicate
    assert!(gw.finalize_claim(&number, &ctx).await.is_err());
    assert!(gw.execute_grouper(&number, "9", &ctx).await.is_err());
    assert!(gw.set_diagnoses("EK-MISSING", diagnoses(), &ctx).await.is_err());
    assert!(gw.new_claim(new_claim("0301R0040001V000001"), &ctx).await.is_err());

    // Remote exhaustion: initial attempt plus three retries
    fake.fail_next(500, 4);
    assert!(gw.set_claim_data(&number, claim_data(), &ctx).await.is_err());

    gw.audit().flush().await;
    let entries = h.audit.entries().await;
    assert_audit_actions(
        &entries,
        &["new_claim", "claim_final", "grouper", "idrg_diagnosa_set", "new_claim", "set_claim_data"],
    );

    let failures: Vec<_> = entries.iter().filter(|e| !e.is_success()).collect();
    assert_eq!(failures.len(), 5);
    assert_audit_failure(failures[0], "invalid_state");
    assert_audit_failure(failures[1], "invalid_stage");
    assert_audit_failure(failures[2], "claim_not_found");
    assert_audit_failure(failures[3], "duplicate_claim");
    assert_audit_failure(failures[4], "transient_service_error");
    assert_eq!(failures[4].attempts, 4);

    // Local rejections never reached the network
    assert!(failures[..4].iter().all(|e| e.request_encrypted.is_none() && e.http_status.is_none()));
}

#[tokio::test]
async fn test_audit_outage_does_not_fail_business_calls() {
    let fake = FakeEklaim::start().await;
    let h = GatewayHarness::with_audit_store(&fake, Arc::new(FailingAuditStore)).await;
    let ctx = coder_context();

    let claim = h.gateway.new_claim(new_claim("0301R0040002V000002"), &ctx).await.unwrap();
    let claim = h.gateway.set_claim_data(&claim.claim_number, claim_data(), &ctx).await.unwrap();
    h.gateway.audit().flush().await;

    assert_eq!(claim.status, ClaimStatus::DataEntered);
    assert_eq!(h.claims.len().await, 1);
}

#[tokio::test]
async fn test_rate_limited_call_is_audited_without_wire_traffic() {
    let fake = FakeEklaim::start().await;
    let h = GatewayHarness::over_http(&fake).await;
    let ctx = coder_context();

    let mut record = fake.config_record();
    record.requests_per_minute = 1;
    h.configs.put(record).await;

    h.gateway.new_claim(new_claim("0301R0040003V000003"), &ctx).await.unwrap();
    let err = h.gateway.new_claim(new_claim("0301R0040003V000004"), &ctx).await.unwrap_err();
    assert!(matches!(err, ClaimError::Gateway(ref e) if e.is_retryable_later()));
    assert_eq!(fake.received().len(), 1);

    h.gateway.audit().flush().await;
    let limited = h
        .gateway
        .audit()
        .search(&AuditQuery { actor_id: Some(ctx.actor_id.clone()), ..Default::default() })
        .await
        .unwrap()
        .into_iter()
        .find(|e| !e.is_success())
        .unwrap();
    assert_audit_failure(&limited, "rate_limit_exceeded");
    assert_eq!(limited.attempts, 0);
}
