//! Repository tests against a real PostgreSQL container
//!
//! Each test starts its own container. Run with
//! `cargo test -p test_utils -- --ignored` on a host with Docker.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use domain_claims::{AuditQuery, AuditStore, ClaimStatus, ClaimStore, ConfigStore, TopUps};
use infra_db::{PgAuditRepository, PgClaimRepository, PgConfigRepository};
use test_utils::{
    config_record, TemporalFixtures, TestDatabase, TestAuditEntryBuilder, TestClaimBuilder,
};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_claim_round_trip_and_update() {
    let db = TestDatabase::new().await.unwrap();
    let repo = PgClaimRepository::new(db.pool().clone());

    let mut claim = TestClaimBuilder::new()
        .claim_number("EK-PG-0001")
        .eligibility_number("0301R0050001V000001")
        .status(ClaimStatus::GroupedInacbg)
        .inacbg_tariff(dec!(5200000), TopUps { special_drug: dec!(125000.50), ..Default::default() })
        .build();
    repo.insert(&claim).await.unwrap();

    let stored = repo.find_by_claim_number("EK-PG-0001").await.unwrap().unwrap();
    assert_eq!(stored.status, ClaimStatus::GroupedInacbg);
    assert_eq!(stored.total_tariff(), Some(dec!(5325000.50)));
    assert_eq!(stored.diagnoses, claim.diagnoses);

    claim.status = ClaimStatus::Finalized;
    claim.finalized_at = Some(Utc::now());
    claim.updated_by = "verifier-2".to_string();
    repo.update(&claim).await.unwrap();

    let by_sep = repo.find_by_eligibility_number("0301R0050001V000001").await.unwrap().unwrap();
    assert_eq!(by_sep.status, ClaimStatus::Finalized);
    assert_eq!(by_sep.updated_by, "verifier-2");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_duplicate_eligibility_is_conflict() {
    let db = TestDatabase::new().await.unwrap();
    let repo = PgClaimRepository::new(db.pool().clone());

    let first = TestClaimBuilder::new().claim_number("EK-PG-0002").eligibility_number("0301R0050002V000002").build();
    let second = TestClaimBuilder::new().claim_number("EK-PG-0003").eligibility_number("0301R0050002V000002").build();

    repo.insert(&first).await.unwrap();
    let err = repo.insert(&second).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_of_unknown_claim_is_not_found() {
    let db = TestDatabase::new().await.unwrap();
    let repo = PgClaimRepository::new(db.pool().clone());

    let ghost = TestClaimBuilder::new().claim_number("EK-PG-GHOST").eligibility_number("0301R0050009V000009").build();
    assert!(repo.update(&ghost).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_config_upsert_and_lookup() {
    let db = TestDatabase::new().await.unwrap();
    let repo = PgConfigRepository::new(db.pool().clone());

    let mut record = config_record("http://eklaim.local/ws");
    record.hospital_code = "3273011".to_string();
    repo.upsert(&record).await.unwrap();

    record.requests_per_minute = 30;
    repo.upsert(&record).await.unwrap();

    let found = repo.find_by_hospital("3273011").await.unwrap().unwrap();
    assert_eq!(found.requests_per_minute, 30);
    assert!(repo.find_by_hospital("0000000").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_audit_search_and_prune() {
    let db = TestDatabase::new().await.unwrap();
    let repo = PgAuditRepository::new(db.pool().clone());
    let claim = TestClaimBuilder::new().claim_number("EK-PG-0100").build();
    let now = Utc::now();

    let old = TestAuditEntryBuilder::new("new_claim")
        .for_claim(&claim)
        .actor("auditor-pg")
        .created_at(TemporalFixtures::long_ago())
        .build();
    let earlier = TestAuditEntryBuilder::new("set_claim_data")
        .for_claim(&claim)
        .actor("auditor-pg")
        .created_at(now - Duration::hours(1))
        .build();
    let latest = TestAuditEntryBuilder::new("grouper")
        .for_claim(&claim)
        .actor("auditor-pg")
        .created_at(now)
        .failed("protocol_error", "E4002")
        .build();
    for entry in [&old, &earlier, &latest] {
        repo.append(entry).await.unwrap();
    }

    let all = repo.search(&AuditQuery::for_claim(claim.id)).await.unwrap();
    assert_eq!(all.iter().map(|e| e.action.as_str()).collect::<Vec<_>>(), vec!["grouper", "set_claim_data", "new_claim"]);
    assert_eq!(all[0].error_kind.as_deref(), Some("protocol_error"));

    let windowed = repo
        .search(&AuditQuery {
            actor_id: Some("auditor-pg".to_string()),
            from: Some(now - Duration::hours(2)),
            to: Some(now),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].action, "set_claim_data");

    let removed = repo.delete_older_than(now - Duration::days(365)).await.unwrap();
    assert!(removed >= 1);
    assert_eq!(repo.search(&AuditQuery::for_claim(claim.id)).await.unwrap().len(), 2);
}
