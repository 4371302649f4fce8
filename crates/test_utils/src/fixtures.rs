//! Pre-built Test Fixtures
//!
//! Ready-to-use claim payloads and identifiers. Deterministic values live
//! on the `*Fixtures` structs; `patient()` uses `fake` for variety.

use chrono::{NaiveDate, TimeZone, Utc};
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};
use uuid::Uuid;

use core_kernel::{ClaimId, RequestContext};
use domain_claims::NewClaim;
use infra_eklaim::mock::TEST_SECRET_KEY;
use infra_eklaim::EklaimConfigRecord;

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a deterministic claim ID for testing
    pub fn claim_id() -> ClaimId {
        ClaimId::from_uuid(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440002))
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// Hospital registered in every fixture config
    pub fn hospital_code() -> &'static str {
        "3171015"
    }

    /// Standard eligibility letter (SEP) number
    pub fn eligibility_number() -> &'static str {
        "0301R0011026V000123"
    }

    /// Standard remote claim number
    pub fn claim_number() -> &'static str {
        "EK-2026-000001"
    }

    pub fn actor() -> &'static str {
        "coder-01"
    }
}

/// Fixture for clinical dates
pub struct TemporalFixtures;

impl TemporalFixtures {
    pub fn admission_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default()
    }

    pub fn discharge_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 4).unwrap_or_default()
    }

    /// Ten years ago, well outside the retention period
    pub fn long_ago() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).single().unwrap_or_default()
    }
}

/// Provider configuration pointing at `base_url`
pub fn config_record(base_url: impl Into<String>) -> EklaimConfigRecord {
    EklaimConfigRecord {
        hospital_code: StringFixtures::hospital_code().to_string(),
        consumer_id: "cons-fixture".to_string(),
        user_key: "user-key-fixture".to_string(),
        secret_key: TEST_SECRET_KEY.to_string(),
        base_url: base_url.into(),
        requests_per_minute: 600,
        max_retry_attempts: 3,
    }
}

/// Request context for a coder at a fixed workstation
pub fn coder_context() -> RequestContext {
    RequestContext::for_actor(StringFixtures::actor())
        .with_client(Some("10.20.30.40".to_string()), Some("SIMRS/5.1".to_string()))
        .with_correlation_id(Uuid::new_v4().to_string())
}

/// Patient block with a random name
pub fn patient() -> Value {
    let name: String = Name().fake();
    json!({
        "name": name,
        "card_number": "0001234567890",
        "medical_record_number": "RM-000981",
        "birth_date": "1989-05-15",
        "gender": "F"
    })
}

pub fn new_claim(eligibility_number: &str) -> NewClaim {
    NewClaim {
        eligibility_number: eligibility_number.to_string(),
        hospital_code: StringFixtures::hospital_code().to_string(),
        patient: patient(),
    }
}

pub fn claim_data() -> Value {
    json!({
        "admission_date": TemporalFixtures::admission_date().to_string(),
        "discharge_date": TemporalFixtures::discharge_date().to_string(),
        "care_class": 3,
        "discharge_status": 1,
        "tariff_rs": {"surgery": 4200000, "room": 900000, "drugs": 315000}
    })
}

pub fn diagnoses() -> Value {
    json!([
        {"code": "K35.8", "primary": true},
        {"code": "E11.9", "primary": false}
    ])
}

pub fn procedures() -> Value {
    json!([{"code": "47.09", "quantity": 1}])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_dates_are_ordered() {
        assert!(TemporalFixtures::admission_date() < TemporalFixtures::discharge_date());
    }

    #[test]
    fn test_config_record_is_valid() {
        let config = infra_eklaim::EklaimConfig::try_from(config_record("http://localhost:1/ws")).unwrap();
        assert_eq!(config.hospital_code, StringFixtures::hospital_code());
    }

    #[test]
    fn test_patient_has_name() {
        assert!(patient()["name"].as_str().is_some_and(|n| !n.is_empty()));
    }
}
