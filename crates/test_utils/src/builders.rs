//! Test Data Builders
//!
//! Builders construct claims and audit entries directly in a given state so
//! store and query tests do not have to replay the lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::RequestContext;
use domain_claims::{AuditLogEntry, Claim, ClaimStatus, IdrgGrouping, InacbgGrouping, TopUps};

use crate::fixtures::{self, StringFixtures};

/// Builder for mirrored claims
pub struct TestClaimBuilder {
    claim_number: String,
    eligibility_number: String,
    status: ClaimStatus,
    actor: String,
    base_tariff: Decimal,
    top_ups: TopUps,
}

impl Default for TestClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClaimBuilder {
    pub fn new() -> Self {
        Self {
            claim_number: StringFixtures::claim_number().to_string(),
            eligibility_number: StringFixtures::eligibility_number().to_string(),
            status: ClaimStatus::Draft,
            actor: StringFixtures::actor().to_string(),
            base_tariff: dec!(5200000),
            top_ups: TopUps::default(),
        }
    }

    pub fn claim_number(mut self, claim_number: impl Into<String>) -> Self {
        self.claim_number = claim_number.into();
        self
    }

    pub fn eligibility_number(mut self, eligibility_number: impl Into<String>) -> Self {
        self.eligibility_number = eligibility_number.into();
        self
    }

    /// Target status; payloads and groupings the status implies are filled in
    pub fn status(mut self, status: ClaimStatus) -> Self {
        self.status = status;
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn inacbg_tariff(mut self, base_tariff: Decimal, top_ups: TopUps) -> Self {
        self.base_tariff = base_tariff;
        self.top_ups = top_ups;
        self
    }

    pub fn build(self) -> Claim {
        let mut claim = Claim::draft(
            self.claim_number,
            fixtures::new_claim(&self.eligibility_number),
            &self.actor,
        );
        let rank = self.status.code();

        if rank >= ClaimStatus::DataEntered.code() {
            claim.claim_data = Some(fixtures::claim_data());
            claim.diagnoses = Some(fixtures::diagnoses());
            claim.procedures = Some(fixtures::procedures());
        }
        if rank >= ClaimStatus::GroupedIdrg.code() {
            claim.idrg = Some(IdrgGrouping {
                code: "K-4-15-I".to_string(),
                description: "APPENDECTOMY".to_string(),
                tariff: dec!(4800000),
            });
        }
        if rank >= ClaimStatus::GroupedInacbg.code() {
            match InacbgGrouping::new("K-1-14-I", "PROSEDUR APPENDIX", self.base_tariff, self.top_ups) {
                Ok(grouping) => claim.inacbg = Some(grouping),
                Err(e) => panic!("builder tariffs must not overflow: {}", e),
            }
        }
        if rank >= ClaimStatus::Finalized.code() {
            claim.finalized_at = Some(claim.created_at);
        }
        if rank >= ClaimStatus::Submitted.code() {
            claim.submitted_at = Some(claim.created_at);
        }

        claim.status = self.status;
        claim
    }
}

/// Builder for audit entries
pub struct TestAuditEntryBuilder {
    entry: AuditLogEntry,
}

impl TestAuditEntryBuilder {
    pub fn new(action: &str) -> Self {
        let ctx = RequestContext::for_actor(StringFixtures::actor());
        let mut entry = AuditLogEntry::new(action, "POST", &ctx);
        entry.http_status = Some(200);
        entry.attempts = 1;
        Self { entry }
    }

    pub fn for_claim(mut self, claim: &Claim) -> Self {
        self.entry.claim_id = Some(claim.id);
        self.entry.claim_number = Some(claim.claim_number.clone());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.entry.actor_id = actor.into();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.entry.created_at = created_at;
        self
    }

    pub fn failed(mut self, kind: &str, message: &str) -> Self {
        self.entry.error_kind = Some(kind.to_string());
        self.entry.error_message = Some(message.to_string());
        self
    }

    pub fn build(self) -> AuditLogEntry {
        self.entry
    }
}
