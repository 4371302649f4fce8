//! Claim lifecycle orchestration
//!
//! Ties the claim mirror, the provider configuration, the resilient client
//! and the audit trail together. Each lifecycle operation:
//!
//! 1. loads the claim and checks the requested transition,
//! 2. resolves the hospital's provider configuration,
//! 3. sends the action to E-Klaim,
//! 4. stores the response on the mirror and advances its status,
//! 5. records exactly one audit entry, whatever happened above.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use core_kernel::RequestContext;
use infra_eklaim::{EklaimAction, EklaimConfig, ExchangeTrace, RequestEnvelope, ResilientClient, ResponseEnvelope};

use crate::audit::{AuditLogEntry, AuditWriter};
use crate::claim::{Claim, ClaimEvent, GrouperStage, IdrgGrouping, InacbgGrouping, NewClaim};
use crate::error::ClaimError;
use crate::ports::{ClaimStore, ConfigStore};

/// Audit entry under construction for one lifecycle call
struct AuditedCall {
    entry: AuditLogEntry,
    started: Instant,
}

impl AuditedCall {
    fn start(action: EklaimAction, ctx: &RequestContext) -> Self {
        Self {
            entry: AuditLogEntry::new(action.as_str(), action.http_method(), ctx),
            started: Instant::now(),
        }
    }

    fn request(&mut self, request: &RequestEnvelope) {
        self.entry.request_plain = request.to_json().ok();
    }

    fn claim(&mut self, claim: &Claim) {
        self.entry.claim_id = Some(claim.id);
        self.entry.claim_number = Some(claim.claim_number.clone());
    }

    fn trace(&mut self, trace: &ExchangeTrace) {
        if trace.request_plain.is_some() {
            self.entry.request_plain = trace.request_plain.clone();
        }
        self.entry.request_encrypted = trace.request_encrypted.clone();
        self.entry.response_plain = trace.response_plain.clone();
        self.entry.response_encrypted = trace.response_encrypted.clone();
        self.entry.http_status = trace.http_status;
        self.entry.attempts = trace.attempts;
    }

    /// Closes the entry; response snapshots from the exchange are kept even
    /// when the call failed after the remote answered
    fn finish<T>(mut self, result: &Result<T, ClaimError>) -> AuditLogEntry {
        if let Err(e) = result {
            self.entry.error_kind = Some(e.kind().to_string());
            self.entry.error_message = Some(e.to_string());
        }
        self.entry.elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.entry
    }
}

/// Lifecycle gateway to E-Klaim
#[derive(Clone)]
pub struct ClaimGateway {
    client: ResilientClient,
    claims: Arc<dyn ClaimStore>,
    configs: Arc<dyn ConfigStore>,
    audit: AuditWriter,
}

impl ClaimGateway {
    pub fn new(
        client: ResilientClient,
        claims: Arc<dyn ClaimStore>,
        configs: Arc<dyn ConfigStore>,
        audit: AuditWriter,
    ) -> Self {
        Self { client, claims, configs, audit }
    }

    pub fn audit(&self) -> &AuditWriter {
        &self.audit
    }

    pub fn claims(&self) -> &Arc<dyn ClaimStore> {
        &self.claims
    }

    /// Registers a new claim for an eligibility letter
    ///
    /// # Errors
    ///
    /// - `DuplicateClaim` if the letter already has a claim
    /// - `ConfigNotFound` if the hospital has no provider configuration
    /// - `Gateway` for any wire-level failure
    pub async fn new_claim(&self, new: NewClaim, ctx: &RequestContext) -> Result<Claim, ClaimError> {
        let mut call = AuditedCall::start(EklaimAction::NewClaim, ctx);
        let result = self.register(new, ctx, &mut call).await;
        self.audit.record(call.finish(&result));
        result
    }

    /// Sends claim data (admission, discharge, billing totals)
    pub async fn set_claim_data(
        &self,
        claim_number: &str,
        payload: Value,
        ctx: &RequestContext,
    ) -> Result<Claim, ClaimError> {
        let stored = payload.clone();
        self.transition(EklaimAction::SetClaimData, ClaimEvent::ClaimData, claim_number, payload, None, ctx, move |claim, _| {
            claim.claim_data = Some(stored);
            Ok(())
        })
        .await
    }

    /// Sends the diagnosis list
    pub async fn set_diagnoses(
        &self,
        claim_number: &str,
        payload: Value,
        ctx: &RequestContext,
    ) -> Result<Claim, ClaimError> {
        let stored = payload.clone();
        self.transition(EklaimAction::IdrgDiagnosaSet, ClaimEvent::Diagnoses, claim_number, payload, None, ctx, move |claim, _| {
            claim.diagnoses = Some(stored);
            Ok(())
        })
        .await
    }

    /// Sends the procedure list
    pub async fn set_procedures(
        &self,
        claim_number: &str,
        payload: Value,
        ctx: &RequestContext,
    ) -> Result<Claim, ClaimError> {
        let stored = payload.clone();
        self.transition(EklaimAction::IdrgProcedureSet, ClaimEvent::Procedures, claim_number, payload, None, ctx, move |claim, _| {
            claim.procedures = Some(stored);
            Ok(())
        })
        .await
    }

    /// Runs the grouper; stage `"1"` is iDRG, stage `"2"` is INACBG
    pub async fn execute_grouper(
        &self,
        claim_number: &str,
        stage: &str,
        ctx: &RequestContext,
    ) -> Result<Claim, ClaimError> {
        let stage = match stage.parse::<GrouperStage>() {
            Ok(stage) => stage,
            Err(e) => {
                let mut call = AuditedCall::start(EklaimAction::Grouper, ctx);
                call.entry.claim_number = Some(claim_number.to_string());
                call.request(
                    &RequestEnvelope::new(EklaimAction::Grouper, Value::Null)
                        .for_claim(claim_number)
                        .with_stage(stage),
                );
                let result: Result<Claim, ClaimError> = Err(e);
                self.audit.record(call.finish(&result));
                return result;
            }
        };

        self.transition(
            EklaimAction::Grouper,
            stage.event(),
            claim_number,
            Value::Null,
            Some(stage),
            ctx,
            move |claim, envelope| {
                match stage {
                    GrouperStage::Idrg => claim.idrg = Some(IdrgGrouping::from_response(&envelope.response)?),
                    GrouperStage::Inacbg => claim.inacbg = Some(InacbgGrouping::from_response(&envelope.response)?),
                }
                Ok(())
            },
        )
        .await
    }

    /// Locks a grouped claim for submission
    pub async fn finalize_claim(&self, claim_number: &str, ctx: &RequestContext) -> Result<Claim, ClaimError> {
        self.transition(EklaimAction::ClaimFinal, ClaimEvent::Finalize, claim_number, Value::Null, None, ctx, |_, _| Ok(()))
            .await
    }

    /// Reopens a finalized claim for editing, discarding grouping results
    pub async fn reedit_claim(&self, claim_number: &str, ctx: &RequestContext) -> Result<Claim, ClaimError> {
        self.transition(EklaimAction::ReeditClaim, ClaimEvent::Reedit, claim_number, Value::Null, None, ctx, |_, _| Ok(()))
            .await
    }

    /// Sends a finalized claim to the insurer
    pub async fn submit_claim(&self, claim_number: &str, ctx: &RequestContext) -> Result<Claim, ClaimError> {
        self.transition(
            EklaimAction::SendClaimIndividual,
            ClaimEvent::Submit,
            claim_number,
            Value::Null,
            None,
            ctx,
            |_, _| Ok(()),
        )
        .await
    }

    /// Reads the local mirror; no remote call and no audit entry
    pub async fn get_claim(&self, claim_number: &str) -> Result<Claim, ClaimError> {
        self.claims
            .find_by_claim_number(claim_number)
            .await?
            .ok_or_else(|| ClaimError::ClaimNotFound(claim_number.to_string()))
    }

    async fn register(&self, new: NewClaim, ctx: &RequestContext, call: &mut AuditedCall) -> Result<Claim, ClaimError> {
        let request = RequestEnvelope::new(
            EklaimAction::NewClaim,
            json!({
                "eligibility_number": new.eligibility_number,
                "hospital_code": new.hospital_code,
                "patient": new.patient,
            }),
        );
        call.request(&request);

        if new.eligibility_number.trim().is_empty() {
            return Err(ClaimError::Validation("eligibility number is empty".to_string()));
        }

        if self
            .claims
            .find_by_eligibility_number(&new.eligibility_number)
            .await?
            .is_some()
        {
            warn!(eligibility_number = %new.eligibility_number, "Duplicate claim registration rejected");
            return Err(ClaimError::DuplicateClaim(new.eligibility_number));
        }

        let config = self.config_for(&new.hospital_code).await?;
        let envelope = self.send(&request, &config, call).await?;

        let claim_number = envelope
            .field("claim_number")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ClaimError::InvalidResponse("new_claim response has no claim_number".to_string()))?
            .to_string();

        let eligibility_number = new.eligibility_number.clone();
        let claim = Claim::draft(claim_number, new, &ctx.actor_id);
        call.claim(&claim);

        match self.claims.insert(&claim).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => return Err(ClaimError::DuplicateClaim(eligibility_number)),
            Err(e) => return Err(e.into()),
        }

        info!(
            claim_id = %claim.id,
            claim_number = %claim.claim_number,
            hospital_code = %claim.hospital_code,
            actor = %ctx.actor_id,
            "Claim registered with E-Klaim"
        );
        Ok(claim)
    }

    #[allow(clippy::too_many_arguments)]
    async fn transition<F>(
        &self,
        action: EklaimAction,
        event: ClaimEvent,
        claim_number: &str,
        data: Value,
        stage: Option<GrouperStage>,
        ctx: &RequestContext,
        apply: F,
    ) -> Result<Claim, ClaimError>
    where
        F: FnOnce(&mut Claim, &ResponseEnvelope) -> Result<(), ClaimError> + Send,
    {
        let mut call = AuditedCall::start(action, ctx);
        call.entry.claim_number = Some(claim_number.to_string());

        let mut request = RequestEnvelope::new(action, data).for_claim(claim_number);
        if let Some(stage) = stage {
            request = request.with_stage(stage.as_str());
        }
        call.request(&request);

        let result = self.run_transition(event, claim_number, &request, ctx, &mut call, apply).await;
        self.audit.record(call.finish(&result));
        result
    }

    async fn run_transition<F>(
        &self,
        event: ClaimEvent,
        claim_number: &str,
        request: &RequestEnvelope,
        ctx: &RequestContext,
        call: &mut AuditedCall,
        apply: F,
    ) -> Result<Claim, ClaimError>
    where
        F: FnOnce(&mut Claim, &ResponseEnvelope) -> Result<(), ClaimError> + Send,
    {
        let mut claim = self.get_claim(claim_number).await?;
        call.claim(&claim);

        let from = claim.status;
        if let Err(e) = from.ensure(event) {
            warn!(claim_number, status = %from, action = %request.action(), "Lifecycle call rejected");
            return Err(e);
        }

        let config = self.config_for(&claim.hospital_code).await?;
        let envelope = self.send(request, &config, call).await?;

        apply(&mut claim, &envelope)?;
        claim.advance(event, &ctx.actor_id)?;
        self.claims.update(&claim).await?;

        info!(
            claim_number,
            action = %request.action(),
            from = %from,
            to = %claim.status,
            actor = %ctx.actor_id,
            "Claim advanced"
        );
        Ok(claim)
    }

    async fn send(
        &self,
        request: &RequestEnvelope,
        config: &EklaimConfig,
        call: &mut AuditedCall,
    ) -> Result<ResponseEnvelope, ClaimError> {
        let exchange = self.client.send(request, config).await;
        call.trace(&exchange.trace);
        Ok(exchange.outcome?)
    }

    async fn config_for(&self, hospital_code: &str) -> Result<EklaimConfig, ClaimError> {
        let record = self
            .configs
            .find_by_hospital(hospital_code)
            .await?
            .ok_or_else(|| ClaimError::ConfigNotFound(hospital_code.to_string()))?;
        Ok(EklaimConfig::try_from(record)?)
    }
}

impl std::fmt::Debug for ClaimGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimGateway").field("client", &self.client).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimStatus;
    use crate::ports::mock::{InMemoryAuditStore, InMemoryClaimStore, InMemoryConfigStore};
    use infra_eklaim::mock::{test_config, test_config_record, ScriptedTransport};
    use infra_eklaim::{EklaimError, RateLimiterRegistry};
    use rust_decimal_macros::dec;

    struct Harness {
        gateway: ClaimGateway,
        transport: ScriptedTransport,
        claims: InMemoryClaimStore,
        audit: InMemoryAuditStore,
    }

    async fn harness() -> Harness {
        let transport = ScriptedTransport::new(test_config());
        let claims = InMemoryClaimStore::new();
        let configs = InMemoryConfigStore::with_configs(vec![test_config_record()]).await;
        let audit = InMemoryAuditStore::new();

        let gateway = ClaimGateway::new(
            ResilientClient::new(Arc::new(transport.clone()), RateLimiterRegistry::new()),
            Arc::new(claims.clone()),
            Arc::new(configs),
            AuditWriter::spawn(Arc::new(audit.clone())),
        );

        Harness { gateway, transport, claims, audit }
    }

    fn ctx() -> RequestContext {
        RequestContext::for_actor("coder-7").with_client(Some("10.1.2.3".into()), Some("test-agent".into()))
    }

    fn new_claim(sep: &str) -> NewClaim {
        NewClaim {
            eligibility_number: sep.to_string(),
            hospital_code: test_config().hospital_code,
            patient: json!({"name": "Siti Rahayu", "card_number": "0001234567890"}),
        }
    }

    async fn registered(h: &Harness, sep: &str, number: &str) -> Claim {
        h.transport.push_envelope(ResponseEnvelope::ok(json!({"claim_number": number}))).await;
        h.gateway.new_claim(new_claim(sep), &ctx()).await.unwrap()
    }

    #[tokio::test]
    async fn test_new_claim_creates_draft_and_audits() {
        let h = harness().await;
        let claim = registered(&h, "0301R0010001", "EK-0001").await;
        h.gateway.audit().flush().await;

        assert_eq!(claim.status, ClaimStatus::Draft);
        assert_eq!(claim.claim_number, "EK-0001");
        assert_eq!(h.claims.len().await, 1);

        let entries = h.audit.entries().await;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.action, "new_claim");
        assert_eq!(entry.claim_id, Some(claim.id));
        assert_eq!(entry.actor_id, "coder-7");
        assert_eq!(entry.client_ip.as_deref(), Some("10.1.2.3"));
        assert_eq!(entry.http_status, Some(200));
        assert!(entry.request_encrypted.is_some());
        assert!(entry.response_plain.as_deref().unwrap().contains("EK-0001"));
        assert!(entry.is_success());
    }

    #[tokio::test]
    async fn test_duplicate_eligibility_rejected_without_remote_call() {
        let h = harness().await;
        registered(&h, "0301R0010002", "EK-0002").await;

        let result = h.gateway.new_claim(new_claim("0301R0010002"), &ctx()).await;
        h.gateway.audit().flush().await;

        assert!(matches!(result, Err(ClaimError::DuplicateClaim(_))));
        assert_eq!(h.transport.request_count().await, 1);

        let entries = h.audit.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].error_kind.as_deref(), Some("duplicate_claim"));
        assert!(entries[1].request_plain.is_some());
        assert_eq!(entries[1].attempts, 0);
    }

    #[tokio::test]
    async fn test_missing_config_is_reported_and_audited() {
        let h = harness().await;
        let mut request = new_claim("0301R0010003");
        request.hospital_code = "9999999".to_string();

        let result = h.gateway.new_claim(request, &ctx()).await;
        h.gateway.audit().flush().await;

        assert!(matches!(result, Err(ClaimError::ConfigNotFound(code)) if code == "9999999"));
        assert_eq!(h.transport.request_count().await, 0);
        assert_eq!(h.audit.entries().await[0].error_kind.as_deref(), Some("config_not_found"));
    }

    #[tokio::test]
    async fn test_grouper_before_data_is_invalid_state() {
        let h = harness().await;
        registered(&h, "0301R0010004", "EK-0004").await;

        let result = h.gateway.execute_grouper("EK-0004", "1", &ctx()).await;

        match result {
            Err(ClaimError::InvalidState { actual, .. }) => assert_eq!(actual, ClaimStatus::Draft),
            other => panic!("expected invalid state, got {:?}", other),
        }
        assert_eq!(h.gateway.get_claim("EK-0004").await.unwrap().status, ClaimStatus::Draft);
        assert_eq!(h.transport.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_stage_is_audited() {
        let h = harness().await;
        registered(&h, "0301R0010005", "EK-0005").await;

        let result = h.gateway.execute_grouper("EK-0005", "3", &ctx()).await;
        h.gateway.audit().flush().await;

        assert!(matches!(result, Err(ClaimError::InvalidStage(s)) if s == "3"));
        let entries = h.audit.entries().await;
        assert_eq!(entries[1].action, "grouper");
        assert_eq!(entries[1].error_kind.as_deref(), Some("invalid_stage"));
    }

    #[tokio::test]
    async fn test_inacbg_total_includes_top_ups() {
        let h = harness().await;
        registered(&h, "0301R0010006", "EK-0006").await;

        h.transport.push_envelope(ResponseEnvelope::ok(json!({}))).await;
        h.gateway.set_claim_data("EK-0006", json!({"los": 3}), &ctx()).await.unwrap();

        h.transport
            .push_envelope(ResponseEnvelope::ok(json!({
                "idrg": {"code": "K-4-15-I", "description": "Appendectomy", "tariff": "4500000"}
            })))
            .await;
        let claim = h.gateway.execute_grouper("EK-0006", "1", &ctx()).await.unwrap();
        assert_eq!(claim.status, ClaimStatus::GroupedIdrg);
        assert_eq!(claim.idrg.as_ref().unwrap().tariff, dec!(4500000));

        h.transport
            .push_envelope(ResponseEnvelope::ok(json!({
                "inacbg": {
                    "code": "K-1-14-I",
                    "description": "APPENDECTOMY RINGAN",
                    "base_tariff": 5200000,
                    "special_procedure": 750000,
                    "special_drug": "125000.50",
                    "chronic": null
                }
            })))
            .await;
        let claim = h.gateway.execute_grouper("EK-0006", "2", &ctx()).await.unwrap();

        assert_eq!(claim.status, ClaimStatus::GroupedInacbg);
        assert_eq!(claim.total_tariff(), Some(dec!(6075000.50)));
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_claim_unchanged() {
        let h = harness().await;
        registered(&h, "0301R0010007", "EK-0007").await;
        h.transport.push_envelope(ResponseEnvelope::error(400, "E2105", "invalid discharge date")).await;

        let result = h.gateway.set_claim_data("EK-0007", json!({"los": -1}), &ctx()).await;
        h.gateway.audit().flush().await;

        assert!(matches!(result, Err(ClaimError::Gateway(EklaimError::Protocol { .. }))));
        let claim = h.gateway.get_claim("EK-0007").await.unwrap();
        assert_eq!(claim.status, ClaimStatus::Draft);
        assert!(claim.claim_data.is_none());

        let entry = &h.audit.entries().await[1];
        assert_eq!(entry.error_kind.as_deref(), Some("protocol_error"));
        assert!(entry.response_plain.as_deref().unwrap().contains("E2105"));
        assert_eq!(entry.attempts, 1);
    }

    #[tokio::test]
    async fn test_conflict_after_remote_success_keeps_response() {
        let h = harness().await;
        registered(&h, "0301R0010009", "EK-0009").await;

        // E-Klaim hands out a number the mirror already holds
        h.transport.push_envelope(ResponseEnvelope::ok(json!({"claim_number": "EK-0009"}))).await;
        let result = h.gateway.new_claim(new_claim("0301R0010010"), &ctx()).await;
        h.gateway.audit().flush().await;

        assert!(matches!(result, Err(ClaimError::DuplicateClaim(sep)) if sep == "0301R0010010"));
        assert_eq!(h.claims.len().await, 1);

        let entry = &h.audit.entries().await[1];
        assert_eq!(entry.error_kind.as_deref(), Some("duplicate_claim"));
        assert_eq!(entry.http_status, Some(200));
        assert!(entry.response_encrypted.is_some());
        assert!(entry.response_plain.as_deref().unwrap().contains("EK-0009"));
    }

    #[tokio::test]
    async fn test_overflowing_tariff_is_rejected_and_audited() {
        let h = harness().await;
        registered(&h, "0301R0010011", "EK-0011").await;
        h.transport.push_envelope(ResponseEnvelope::ok(json!({}))).await;
        h.gateway.set_claim_data("EK-0011", json!({"los": 2}), &ctx()).await.unwrap();
        h.transport
            .push_envelope(ResponseEnvelope::ok(json!({
                "idrg": {"code": "K-4-15-I", "description": "Appendectomy", "tariff": 4500000}
            })))
            .await;
        h.gateway.execute_grouper("EK-0011", "1", &ctx()).await.unwrap();

        h.transport
            .push_envelope(ResponseEnvelope::ok(json!({
                "inacbg": {
                    "code": "K-1-14-I",
                    "base_tariff": "79228162514264337593543950335",
                    "special_drug": "79228162514264337593543950335"
                }
            })))
            .await;
        let result = h.gateway.execute_grouper("EK-0011", "2", &ctx()).await;
        h.gateway.audit().flush().await;

        assert!(matches!(result, Err(ClaimError::InvalidResponse(_))));
        let claim = h.gateway.get_claim("EK-0011").await.unwrap();
        assert_eq!(claim.status, ClaimStatus::GroupedIdrg);
        assert!(claim.inacbg.is_none());

        let entries = h.audit.entries().await;
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].action, "grouper");
        assert_eq!(entries[3].error_kind.as_deref(), Some("invalid_response"));
        assert!(entries[3].response_plain.is_some());
    }

    #[tokio::test]
    async fn test_get_claim_is_not_audited() {
        let h = harness().await;
        registered(&h, "0301R0010008", "EK-0008").await;

        h.gateway.get_claim("EK-0008").await.unwrap();
        assert!(matches!(h.gateway.get_claim("nope").await, Err(ClaimError::ClaimNotFound(_))));
        h.gateway.audit().flush().await;

        assert_eq!(h.audit.len().await, 1);
    }
}
