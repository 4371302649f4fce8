//! Claims DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use domain_claims::{Claim, ClaimStatus, IdrgGrouping, InacbgGrouping, NewClaim};

use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct NewClaimRequest {
    /// Eligibility letter (SEP) the claim is raised against
    #[validate(length(min = 1, max = 64))]
    pub eligibility_number: String,
    #[validate(length(min = 1, max = 32))]
    pub hospital_code: String,
    pub patient: Value,
}

impl NewClaimRequest {
    pub fn into_new_claim(self) -> Result<NewClaim, ApiError> {
        self.validate()?;
        if !self.patient.is_object() {
            return Err(ApiError::Validation("patient must be a JSON object".to_string()));
        }
        Ok(NewClaim {
            eligibility_number: self.eligibility_number.trim().to_string(),
            hospital_code: self.hospital_code.trim().to_string(),
            patient: self.patient,
        })
    }
}

/// Grouper stage, accepted as `"1"` or `1`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StageValue {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
pub struct GrouperRequest {
    pub stage: StageValue,
}

impl GrouperRequest {
    pub fn stage(&self) -> String {
        match &self.stage {
            StageValue::Text(text) => text.clone(),
            StageValue::Number(n) => n.to_string(),
        }
    }
}

/// Claim data, diagnoses and procedures are forwarded as-is
pub fn ensure_payload(payload: &Value) -> Result<(), ApiError> {
    match payload {
        Value::Object(map) if !map.is_empty() => Ok(()),
        Value::Array(items) if !items.is_empty() => Ok(()),
        _ => Err(ApiError::Validation("payload must be a non-empty JSON object or array".to_string())),
    }
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub id: Uuid,
    pub claim_number: String,
    pub eligibility_number: String,
    pub hospital_code: String,
    pub status: ClaimStatus,
    pub status_code: i16,
    pub patient: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnoses: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedures: Option<Value>,
    pub idrg: Option<IdrgGrouping>,
    pub inacbg: Option<InacbgGrouping>,
    pub total_tariff: Option<Decimal>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<Claim> for ClaimResponse {
    fn from(claim: Claim) -> Self {
        let total_tariff = claim.total_tariff();
        Self {
            id: *claim.id.as_uuid(),
            claim_number: claim.claim_number,
            eligibility_number: claim.eligibility_number,
            hospital_code: claim.hospital_code,
            status: claim.status,
            status_code: claim.status.code(),
            patient: claim.patient,
            claim_data: claim.claim_data,
            diagnoses: claim.diagnoses,
            procedures: claim.procedures,
            idrg: claim.idrg,
            inacbg: claim.inacbg,
            total_tariff,
            created_by: claim.created_by,
            updated_by: claim.updated_by,
            created_at: claim.created_at,
            updated_at: claim.updated_at,
            finalized_at: claim.finalized_at,
            submitted_at: claim.submitted_at,
        }
    }
}
