//! Audit DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::ClaimId;
use domain_claims::{AuditLogEntry, AuditQuery};

/// Query string for `GET /audit`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AuditQueryParams {
    pub claim_id: Option<Uuid>,
    pub claim_number: Option<String>,
    pub action: Option<String>,
    pub actor: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

impl From<AuditQueryParams> for AuditQuery {
    fn from(params: AuditQueryParams) -> Self {
        AuditQuery {
            claim_id: params.claim_id.map(ClaimId::from_uuid),
            claim_number: params.claim_number,
            action: params.action,
            actor_id: params.actor,
            from: params.from,
            to: params.to,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditPage {
    pub items: Vec<AuditLogEntry>,
    pub limit: i64,
    pub offset: i64,
}
