//! Audit trail handlers

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use validator::Validate;

use domain_claims::AuditQuery;

use crate::auth::{self, permissions, Claims};
use crate::dto::audit::{AuditPage, AuditQueryParams};
use crate::{error::ApiError, AppState};

/// Searches the audit trail, newest first
pub async fn search_audit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditPage>, ApiError> {
    auth::require(&claims, permissions::AUDIT_READ)?;
    params.validate()?;

    let query = AuditQuery::from(params);
    let items = state.gateway.audit().search(&query).await?;

    Ok(Json(AuditPage {
        items,
        limit: query.page_size(),
        offset: query.page_offset(),
    }))
}
