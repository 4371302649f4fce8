//! Claim lifecycle handlers
//!
//! Each write handler maps to exactly one gateway operation; the gateway
//! owns the status checks and the audit entry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;

use core_kernel::RequestContext;

use crate::auth::{self, permissions, Claims};
use crate::dto::claims::*;
use crate::{error::ApiError, AppState};

type ClaimResult = Result<Json<ClaimResponse>, ApiError>;

/// Registers a claim for an eligibility letter
pub async fn new_claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<NewClaimRequest>,
) -> Result<(StatusCode, Json<ClaimResponse>), ApiError> {
    auth::require(&claims, permissions::CLAIM_WRITE)?;
    let new = request.into_new_claim()?;
    let claim = state.gateway.new_claim(new, &ctx).await?;
    Ok((StatusCode::CREATED, Json(claim.into())))
}

/// Reads the local mirror of a claim
pub async fn get_claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(claim_number): Path<String>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_READ)?;
    let claim = state.gateway.get_claim(&claim_number).await?;
    Ok(Json(claim.into()))
}

pub async fn set_claim_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(claim_number): Path<String>,
    Json(payload): Json<Value>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_WRITE)?;
    ensure_payload(&payload)?;
    let claim = state.gateway.set_claim_data(&claim_number, payload, &ctx).await?;
    Ok(Json(claim.into()))
}

pub async fn set_diagnoses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(claim_number): Path<String>,
    Json(payload): Json<Value>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_WRITE)?;
    ensure_payload(&payload)?;
    let claim = state.gateway.set_diagnoses(&claim_number, payload, &ctx).await?;
    Ok(Json(claim.into()))
}

pub async fn set_procedures(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(claim_number): Path<String>,
    Json(payload): Json<Value>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_WRITE)?;
    ensure_payload(&payload)?;
    let claim = state.gateway.set_procedures(&claim_number, payload, &ctx).await?;
    Ok(Json(claim.into()))
}

/// Runs grouper stage 1 (iDRG) or 2 (INACBG)
pub async fn execute_grouper(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(claim_number): Path<String>,
    Json(request): Json<GrouperRequest>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_WRITE)?;
    let claim = state.gateway.execute_grouper(&claim_number, &request.stage(), &ctx).await?;
    Ok(Json(claim.into()))
}

pub async fn finalize_claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(claim_number): Path<String>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_WRITE)?;
    let claim = state.gateway.finalize_claim(&claim_number, &ctx).await?;
    Ok(Json(claim.into()))
}

pub async fn reedit_claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(claim_number): Path<String>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_WRITE)?;
    let claim = state.gateway.reedit_claim(&claim_number, &ctx).await?;
    Ok(Json(claim.into()))
}

pub async fn submit_claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(claim_number): Path<String>,
) -> ClaimResult {
    auth::require(&claims, permissions::CLAIM_SUBMIT)?;
    let claim = state.gateway.submit_claim(&claim_number, &ctx).await?;
    Ok(Json(claim.into()))
}
