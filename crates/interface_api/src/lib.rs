//! HTTP API Layer
//!
//! REST surface of the E-Klaim gateway, built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one per lifecycle operation plus audit search and health
//! - **Middleware**: JWT authentication, request context, request logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: domain errors folded into HTTP statuses in one place
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(gateway, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod retention;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use core_kernel::HealthCheckable;
use domain_claims::ClaimGateway;

use crate::config::ApiConfig;
use crate::handlers::{audit, claims, health};
use crate::middleware::{auth_middleware, context_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: ClaimGateway,
    /// Adapters checked by `/health/ready`
    pub health_checks: Vec<Arc<dyn HealthCheckable>>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(gateway: ClaimGateway, config: ApiConfig) -> Self {
        Self { gateway, health_checks: Vec::new(), config }
    }

    pub fn with_health_check(mut self, adapter: Arc<dyn HealthCheckable>) -> Self {
        self.health_checks.push(adapter);
        self
    }
}

/// Creates the main API router
///
/// Lifecycle routes live under `/api/v1/eklaim` and require a bearer
/// token; `/health` and `/health/ready` are public.
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let claim_routes = Router::new()
        .route("/", post(claims::new_claim))
        .route("/:claim_number", get(claims::get_claim))
        .route("/:claim_number/data", put(claims::set_claim_data))
        .route("/:claim_number/diagnoses", put(claims::set_diagnoses))
        .route("/:claim_number/procedures", put(claims::set_procedures))
        .route("/:claim_number/grouper", post(claims::execute_grouper))
        .route("/:claim_number/final", post(claims::finalize_claim))
        .route("/:claim_number/reedit", post(claims::reedit_claim))
        .route("/:claim_number/submit", post(claims::submit_claim));

    // Protected API routes; auth runs before the context is built
    let api_routes = Router::new()
        .nest("/claims", claim_routes)
        .route("/audit", get(audit::search_audit))
        .layer(axum_middleware::from_fn(context_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1/eklaim", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
