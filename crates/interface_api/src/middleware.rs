//! API middleware

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn};

use core_kernel::RequestContext;

use crate::auth::Claims;
use crate::AppState;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";
pub const REQUEST_ID: &str = "x-request-id";

/// Authentication middleware
///
/// Validates JWT tokens and extracts user claims
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            warn!("Missing or invalid Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    match crate::auth::validate_token(token, &state.config.jwt_secret) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!("Token validation failed: {:?}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Request context middleware
///
/// Builds the `RequestContext` every gateway call is audited with and logs
/// the request once it completes. Must run inside `auth_middleware`.
pub async fn context_middleware(mut request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let actor = request
        .extensions()
        .get::<Claims>()
        .map(|c| c.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let ctx = build_context(actor, request.headers(), peer);
    let actor = ctx.actor_id.clone();
    request.extensions_mut().insert(ctx);

    let start = Instant::now();
    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        user = %actor,
        status = %response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "API request"
    );

    response
}

/// Derives the caller context from headers and the socket peer
pub fn build_context(actor: String, headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestContext {
    let user_agent = header_str(headers, axum::http::header::USER_AGENT.as_str()).map(str::to_string);
    let ctx = RequestContext::for_actor(actor).with_client(client_ip(headers, peer), user_agent);

    match header_str(headers, REQUEST_ID) {
        Some(id) => ctx.with_correlation_id(id),
        None => ctx,
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header_str(headers, FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, REAL_IP).map(str::trim).filter(|ip| !ip.is_empty()))
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
