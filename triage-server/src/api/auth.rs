//! Admin token check
//!
//! Accepts `Authorization: Bearer <token>` or a `token` query parameter (so
//! dashboard links and forms work from a plain browser). With no token
//! configured every request passes.

use axum::{
    extract::{Query, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::warn;

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token presented by the request, header first
fn presented_token(request: &Request) -> Option<String> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    bearer.or_else(|| {
        Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(q)| q.token)
    })
}

/// Authentication middleware for protected admin routes
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    match presented_token(&request) {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected admin request with wrong token");
            Err(ApiError::Unauthorized("Invalid admin token".to_string()))
        }
        None => Err(ApiError::Unauthorized("Admin token required".to_string())),
    }
}
