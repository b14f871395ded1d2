//! Bearer-token middleware.
//!
//! Extracts the session token from `Authorization: Bearer <token>`, verifies
//! it and stores the `Claims` in request extensions for handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::{errors::AppError, AppState};

/// Paths reachable without a session.
pub fn is_public_path(path: &str) -> bool {
    matches!(
        path,
        "/health" | "/api-docs/openapi.json" | "/auth/register" | "/auth/login" | "/api/chat"
    )
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing authorization token".into()))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::Unauthorized("invalid or expired token".into())
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
