use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::AppState;

/// Reject requests without `Authorization: Bearer <ADMIN_TOKEN>`.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Admin access is not configured"))?;

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| tokens_match(token.trim(), expected));

    if !authorized {
        tracing::debug!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::unauthorized("Missing or invalid admin token"));
    }

    Ok(next.run(request).await)
}

/// Comparison time depends only on the lengths, not on where bytes differ.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
