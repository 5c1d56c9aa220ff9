use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::AppState;

/// Serve a stored object by key.
/// Route: GET /o/*key (the key arrives percent-decoded)
pub async fn serve_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.object_store.get(&key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey(_) => {
            ApiError::not_found("Object not found")
        }
        _ => ApiError::internal(format!("Failed to retrieve object: {e}")),
    })?;

    let content_type = mime_guess::from_path(&key)
        .first()
        .and_then(|m| HeaderValue::from_str(m.as_ref()).ok())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let byte_size = data.len() as u64;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(byte_size));

    // Keys freed by an edit can be reused by a later upload
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok(response)
}
