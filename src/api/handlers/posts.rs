use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::parse_kind;
use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::config::MAX_FEED_PER_KIND;
use crate::storage::models::PostRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    #[serde(default)]
    pub per_kind: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    AppQuery(params): AppQuery<ListPostsParams>,
) -> Result<Json<JSendPaginated<PostRecord>>, ApiError> {
    let kind = parse_kind(&kind)?;
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let posts = state.gallery.list(kind).await?;
    let total = posts.len() as u64;
    let items: Vec<PostRecord> = posts
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<JSend<PostRecord>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let post = state
        .gallery
        .get(kind, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(JSend::success(post))
}

/// Newest posts across every kind, regardless of kind.
pub async fn home_feed(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<FeedParams>,
) -> Result<Json<JSend<Vec<PostRecord>>>, ApiError> {
    let per_kind = params.per_kind.unwrap_or(state.config.feed_per_kind);
    if per_kind == 0 || per_kind > MAX_FEED_PER_KIND {
        return Err(ApiError::bad_request(format!(
            "per_kind must be between 1 and {MAX_FEED_PER_KIND}"
        )));
    }

    let feed = state.gallery.home_feed(per_kind).await?;
    Ok(JSend::success(feed))
}
