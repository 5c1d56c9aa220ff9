//! Admin editing: multipart form submissions turned into committed drafts.
//!
//! Form fields:
//! - `title`, `address`: text; omitted fields keep the stored value on edit
//! - `thumbnail`: file replacing the current thumbnail
//! - `before`, `after`: files appended to the slot, in field order
//! - `remove_thumbnail`: `true` to drop the current thumbnail
//! - `remove_before`, `remove_after`: stored URLs to drop (repeatable)

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use std::sync::Arc;

use super::parse_kind;
use crate::api::response::{ApiError, JSend};
use crate::lifecycle::PostDraft;
use crate::media::{sanitize_file_name, StagedFile};
use crate::storage::models::PostRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Default)]
struct EditorForm {
    title: Option<String>,
    address: Option<String>,
    thumbnail: Option<StagedFile>,
    remove_thumbnail: bool,
    before: Vec<StagedFile>,
    after: Vec<StagedFile>,
    remove_before: Vec<String>,
    remove_after: Vec<String>,
}

impl EditorForm {
    async fn read(mut multipart: Multipart, max_upload_size: u64) -> Result<Self, ApiError> {
        let mut form = EditorForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Fail(e.status(), format!("Invalid multipart data: {e}")))?
        {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "thumbnail" => {
                    if let Some(file) = read_file(field, max_upload_size).await? {
                        form.thumbnail = Some(file);
                    }
                }
                "before" => {
                    if let Some(file) = read_file(field, max_upload_size).await? {
                        form.before.push(file);
                    }
                }
                "after" => {
                    if let Some(file) = read_file(field, max_upload_size).await? {
                        form.after.push(file);
                    }
                }
                "title" => form.title = Some(read_text(field, "title").await?),
                "address" => form.address = Some(read_text(field, "address").await?),
                "remove_thumbnail" => {
                    let value = read_text(field, "remove_thumbnail").await?;
                    form.remove_thumbnail = matches!(value.trim(), "true" | "1" | "on");
                }
                "remove_before" => form
                    .remove_before
                    .push(read_text(field, "remove_before").await?),
                "remove_after" => form
                    .remove_after
                    .push(read_text(field, "remove_after").await?),
                _ => {
                    // Ignore unknown fields
                }
            }
        }

        Ok(form)
    }

    /// Stage the submitted changes on `draft`. No storage is touched.
    fn apply(self, draft: &mut PostDraft) -> Result<(), ApiError> {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(address) = self.address {
            draft.address = address;
        }

        if self.remove_thumbnail {
            draft.remove_thumbnail();
        }
        // A new file wins over a removal in the same submission
        if let Some(file) = self.thumbnail {
            draft.replace_thumbnail(file);
        }

        for url in &self.remove_before {
            if !draft.before.mark_removed(url) {
                return Err(ApiError::bad_request(format!(
                    "'{url}' is not a before image of this post"
                )));
            }
        }
        for url in &self.remove_after {
            if !draft.after.mark_removed(url) {
                return Err(ApiError::bad_request(format!(
                    "'{url}' is not an after image of this post"
                )));
            }
        }

        for file in self.before {
            draft.before.stage(file);
        }
        for file in self.after {
            draft.after.stage(file);
        }
        Ok(())
    }
}

async fn read_text(field: Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid {name}: {e}")))
}

/// An empty file input (no name, no bytes) yields `None`.
async fn read_file(field: Field<'_>, max_upload_size: u64) -> Result<Option<StagedFile>, ApiError> {
    let file_name = field.file_name().unwrap_or("").to_string();
    let content_type = field.content_type().map(|s| s.to_string());

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::Fail(e.status(), format!("Failed to read file: {e}")))?;

    if file_name.is_empty() && data.is_empty() {
        return Ok(None);
    }

    if data.len() as u64 > max_upload_size {
        return Err(ApiError::payload_too_large(format!(
            "File exceeds maximum upload size of {max_upload_size} bytes"
        )));
    }

    let file_name =
        sanitize_file_name(&file_name).map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Some(StagedFile::new(file_name, content_type, data)))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<Json<JSend<PostRecord>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let form = EditorForm::read(multipart, state.config.max_upload_size).await?;

    let mut draft = PostDraft::create(kind);
    form.apply(&mut draft)?;

    let post = state.lifecycle.commit(&draft).await?;
    tracing::debug!(post_id = %post.id, kind = %kind, "Created post");

    Ok(JSend::success(post))
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<JSend<PostRecord>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let form = EditorForm::read(multipart, state.config.max_upload_size).await?;

    let mut draft = state.lifecycle.open(kind, &id).await?;
    form.apply(&mut draft)?;

    let post = state.lifecycle.commit(&draft).await?;
    tracing::debug!(post_id = %post.id, kind = %kind, "Updated post");

    Ok(JSend::success(post))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<JSend<()>>, ApiError> {
    let kind = parse_kind(&kind)?;
    state.lifecycle.delete(kind, &id).await?;

    Ok(JSend::success(()))
}
