//! Post lifecycle coordination.
//!
//! A [`PostDraft`] collects staged edits without touching storage. Committing
//! it runs three phases against the object store and the post repository:
//!
//! 1. upload every staged file (thumbnail first, then before, then after),
//! 2. create or patch the post document,
//! 3. delete the objects the new document no longer references.
//!
//! A persisted post therefore never references an object that is missing.
//! Failures in phase 1 or 2 roll back this attempt's uploads; failures in
//! phase 3 only leave orphans and are logged.

mod draft;

pub use draft::{ImageSlotDraft, PostDraft, StagedId, ThumbnailEdit, ValidationError};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::media::{object_key, MediaError, MediaStore, Slot, StagedFile};
use crate::storage::models::{Kind, PostPatch, PostRecord};
use crate::storage::{PostRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Upload failed: {0}")]
    Upload(#[source] MediaError),
    #[error("Post {kind}/{id} not found")]
    NotFound { kind: Kind, id: String },
    #[error("Failed to write post: {0}")]
    DocumentWrite(#[source] RepositoryError),
    #[error("Failed to read post: {0}")]
    Read(#[source] RepositoryError),
}

impl From<RepositoryError> for LifecycleError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { kind, id } => LifecycleError::NotFound { kind, id },
            other => LifecycleError::DocumentWrite(other),
        }
    }
}

/// One staged file resolved to the key it will be stored under.
struct PlannedUpload<'a> {
    slot: Slot,
    key: String,
    file: &'a StagedFile,
}

#[derive(Default)]
struct Uploaded {
    thumbnail: Option<String>,
    before: Vec<String>,
    after: Vec<String>,
}

impl Uploaded {
    fn push(&mut self, slot: Slot, url: String) {
        match slot {
            Slot::Thumbnail => self.thumbnail = Some(url),
            Slot::Before => self.before.push(url),
            Slot::After => self.after.push(url),
        }
    }

    fn urls(&self) -> impl Iterator<Item = &str> {
        self.thumbnail
            .iter()
            .chain(&self.before)
            .chain(&self.after)
            .map(String::as_str)
    }
}

#[derive(Clone)]
pub struct PostLifecycle {
    posts: Arc<dyn PostRepository>,
    media: MediaStore,
}

impl PostLifecycle {
    pub fn new(posts: Arc<dyn PostRepository>, media: MediaStore) -> Self {
        Self { posts, media }
    }

    /// Load a stored post into an edit draft.
    pub async fn open(&self, kind: Kind, id: &str) -> Result<PostDraft, LifecycleError> {
        self.posts
            .get(kind, id)
            .await
            .map_err(LifecycleError::Read)?
            .map(PostDraft::edit)
            .ok_or_else(|| LifecycleError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    /// Persist a draft. On error nothing was written to the document store
    /// and the draft can be corrected and committed again.
    pub async fn commit(&self, draft: &PostDraft) -> Result<PostRecord, LifecycleError> {
        draft.validate()?;

        let kind = draft.kind();
        let post_id = draft.post_id();
        let plan = self.plan_uploads(draft)?;

        let mut uploaded = Uploaded::default();
        for upload in &plan {
            match self.media.put_key(&upload.key, upload.file).await {
                Ok(url) => uploaded.push(upload.slot, url),
                Err(e) => {
                    tracing::warn!(
                        post_id = %post_id,
                        kind = %kind,
                        key = %upload.key,
                        error = %e,
                        "Upload failed, aborting commit"
                    );
                    self.rollback(&uploaded).await;
                    return Err(LifecycleError::Upload(e));
                }
            }
        }

        let thumbnail_url = draft.final_thumbnail(uploaded.thumbnail.clone());
        let before_image_urls = draft.before.final_urls(uploaded.before.clone());
        let after_image_urls = draft.after.final_urls(uploaded.after.clone());

        let written = if draft.is_create() {
            let now = Utc::now();
            let post = PostRecord {
                id: post_id.to_string(),
                kind,
                title: draft.title.trim().to_string(),
                address: draft.address.trim().to_string(),
                thumbnail_url,
                before_image_urls,
                after_image_urls,
                created_at: now,
                updated_at: now,
            };
            let created = self.posts.create(&post).await;
            created.map(|_| post)
        } else {
            let patch = PostPatch {
                title: Some(draft.title.trim().to_string()),
                address: Some(draft.address.trim().to_string()),
                thumbnail_url: Some(thumbnail_url),
                before_image_urls: Some(before_image_urls),
                after_image_urls: Some(after_image_urls),
            };
            self.posts.patch(kind, post_id, &patch).await
        };

        let post = match written {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(post_id = %post_id, kind = %kind, error = %e, "Post write failed");
                self.rollback(&uploaded).await;
                return Err(e.into());
            }
        };

        let superseded = draft.superseded_urls();
        self.reconcile(&post, &superseded).await;

        tracing::info!(
            post_id = %post.id,
            kind = %kind,
            created = draft.is_create(),
            uploaded = plan.len(),
            removed = superseded.len(),
            "Committed post"
        );
        Ok(post)
    }

    /// Delete the document, then every object it referenced (best effort).
    pub async fn delete(&self, kind: Kind, id: &str) -> Result<PostRecord, LifecycleError> {
        let removed = self
            .posts
            .delete(kind, id)
            .await
            .map_err(LifecycleError::DocumentWrite)?
            .ok_or_else(|| LifecycleError::NotFound {
                kind,
                id: id.to_string(),
            })?;

        for url in removed.object_urls() {
            self.delete_quietly(url, &removed.id).await;
        }

        tracing::info!(post_id = %id, kind = %kind, "Deleted post");
        Ok(removed)
    }

    /// Resolve every staged file to a key that collides with nothing the
    /// original post references and nothing else uploaded in this commit.
    fn plan_uploads<'a>(
        &self,
        draft: &'a PostDraft,
    ) -> Result<Vec<PlannedUpload<'a>>, LifecycleError> {
        let mut taken: HashSet<String> = draft
            .original_urls()
            .filter_map(|url| self.media.key_for_url(url).ok())
            .collect();

        let thumbnail = match draft.thumbnail() {
            ThumbnailEdit::Replaced(file) => Some(file),
            _ => None,
        };
        let staged = thumbnail
            .into_iter()
            .map(|file| (Slot::Thumbnail, file))
            .chain(draft.before.staged().map(|file| (Slot::Before, file)))
            .chain(draft.after.staged().map(|file| (Slot::After, file)));

        let mut plan = Vec::new();
        for (slot, file) in staged {
            let key = unique_key(draft.kind(), draft.post_id(), slot, &file.file_name, &taken)
                .map_err(LifecycleError::Upload)?;
            taken.insert(key.clone());
            plan.push(PlannedUpload { slot, key, file });
        }
        Ok(plan)
    }

    async fn reconcile(&self, post: &PostRecord, superseded: &[String]) {
        let referenced: HashSet<&str> = post.object_urls().collect();
        for url in superseded {
            // Never delete what the committed document points at
            if referenced.contains(url.as_str()) {
                continue;
            }
            self.delete_quietly(url, &post.id).await;
        }
    }

    async fn rollback(&self, uploaded: &Uploaded) {
        for url in uploaded.urls() {
            if let Err(e) = self.media.delete(url).await {
                tracing::warn!(url = %url, error = %e, "Failed to roll back upload");
            }
        }
    }

    async fn delete_quietly(&self, url: &str, post_id: &str) {
        if let Err(e) = self.media.delete(url).await {
            tracing::warn!(post_id = %post_id, url = %url, error = %e, "Failed to delete object");
        }
    }
}

/// `{stem}-{n}.{ext}` variant of the file name until the key is free.
fn unique_key(
    kind: Kind,
    post_id: &str,
    slot: Slot,
    file_name: &str,
    taken: &HashSet<String>,
) -> Result<String, MediaError> {
    let key = object_key(kind, post_id, slot, file_name)?;
    if !taken.contains(&key) {
        return Ok(key);
    }

    let (stem, ext) = match key.rsplit_once('.') {
        Some((stem, ext)) if !stem.ends_with('/') && !ext.contains('/') => {
            (stem.to_string(), format!(".{ext}"))
        }
        _ => (key.clone(), String::new()),
    };

    let mut n = 1;
    loop {
        let candidate = format!("{stem}-{n}{ext}");
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}
