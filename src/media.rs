//! Post-scoped access to the object store.
//!
//! Objects live under `{kind}/{post_id}/{slot}/{file_name}` and are handed
//! out as retrieval URLs (see [`ObjectUrls`]). Deletion goes through the URL
//! so callers only ever hold what they persisted.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object_store::{ObjectStore, ObjectStoreError, ObjectUrls};
use crate::storage::models::Kind;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid file name: '{0}'")]
    InvalidFileName(String),
    #[error("Not an object URL: {0}")]
    InvalidUrl(String),
    #[error("Upload of '{key}' failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: ObjectStoreError,
    },
    #[error("Delete of '{key}' failed: {source}")]
    Delete {
        key: String,
        #[source]
        source: ObjectStoreError,
    },
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

/// Named image role within a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Thumbnail,
    Before,
    After,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Thumbnail => "thumbnail",
            Slot::Before => "before",
            Slot::After => "after",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local file picked for upload but not yet stored
#[derive(Clone, PartialEq)]
pub struct StagedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl StagedFile {
    /// Content type falls back to a guess from the file name.
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        let file_name = file_name.into();
        let content_type = content_type
            .filter(|ct| ct != "application/octet-stream")
            .or_else(|| mime_guess::from_path(&file_name).first().map(|m| m.to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Self {
            file_name,
            content_type,
            data,
        }
    }
}

impl fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("byte_size", &self.data.len())
            .finish()
    }
}

/// Reduce a client-supplied file name to its final path segment.
pub fn sanitize_file_name(raw: &str) -> Result<String, MediaError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        return Err(MediaError::InvalidFileName(raw.to_string()));
    }
    Ok(name.to_string())
}

pub fn object_key(
    kind: Kind,
    post_id: &str,
    slot: Slot,
    file_name: &str,
) -> Result<String, MediaError> {
    let file_name = sanitize_file_name(file_name)?;
    Ok(format!("{kind}/{post_id}/{slot}/{file_name}"))
}

#[derive(Clone)]
pub struct MediaStore {
    store: Arc<dyn ObjectStore>,
    urls: ObjectUrls,
}

impl MediaStore {
    pub fn new(store: Arc<dyn ObjectStore>, urls: ObjectUrls) -> Self {
        Self { store, urls }
    }

    /// Store `file` under `key` and return its retrieval URL.
    pub async fn put_key(&self, key: &str, file: &StagedFile) -> Result<String, MediaError> {
        self.store
            .put(key, file.data.clone(), &file.content_type)
            .await
            .map_err(|source| MediaError::Upload {
                key: key.to_string(),
                source,
            })?;

        tracing::debug!(key = %key, bytes = file.data.len(), "Stored object");
        Ok(self.urls.url_for(key))
    }

    /// Remove the object behind a previously issued URL. Missing objects are fine.
    pub async fn delete(&self, url: &str) -> Result<(), MediaError> {
        let key = self.key_for_url(url)?;
        self.store
            .delete(&key)
            .await
            .map_err(|source| MediaError::Delete {
                key: key.clone(),
                source,
            })?;

        tracing::debug!(key = %key, "Deleted object");
        Ok(())
    }

    pub async fn exists(&self, url: &str) -> Result<bool, MediaError> {
        let key = self.key_for_url(url)?;
        Ok(self.store.exists(&key).await?)
    }

    pub fn key_for_url(&self, url: &str) -> Result<String, MediaError> {
        self.urls
            .key_for(url)
            .map_err(|_| MediaError::InvalidUrl(url.to_string()))
    }
}
