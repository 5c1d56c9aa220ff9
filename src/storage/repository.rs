use async_trait::async_trait;
use thiserror::Error;

use super::db::{Database, DatabaseError};
use super::models::{Kind, PostPatch, PostRecord};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Post {kind}/{id} already exists")]
    AlreadyExists { kind: Kind, id: String },
    #[error("Post {kind}/{id} not found")]
    NotFound { kind: Kind, id: String },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Document store seen by the lifecycle coordinator and the gallery reader.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &PostRecord) -> Result<(), RepositoryError>;
    async fn get(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, RepositoryError>;
    /// All posts of `kind`, `created_at` descending.
    async fn list(&self, kind: Kind) -> Result<Vec<PostRecord>, RepositoryError>;
    /// First `limit` posts of `kind` in `list` order.
    async fn list_recent(&self, kind: Kind, limit: usize)
        -> Result<Vec<PostRecord>, RepositoryError>;
    /// Merge `patch` and set `updated_at` to now.
    async fn patch(
        &self,
        kind: Kind,
        id: &str,
        patch: &PostPatch,
    ) -> Result<PostRecord, RepositoryError>;
    async fn delete(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, RepositoryError>;
}

#[async_trait]
impl PostRepository for Database {
    async fn create(&self, post: &PostRecord) -> Result<(), RepositoryError> {
        if self.insert_post(post)? {
            Ok(())
        } else {
            Err(RepositoryError::AlreadyExists {
                kind: post.kind,
                id: post.id.clone(),
            })
        }
    }

    async fn get(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, RepositoryError> {
        Ok(self.get_post(kind, id)?)
    }

    async fn list(&self, kind: Kind) -> Result<Vec<PostRecord>, RepositoryError> {
        Ok(self.list_posts(kind)?)
    }

    async fn list_recent(
        &self,
        kind: Kind,
        limit: usize,
    ) -> Result<Vec<PostRecord>, RepositoryError> {
        let mut posts = self.list_posts(kind)?;
        posts.truncate(limit);
        Ok(posts)
    }

    async fn patch(
        &self,
        kind: Kind,
        id: &str,
        patch: &PostPatch,
    ) -> Result<PostRecord, RepositoryError> {
        self.update_post(kind, id, patch)?
            .ok_or_else(|| RepositoryError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    async fn delete(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, RepositoryError> {
        Ok(self.delete_post(kind, id)?)
    }
}
