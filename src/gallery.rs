//! Read-only access to posts for public pages.

use std::sync::Arc;

use crate::storage::models::{sort_newest_first, Kind, PostRecord};
use crate::storage::{PostRepository, RepositoryError};

#[derive(Clone)]
pub struct Gallery {
    posts: Arc<dyn PostRepository>,
}

impl Gallery {
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }

    pub async fn list(&self, kind: Kind) -> Result<Vec<PostRecord>, RepositoryError> {
        self.posts.list(kind).await
    }

    pub async fn list_recent(
        &self,
        kind: Kind,
        limit: usize,
    ) -> Result<Vec<PostRecord>, RepositoryError> {
        self.posts.list_recent(kind, limit).await
    }

    pub async fn get(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, RepositoryError> {
        self.posts.get(kind, id).await
    }

    /// The `per_kind` newest posts of every kind, merged newest first.
    /// Each record carries its own kind.
    pub async fn home_feed(&self, per_kind: usize) -> Result<Vec<PostRecord>, RepositoryError> {
        let (residence, commerce) = tokio::try_join!(
            self.posts.list_recent(Kind::Residence, per_kind),
            self.posts.list_recent(Kind::Commerce, per_kind),
        )?;

        let mut feed: Vec<PostRecord> = residence.into_iter().chain(commerce).collect();
        sort_newest_first(&mut feed);
        Ok(feed)
    }
}
