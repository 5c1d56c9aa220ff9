//! gallery-cms - Post galleries with a single-admin content editor
//!
//! This crate provides:
//! - Posts partitioned by kind (residence, commerce) stored in redb
//! - Swappable object storage backends (local filesystem, GCS) for post images
//! - A lifecycle coordinator that keeps documents and stored objects in sync
//! - REST API with public gallery reads and token-gated multipart editing

pub mod api;
pub mod config;
pub mod gallery;
pub mod lifecycle;
pub mod media;
pub mod object_store;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use gallery::Gallery;
use lifecycle::PostLifecycle;
use media::MediaStore;
use object_store::{ObjectStore, ObjectUrls};
use storage::{Database, PostRepository};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn ObjectStore>,
    pub gallery: Gallery,
    pub lifecycle: PostLifecycle,
}

impl AppState {
    pub fn new(config: Config, db: Database, object_store: Arc<dyn ObjectStore>) -> Self {
        let posts: Arc<dyn PostRepository> = Arc::new(db.clone());
        let media = MediaStore::new(
            Arc::clone(&object_store),
            ObjectUrls::new(config.node.public_base_url.clone()),
        );

        Self {
            gallery: Gallery::new(Arc::clone(&posts)),
            lifecycle: PostLifecycle::new(posts, media),
            config,
            db,
            object_store,
        }
    }
}
