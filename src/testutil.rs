//! Shared test helpers for in-crate tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::storage::Database;
use crate::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            public_base_url: "http://gallery.test".to_string(),
        },
        storage: StorageConfig::default(),
        admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
        feed_per_kind: 6,
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(&files_dir).expect("Failed to create test object store");

    Arc::new(AppState::new(config, db, Arc::new(object_store)))
}
