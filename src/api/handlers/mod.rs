mod admin;
mod editor;
mod objects;
mod posts;

use crate::api::response::ApiError;
use crate::storage::models::Kind;

pub use admin::{admin_purge, health};
pub use editor::{create_post, delete_post, update_post};
pub use objects::serve_object;
pub use posts::{get_post, home_feed, list_posts};

/// Unknown kinds are treated like unknown routes.
fn parse_kind(raw: &str) -> Result<Kind, ApiError> {
    raw.parse()
        .map_err(|e: crate::storage::models::UnknownKind| ApiError::not_found(e.to_string()))
}
