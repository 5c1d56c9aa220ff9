use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{sort_newest_first, Kind, PostPatch, PostRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // Post operations
    // ========================================================================

    /// Insert a new post. Returns `false` without writing if the key is taken.
    pub fn insert_post(&self, post: &PostRecord) -> Result<bool, DatabaseError> {
        debug_assert!(!post.id.is_empty(), "post id must not be empty");

        let key = post_key(post.kind, &post.id);
        let write_txn = self.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(POSTS)?;
            if table.get(key.as_str())?.is_some() {
                false
            } else {
                let data = rmp_serde::to_vec_named(post)?;
                table.insert(key.as_str(), data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Get a post by kind and id
    pub fn get_post(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        match table.get(post_key(kind, id).as_str())? {
            Some(data) => {
                let post: PostRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    /// All posts of a kind, newest first
    pub fn list_posts(&self, kind: Kind) -> Result<Vec<PostRecord>, DatabaseError> {
        let prefix = format!("{kind}/");
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        let mut posts = Vec::new();
        for result in table.range(prefix.as_str()..)? {
            let (key, value) = result?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let post: PostRecord = rmp_serde::from_slice(value.value())?;
            posts.push(post);
        }

        sort_newest_first(&mut posts);
        Ok(posts)
    }

    /// Merge `patch` into an existing post and bump `updated_at`.
    /// Returns `None` if the post does not exist.
    pub fn update_post(
        &self,
        kind: Kind,
        id: &str,
        patch: &PostPatch,
    ) -> Result<Option<PostRecord>, DatabaseError> {
        let key = post_key(kind, id);
        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(POSTS)?;
            let result = match table.get(key.as_str())? {
                Some(data) => Some(rmp_serde::from_slice::<PostRecord>(data.value())?),
                None => None,
            };
            result
        };

        let updated = match existing {
            Some(mut post) => {
                patch.apply(&mut post);
                post.updated_at = Utc::now();

                let serialized = rmp_serde::to_vec_named(&post)?;
                let mut table = write_txn.open_table(POSTS)?;
                table.insert(key.as_str(), serialized.as_slice())?;
                Some(post)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a post, returning the removed record
    pub fn delete_post(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, DatabaseError> {
        let key = post_key(kind, id);
        let write_txn = self.begin_write()?;

        let removed = {
            let mut table = write_txn.open_table(POSTS)?;
            let result = match table.remove(key.as_str())? {
                Some(data) => Some(rmp_serde::from_slice::<PostRecord>(data.value())?),
                None => None,
            };
            result
        };

        write_txn.commit()?;
        Ok(removed)
    }
}
