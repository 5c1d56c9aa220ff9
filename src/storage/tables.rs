use redb::TableDefinition;

/// Post records: "{kind}/{id}" -> PostRecord (msgpack)
pub const POSTS: TableDefinition<&str, &[u8]> = TableDefinition::new("posts");

/// Build the POSTS key for a post.
pub fn post_key(kind: super::models::Kind, id: &str) -> String {
    format!("{kind}/{id}")
}
