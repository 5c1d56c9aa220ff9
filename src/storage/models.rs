use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level partition of posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Commerce,
    Residence,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Commerce => "commerce",
            Kind::Residence => "residence",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commerce" => Ok(Kind::Commerce),
            "residence" => Ok(Kind::Residence),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// A post record stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: String,
    pub kind: Kind,
    pub title: String,
    pub address: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub before_image_urls: Vec<String>,
    #[serde(default)]
    pub after_image_urls: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl PostRecord {
    /// Every object URL the post references, thumbnail first.
    pub fn object_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.thumbnail_url.as_str())
            .chain(self.before_image_urls.iter().map(String::as_str))
            .chain(self.after_image_urls.iter().map(String::as_str))
            .filter(|url| !url.is_empty())
    }
}

/// Partial update merged into an existing post. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub address: Option<String>,
    pub thumbnail_url: Option<String>,
    pub before_image_urls: Option<Vec<String>>,
    pub after_image_urls: Option<Vec<String>>,
}

impl PostPatch {
    pub fn apply(&self, post: &mut PostRecord) {
        if let Some(ref title) = self.title {
            post.title = title.clone();
        }
        if let Some(ref address) = self.address {
            post.address = address.clone();
        }
        if let Some(ref thumbnail_url) = self.thumbnail_url {
            post.thumbnail_url = thumbnail_url.clone();
        }
        if let Some(ref urls) = self.before_image_urls {
            post.before_image_urls = urls.clone();
        }
        if let Some(ref urls) = self.after_image_urls {
            post.after_image_urls = urls.clone();
        }
    }
}

/// Newest first; ties fall back to id so listings are deterministic.
pub fn sort_newest_first(posts: &mut [PostRecord]) {
    posts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
