use thiserror::Error;

use crate::media::StagedFile;
use crate::storage::models::{Kind, PostRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    MissingTitle,
    #[error("address must not be empty")]
    MissingAddress,
    #[error("a thumbnail is required")]
    MissingThumbnail,
}

/// Handle for a file staged in an [`ImageSlotDraft`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StagedId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailEdit {
    Unchanged,
    Replaced(StagedFile),
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
struct ExistingImage {
    url: String,
    removed: bool,
}

/// Staged state of one ordered image slot: the URLs the post already has,
/// each kept or marked for removal, plus newly picked files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSlotDraft {
    existing: Vec<ExistingImage>,
    staged: Vec<(StagedId, StagedFile)>,
    next_id: u64,
}

impl ImageSlotDraft {
    pub fn from_urls(urls: &[String]) -> Self {
        Self {
            existing: urls
                .iter()
                .map(|url| ExistingImage {
                    url: url.clone(),
                    removed: false,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn stage(&mut self, file: StagedFile) -> StagedId {
        let id = StagedId(self.next_id);
        self.next_id += 1;
        self.staged.push((id, file));
        id
    }

    /// Drop a staged file. Returns `false` if it was not staged.
    pub fn unstage(&mut self, id: StagedId) -> bool {
        let before = self.staged.len();
        self.staged.retain(|(staged_id, _)| *staged_id != id);
        self.staged.len() != before
    }

    /// Mark an existing URL for deletion on the next successful commit.
    pub fn mark_removed(&mut self, url: &str) -> bool {
        self.set_removed(url, true)
    }

    pub fn restore(&mut self, url: &str) -> bool {
        self.set_removed(url, false)
    }

    fn set_removed(&mut self, url: &str, removed: bool) -> bool {
        match self.existing.iter_mut().find(|image| image.url == url) {
            Some(image) => {
                image.removed = removed;
                true
            }
            None => false,
        }
    }

    pub fn kept_urls(&self) -> impl Iterator<Item = &str> {
        self.existing
            .iter()
            .filter(|image| !image.removed)
            .map(|image| image.url.as_str())
    }

    pub fn removed_urls(&self) -> impl Iterator<Item = &str> {
        self.existing
            .iter()
            .filter(|image| image.removed)
            .map(|image| image.url.as_str())
    }

    /// Staged files in selection order
    pub fn staged(&self) -> impl Iterator<Item = &StagedFile> {
        self.staged.iter().map(|(_, file)| file)
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Kept originals in their original order, then `uploaded` in upload order.
    pub fn final_urls(&self, uploaded: Vec<String>) -> Vec<String> {
        self.kept_urls()
            .map(str::to_string)
            .chain(uploaded)
            .collect()
    }
}

/// An in-progress create or edit of a post. All mutations are local until
/// the draft is committed by [`super::PostLifecycle::commit`].
#[derive(Debug, Clone)]
pub struct PostDraft {
    kind: Kind,
    post_id: String,
    original: Option<PostRecord>,
    pub title: String,
    pub address: String,
    thumbnail: ThumbnailEdit,
    pub before: ImageSlotDraft,
    pub after: ImageSlotDraft,
}

impl PostDraft {
    /// Empty draft for a new post with a fresh id.
    pub fn create(kind: Kind) -> Self {
        Self {
            kind,
            post_id: uuid::Uuid::new_v4().to_string(),
            original: None,
            title: String::new(),
            address: String::new(),
            thumbnail: ThumbnailEdit::Unchanged,
            before: ImageSlotDraft::default(),
            after: ImageSlotDraft::default(),
        }
    }

    /// Draft seeded from a stored post.
    pub fn edit(original: PostRecord) -> Self {
        Self {
            kind: original.kind,
            post_id: original.id.clone(),
            title: original.title.clone(),
            address: original.address.clone(),
            thumbnail: ThumbnailEdit::Unchanged,
            before: ImageSlotDraft::from_urls(&original.before_image_urls),
            after: ImageSlotDraft::from_urls(&original.after_image_urls),
            original: Some(original),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn is_create(&self) -> bool {
        self.original.is_none()
    }

    pub fn thumbnail(&self) -> &ThumbnailEdit {
        &self.thumbnail
    }

    pub fn replace_thumbnail(&mut self, file: StagedFile) {
        self.thumbnail = ThumbnailEdit::Replaced(file);
    }

    pub fn remove_thumbnail(&mut self) {
        self.thumbnail = ThumbnailEdit::Removed;
    }

    /// Discard any staged thumbnail change.
    pub fn reset_thumbnail(&mut self) {
        self.thumbnail = ThumbnailEdit::Unchanged;
    }

    fn original_thumbnail(&self) -> Option<&str> {
        self.original
            .as_ref()
            .map(|post| post.thumbnail_url.as_str())
            .filter(|url| !url.is_empty())
    }

    pub fn has_thumbnail(&self) -> bool {
        match self.thumbnail {
            ThumbnailEdit::Replaced(_) => true,
            ThumbnailEdit::Removed => false,
            ThumbnailEdit::Unchanged => self.original_thumbnail().is_some(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.address.trim().is_empty() {
            return Err(ValidationError::MissingAddress);
        }
        if !self.has_thumbnail() {
            return Err(ValidationError::MissingThumbnail);
        }
        Ok(())
    }

    /// Thumbnail URL after commit given the URL of an uploaded replacement.
    pub fn final_thumbnail(&self, uploaded: Option<String>) -> String {
        match self.thumbnail {
            ThumbnailEdit::Replaced(_) => uploaded.unwrap_or_default(),
            ThumbnailEdit::Removed => String::new(),
            ThumbnailEdit::Unchanged => self.original_thumbnail().unwrap_or_default().to_string(),
        }
    }

    /// Original URLs the committed post no longer references.
    pub fn superseded_urls(&self) -> Vec<String> {
        let old_thumbnail = match self.thumbnail {
            ThumbnailEdit::Unchanged => None,
            ThumbnailEdit::Replaced(_) | ThumbnailEdit::Removed => self.original_thumbnail(),
        };

        old_thumbnail
            .into_iter()
            .chain(self.before.removed_urls())
            .chain(self.after.removed_urls())
            .map(str::to_string)
            .collect()
    }

    /// Every URL the original post references, whether kept or not.
    pub fn original_urls(&self) -> impl Iterator<Item = &str> {
        self.original
            .iter()
            .flat_map(|post| post.object_urls())
    }
}
