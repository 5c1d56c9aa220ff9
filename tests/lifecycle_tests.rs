mod common;

use common::{image, Event, Harness, BASE_URL};
use gallery_cms::lifecycle::{LifecycleError, PostDraft, ValidationError};
use gallery_cms::storage::models::{Kind, PostRecord};
use gallery_cms::storage::PostRepository;

fn key_of(kind: Kind, id: &str, slot: &str, name: &str) -> String {
    format!("{kind}/{id}/{slot}/{name}")
}

fn position(events: &[Event], wanted: &Event) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not in {events:?}"))
}

async fn create_sample(h: &Harness) -> PostRecord {
    let mut draft = PostDraft::create(Kind::Residence);
    draft.title = "Hannam apartment".to_string();
    draft.address = "Seoul, Yongsan-gu".to_string();
    draft.replace_thumbnail(image("cover.jpg"));
    draft.before.stage(image("b1.jpg"));
    draft.before.stage(image("b2.jpg"));
    draft.after.stage(image("a1.jpg"));
    h.lifecycle.commit(&draft).await.unwrap()
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_uploads_in_slot_order_before_writing() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    let id = post.id.as_str();

    assert_eq!(
        h.events(),
        vec![
            Event::Put(key_of(Kind::Residence, id, "thumbnail", "cover.jpg")),
            Event::Put(key_of(Kind::Residence, id, "before", "b1.jpg")),
            Event::Put(key_of(Kind::Residence, id, "before", "b2.jpg")),
            Event::Put(key_of(Kind::Residence, id, "after", "a1.jpg")),
            Event::CreateDoc(id.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_create_persists_issued_urls() {
    let h = Harness::new();
    let post = create_sample(&h).await;

    assert_eq!(post.kind, Kind::Residence);
    assert_eq!(post.created_at, post.updated_at);
    assert_eq!(
        post.thumbnail_url,
        format!(
            "{BASE_URL}/o/residence%2F{}%2Fthumbnail%2Fcover.jpg?alt=media",
            post.id
        )
    );
    assert_eq!(post.before_image_urls.len(), 2);
    assert!(post.before_image_urls[0].contains("b1.jpg"));
    assert!(post.before_image_urls[1].contains("b2.jpg"));
    assert_eq!(post.after_image_urls.len(), 1);

    let stored = h
        .repo
        .get(Kind::Residence, &post.id)
        .await
        .unwrap()
        .expect("post should be stored");
    assert_eq!(stored, post);
    h.assert_no_dangling(&stored).await;
}

#[tokio::test]
async fn test_create_trims_text_fields() {
    let h = Harness::new();
    let mut draft = PostDraft::create(Kind::Commerce);
    draft.title = "  Cafe Onion  ".to_string();
    draft.address = "\tSeoul ".to_string();
    draft.replace_thumbnail(image("cover.png"));

    let post = h.lifecycle.commit(&draft).await.unwrap();
    assert_eq!(post.title, "Cafe Onion");
    assert_eq!(post.address, "Seoul");
}

#[tokio::test]
async fn test_duplicate_file_names_get_distinct_keys() {
    let h = Harness::new();
    let mut draft = PostDraft::create(Kind::Commerce);
    draft.title = "Bakery".to_string();
    draft.address = "Busan".to_string();
    draft.replace_thumbnail(image("photo.jpg"));
    draft.before.stage(image("photo.jpg"));
    draft.before.stage(image("photo.jpg"));

    let post = h.lifecycle.commit(&draft).await.unwrap();
    let id = post.id.as_str();

    assert_eq!(
        h.store.keys(),
        vec![
            key_of(Kind::Commerce, id, "before", "photo-1.jpg"),
            key_of(Kind::Commerce, id, "before", "photo.jpg"),
            key_of(Kind::Commerce, id, "thumbnail", "photo.jpg"),
        ]
    );
    assert_ne!(post.before_image_urls[0], post.before_image_urls[1]);
    h.assert_no_dangling(&post).await;
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validation_failure_touches_nothing() {
    let h = Harness::new();

    let mut draft = PostDraft::create(Kind::Residence);
    draft.title = "No cover".to_string();
    draft.address = "Seoul".to_string();
    draft.before.stage(image("b1.jpg"));

    let err = h.lifecycle.commit(&draft).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Validation(ValidationError::MissingThumbnail)
    ));

    let mut draft = PostDraft::create(Kind::Residence);
    draft.title = "   ".to_string();
    draft.address = "Seoul".to_string();
    draft.replace_thumbnail(image("cover.jpg"));

    let err = h.lifecycle.commit(&draft).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Validation(ValidationError::MissingTitle)
    ));

    assert!(h.events().is_empty());
    assert!(h.store.keys().is_empty());
}

#[tokio::test]
async fn test_edit_cannot_drop_thumbnail_without_replacement() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    h.clear_events();

    let mut draft = h.lifecycle.open(Kind::Residence, &post.id).await.unwrap();
    draft.remove_thumbnail();
    draft.address.clear();

    let err = h.lifecycle.commit(&draft).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
    assert!(h.events().is_empty());
}

// ============================================================================
// Edit
// ============================================================================

#[tokio::test]
async fn test_edit_writes_before_deleting_superseded() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    let id = post.id.clone();
    h.clear_events();

    let old_thumbnail_key = key_of(Kind::Residence, &id, "thumbnail", "cover.jpg");
    let removed_url = post.before_image_urls[0].clone();

    let mut draft = h.lifecycle.open(Kind::Residence, &id).await.unwrap();
    draft.replace_thumbnail(image("cover.jpg"));
    assert!(draft.before.mark_removed(&removed_url));
    draft.after.stage(image("a2.jpg"));

    let updated = h.lifecycle.commit(&draft).await.unwrap();
    let events = h.events();

    let new_thumbnail = Event::Put(key_of(Kind::Residence, &id, "thumbnail", "cover-1.jpg"));
    let new_after = Event::Put(key_of(Kind::Residence, &id, "after", "a2.jpg"));
    let patch = Event::PatchDoc(id.clone());
    let drop_thumbnail = Event::DeleteObject(old_thumbnail_key.clone());
    let drop_before = Event::DeleteObject(key_of(Kind::Residence, &id, "before", "b1.jpg"));

    assert_eq!(events.len(), 5, "{events:?}");
    assert!(position(&events, &new_thumbnail) < position(&events, &new_after));
    assert!(position(&events, &new_after) < position(&events, &patch));
    assert!(position(&events, &patch) < position(&events, &drop_thumbnail));
    assert!(position(&events, &patch) < position(&events, &drop_before));

    assert!(!h.store.contains(&old_thumbnail_key));
    assert_eq!(updated.created_at, post.created_at);
    assert!(updated.updated_at >= post.updated_at);
    h.assert_no_dangling(&updated).await;
}

#[tokio::test]
async fn test_edit_keeps_original_order_then_appends() {
    let h = Harness::new();
    let post = create_sample(&h).await;

    let mut draft = h.lifecycle.open(Kind::Residence, &post.id).await.unwrap();
    draft.before.stage(image("b3.jpg"));
    draft.before.stage(image("b4.jpg"));

    let updated = h.lifecycle.commit(&draft).await.unwrap();
    assert_eq!(updated.before_image_urls.len(), 4);
    assert_eq!(updated.before_image_urls[..2], post.before_image_urls[..]);
    assert!(updated.before_image_urls[2].contains("b3.jpg"));
    assert!(updated.before_image_urls[3].contains("b4.jpg"));
    assert_eq!(updated.after_image_urls, post.after_image_urls);
    assert_eq!(updated.thumbnail_url, post.thumbnail_url);
}

#[tokio::test]
async fn test_discarded_staging_makes_no_storage_calls() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    h.clear_events();

    let mut draft = h.lifecycle.open(Kind::Residence, &post.id).await.unwrap();
    let staged = draft.before.stage(image("b3.jpg"));
    assert!(draft.before.unstage(staged));
    let url = post.after_image_urls[0].clone();
    assert!(draft.after.mark_removed(&url));
    assert!(draft.after.restore(&url));
    draft.replace_thumbnail(image("other.jpg"));
    draft.reset_thumbnail();
    draft.title = "Renamed".to_string();

    let updated = h.lifecycle.commit(&draft).await.unwrap();

    assert_eq!(h.events(), vec![Event::PatchDoc(post.id.clone())]);
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.before_image_urls, post.before_image_urls);
    assert_eq!(updated.after_image_urls, post.after_image_urls);
}

#[tokio::test]
async fn test_cleanup_failure_does_not_fail_commit() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    h.store.fail_deletes(true);

    let removed_url = post.after_image_urls[0].clone();
    let mut draft = h.lifecycle.open(Kind::Residence, &post.id).await.unwrap();
    assert!(draft.after.mark_removed(&removed_url));

    let updated = h.lifecycle.commit(&draft).await.unwrap();
    assert!(updated.after_image_urls.is_empty());

    let stored = h.repo.get(Kind::Residence, &post.id).await.unwrap().unwrap();
    assert!(stored.after_image_urls.is_empty());

    // The orphan is left behind, never a dangling reference
    assert!(h
        .store
        .contains(&key_of(Kind::Residence, &post.id, "after", "a1.jpg")));
    assert!(h
        .events()
        .contains(&Event::DeleteObject(key_of(Kind::Residence, &post.id, "after", "a1.jpg"))));
}

#[tokio::test]
async fn test_open_missing_post() {
    let h = Harness::new();
    let err = h
        .lifecycle
        .open(Kind::Commerce, "does-not-exist")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
}

#[tokio::test]
async fn test_edit_of_post_deleted_meanwhile_rolls_back() {
    let h = Harness::new();
    let post = create_sample(&h).await;

    let mut draft = h.lifecycle.open(Kind::Residence, &post.id).await.unwrap();
    draft.before.stage(image("late.jpg"));

    h.lifecycle.delete(Kind::Residence, &post.id).await.unwrap();

    let err = h.lifecycle.commit(&draft).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
    assert!(h.store.keys().is_empty());
}

// ============================================================================
// Rollback
// ============================================================================

#[tokio::test]
async fn test_upload_failure_rolls_back_this_attempt() {
    let h = Harness::new();
    h.store.fail_puts_containing("/after/");

    let mut draft = PostDraft::create(Kind::Residence);
    draft.title = "Partial".to_string();
    draft.address = "Seoul".to_string();
    draft.replace_thumbnail(image("cover.jpg"));
    draft.before.stage(image("b1.jpg"));
    draft.after.stage(image("a1.jpg"));

    let err = h.lifecycle.commit(&draft).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Upload(_)));

    let id = draft.post_id().to_string();
    assert_eq!(
        h.events(),
        vec![
            Event::Put(key_of(Kind::Residence, &id, "thumbnail", "cover.jpg")),
            Event::Put(key_of(Kind::Residence, &id, "before", "b1.jpg")),
            Event::DeleteObject(key_of(Kind::Residence, &id, "thumbnail", "cover.jpg")),
            Event::DeleteObject(key_of(Kind::Residence, &id, "before", "b1.jpg")),
        ]
    );
    assert!(h.store.keys().is_empty());
    assert!(h.repo.get(Kind::Residence, &id).await.unwrap().is_none());

    // The same draft commits once the store recovers
    h.store.allow_puts();
    let post = h.lifecycle.commit(&draft).await.unwrap();
    assert_eq!(post.id, id);
    h.assert_no_dangling(&post).await;
}

#[tokio::test]
async fn test_write_failure_rolls_back_uploads() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    let original_keys = h.store.keys();
    h.repo.fail_writes(true);

    let mut draft = h.lifecycle.open(Kind::Residence, &post.id).await.unwrap();
    draft.replace_thumbnail(image("new-cover.jpg"));
    assert!(draft.before.mark_removed(&post.before_image_urls[1]));

    let err = h.lifecycle.commit(&draft).await.unwrap_err();
    assert!(matches!(err, LifecycleError::DocumentWrite(_)));

    // Originals untouched, the new upload gone
    assert_eq!(h.store.keys(), original_keys);
    let stored = h.repo.get(Kind::Residence, &post.id).await.unwrap().unwrap();
    assert_eq!(stored, post);
    h.assert_no_dangling(&stored).await;
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_removes_document_then_objects() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    h.clear_events();

    let removed = h.lifecycle.delete(Kind::Residence, &post.id).await.unwrap();
    assert_eq!(removed.id, post.id);

    let events = h.events();
    assert_eq!(events[0], Event::DeleteDoc(post.id.clone()));
    assert_eq!(events.len(), 5);
    assert!(events[1..]
        .iter()
        .all(|e| matches!(e, Event::DeleteObject(_))));

    assert!(h.store.keys().is_empty());
    assert!(h.repo.get(Kind::Residence, &post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_survives_object_failures() {
    let h = Harness::new();
    let post = create_sample(&h).await;
    h.store.fail_deletes(true);

    h.lifecycle.delete(Kind::Residence, &post.id).await.unwrap();
    assert!(h.repo.get(Kind::Residence, &post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_missing_post() {
    let h = Harness::new();
    let err = h
        .lifecycle
        .delete(Kind::Residence, "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
    assert_eq!(h.events(), vec![Event::DeleteDoc("missing".to_string())]);
}
