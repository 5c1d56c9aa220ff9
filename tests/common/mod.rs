//! Instrumented stores shared by the lifecycle and gallery tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use gallery_cms::lifecycle::PostLifecycle;
use gallery_cms::media::{MediaStore, StagedFile};
use gallery_cms::object_store::{ObjectStore, ObjectStoreError, ObjectUrls};
use gallery_cms::storage::models::{Kind, PostPatch, PostRecord};
use gallery_cms::storage::{Database, DatabaseError, PostRepository, RepositoryError};

pub const BASE_URL: &str = "http://gallery.test";

/// One externally visible storage call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Put(String),
    DeleteObject(String),
    CreateDoc(String),
    PatchDoc(String),
    DeleteDoc(String),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// In-memory object store that records every mutation.
pub struct RecordingStore {
    objects: Mutex<HashMap<String, Bytes>>,
    log: EventLog,
    fail_put_containing: Mutex<Option<String>>,
    fail_deletes: AtomicBool,
}

impl RecordingStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            log,
            fail_put_containing: Mutex::new(None),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Fail any put whose key contains `fragment`.
    pub fn fail_puts_containing(&self, fragment: &str) {
        *self.fail_put_containing.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn allow_puts(&self) {
        *self.fail_put_containing.lock().unwrap() = None;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        if let Some(fragment) = self.fail_put_containing.lock().unwrap().as_deref() {
            if key.contains(fragment) {
                return Err(ObjectStoreError::Backend(format!("injected put failure: {key}")));
            }
        }
        self.log.lock().unwrap().push(Event::Put(key.to_string()));
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.log
            .lock()
            .unwrap()
            .push(Event::DeleteObject(key.to_string()));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend(format!("injected delete failure: {key}")));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.contains(key))
    }
}

/// redb-backed repository that records writes and can refuse them.
pub struct RecordingRepo {
    db: Database,
    log: EventLog,
    fail_writes: AtomicBool,
}

impl RecordingRepo {
    pub fn new(db: Database, log: EventLog) -> Self {
        Self {
            db,
            log,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(DatabaseError::Io(
                std::io::Error::other("injected write failure"),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for RecordingRepo {
    async fn create(&self, post: &PostRecord) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.log
            .lock()
            .unwrap()
            .push(Event::CreateDoc(post.id.clone()));
        self.db.create(post).await
    }

    async fn get(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, RepositoryError> {
        self.db.get(kind, id).await
    }

    async fn list(&self, kind: Kind) -> Result<Vec<PostRecord>, RepositoryError> {
        self.db.list(kind).await
    }

    async fn list_recent(
        &self,
        kind: Kind,
        limit: usize,
    ) -> Result<Vec<PostRecord>, RepositoryError> {
        self.db.list_recent(kind, limit).await
    }

    async fn patch(
        &self,
        kind: Kind,
        id: &str,
        patch: &PostPatch,
    ) -> Result<PostRecord, RepositoryError> {
        self.check_writable()?;
        self.log.lock().unwrap().push(Event::PatchDoc(id.to_string()));
        self.db.patch(kind, id, patch).await
    }

    async fn delete(&self, kind: Kind, id: &str) -> Result<Option<PostRecord>, RepositoryError> {
        self.check_writable()?;
        self.log
            .lock()
            .unwrap()
            .push(Event::DeleteDoc(id.to_string()));
        self.db.delete(kind, id).await
    }
}

/// Lifecycle wired to instrumented stores sharing one event log.
pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub log: EventLog,
    pub store: Arc<RecordingStore>,
    pub repo: Arc<RecordingRepo>,
    pub media: MediaStore,
    pub lifecycle: PostLifecycle,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("data")).unwrap();
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));

        let store = Arc::new(RecordingStore::new(Arc::clone(&log)));
        let repo = Arc::new(RecordingRepo::new(db, Arc::clone(&log)));
        let media = MediaStore::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            ObjectUrls::new(BASE_URL),
        );
        let lifecycle = PostLifecycle::new(
            Arc::clone(&repo) as Arc<dyn PostRepository>,
            media.clone(),
        );

        Self {
            _dir: dir,
            log,
            store,
            repo,
            media,
            lifecycle,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Every referenced URL of `post` resolves to a stored object.
    pub async fn assert_no_dangling(&self, post: &PostRecord) {
        for url in post.object_urls() {
            assert!(self.media.exists(url).await.unwrap(), "dangling reference: {url}");
        }
    }
}

pub fn image(name: &str) -> StagedFile {
    StagedFile::new(name, None, Bytes::from(format!("bytes of {name}")))
}

/// A stored post record with fixed timestamps, for reader tests.
pub fn post_at(kind: Kind, id: &str, created_ms: i64) -> PostRecord {
    let created = Utc.timestamp_millis_opt(created_ms).unwrap();
    PostRecord {
        id: id.to_string(),
        kind,
        title: format!("Post {id}"),
        address: "Seoul".to_string(),
        thumbnail_url: format!("{BASE_URL}/o/{kind}%2F{id}%2Fthumbnail%2Fa.jpg?alt=media"),
        before_image_urls: vec![],
        after_image_urls: vec![],
        created_at: created,
        updated_at: created,
    }
}
