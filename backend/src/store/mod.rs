//! # Article Store
//!
//! Record-oriented persistence for articles, backed by one document and a
//! directory of companion image files.
//!
//! Every operation reads the whole document fresh from its backend, mutates
//! the in-memory list and writes the whole document back. Nothing is cached
//! between calls. Mutating sequences are serialized by a per-store mutex, so
//! two requests handled by the same process cannot both read the same
//! snapshot and clobber each other's write. Separate processes sharing one
//! data file are not coordinated.
//!
//! ## Asset ordering
//!
//! - New images are written to the uploads directory *before* the document
//!   references them.
//! - Replaced or deleted images are removed *after* the document stops
//!   referencing them. Removal is best-effort: failures are logged and the
//!   operation still succeeds.
//!
//! A crash between the two steps can leave an unreferenced file behind;
//! `sweep_orphans` collects those.
//!
//! All methods block on file I/O. Async callers go through
//! `actix_web::web::block` or `tokio::task::spawn_blocking`.

mod assets;
mod document;

pub use assets::{is_image_type, AssetDir, Upload, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PUBLIC_PREFIX};
pub use document::{DocumentBackend, JsonFileBackend, MemoryBackend};

use crate::error::{Result, StoreError};
use chrono::{DateTime, Duration, Utc};
use cms_common::model::article::{Article, ArticleDocument};
use cms_common::model::timestamp;
use cms_common::requests::{ArticlePatch, NewArticle};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Outcome of one orphan sweep over the uploads directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files found in the uploads directory.
    pub scanned: usize,
    /// Unreferenced files that were deleted.
    pub removed: usize,
    /// Unreferenced files that could not be deleted.
    pub failed: usize,
}

/// The article store. Cheap to clone; clones share the same lock.
#[derive(Clone)]
pub struct ArticleStore {
    backend: Arc<dyn DocumentBackend>,
    assets: AssetDir,
    lock: Arc<Mutex<()>>,
}

impl ArticleStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, assets: AssetDir) -> Self {
        Self {
            backend,
            assets,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn assets(&self) -> &AssetDir {
        &self.assets
    }

    fn serialized(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns every article in stored order.
    pub fn list_all(&self) -> Result<Vec<Article>> {
        let _guard = self.serialized();
        let doc = self.backend.load()?;
        debug!("Listing {} articles", doc.articles.len());
        Ok(doc.articles)
    }

    /// Returns the article with the given id.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when no record has this id.
    pub fn get(&self, id: &str) -> Result<Article> {
        let _guard = self.serialized();
        let doc = self.backend.load()?;
        doc.find(id).cloned().ok_or(StoreError::NotFound)
    }

    /// Creates an article, storing the optional image first.
    ///
    /// Title and content are taken as given; empty values are allowed.
    pub fn create(&self, fields: NewArticle, upload: Option<Upload>) -> Result<Article> {
        if let Some(upload) = &upload {
            self.assets.validate(upload)?;
        }

        let _guard = self.serialized();
        let mut doc = self.backend.load()?;

        let id = mint_id(&doc);
        let image = match &upload {
            Some(upload) => Some(self.assets.store(upload)?),
            None => None,
        };

        let now = timestamp::now();
        let article = Article {
            id,
            title: fields.title,
            content: fields.content,
            image,
            created_at: now,
            updated_at: now,
        };

        doc.articles.push(article.clone());
        self.backend.save(&doc)?;

        info!("Created article {}", article.id);
        Ok(article)
    }

    /// Applies a partial update.
    ///
    /// Keys present in `patch` overwrite the stored values; absent keys are
    /// left alone. `id` and `created_at` cannot be changed. A new image
    /// replaces the old one, whose file is removed once the document has been
    /// written. `image: null` in the patch clears the image.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` when no record has this id (checked before any
    ///   file is written).
    /// - `StoreError::InvalidRequest` when the patch sets `image` to a string
    ///   other than the current reference; references only come from uploads.
    ///   Sending the current reference back unchanged is accepted.
    pub fn update(&self, id: &str, patch: ArticlePatch, upload: Option<Upload>) -> Result<Article> {
        if let Some(upload) = &upload {
            self.assets.validate(upload)?;
        }

        let _guard = self.serialized();
        let mut doc = self.backend.load()?;
        let index = doc.position(id).ok_or(StoreError::NotFound)?;

        if let Some(Some(reference)) = &patch.image {
            if doc.articles[index].image.as_deref() != Some(reference.as_str()) {
                return Err(StoreError::InvalidRequest(
                    "image can only be changed by uploading a file".into(),
                ));
            }
        }

        let new_image = match &upload {
            Some(upload) => Some(self.assets.store(upload)?),
            None => None,
        };

        let article = &mut doc.articles[index];
        let previous_image = article.image.clone();

        if let Some(title) = patch.title {
            article.title = title;
        }
        if let Some(content) = patch.content {
            article.content = content;
        }
        if let Some(None) = patch.image {
            article.image = None;
        }
        if let Some(reference) = new_image {
            article.image = Some(reference);
        }
        article.updated_at = next_update_time(article.updated_at);

        let updated = article.clone();
        self.backend.save(&doc)?;

        if let Some(old) = previous_image {
            if updated.image.as_deref() != Some(old.as_str()) {
                self.discard_asset(&old);
            }
        }

        info!("Updated article {}", updated.id);
        Ok(updated)
    }

    /// Deletes an article and then its image.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when no record has this id.
    pub fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.serialized();
        let mut doc = self.backend.load()?;
        let index = doc.position(id).ok_or(StoreError::NotFound)?;

        let removed = doc.articles.remove(index);
        self.backend.save(&doc)?;

        if let Some(reference) = &removed.image {
            self.discard_asset(reference);
        }

        info!("Deleted article {}", removed.id);
        Ok(())
    }

    /// Removes files in the uploads directory that no article references.
    pub fn sweep_orphans(&self) -> Result<SweepReport> {
        let _guard = self.serialized();
        let doc = self.backend.load()?;

        let referenced: HashSet<&str> = doc
            .articles
            .iter()
            .filter_map(|a| a.image.as_deref())
            .filter_map(|reference| self.assets.file_name_of(reference))
            .collect();

        let mut report = SweepReport::default();
        for name in self.assets.file_names()? {
            report.scanned += 1;
            if referenced.contains(name.as_str()) {
                continue;
            }
            let reference = format!("{}/{}", self.assets.public_prefix(), name);
            match self.assets.remove(&reference) {
                Ok(_) => {
                    debug!("Removed orphaned asset {}", name);
                    report.removed += 1;
                }
                Err(e) => {
                    warn!("Could not remove orphaned asset {}: {}", name, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Best-effort removal of an image no longer referenced by any record.
    fn discard_asset(&self, reference: &str) {
        match self.assets.remove(reference) {
            Ok(true) => debug!("Removed asset {}", reference),
            Ok(false) => debug!("Asset {} was already gone", reference),
            Err(e) => warn!("Could not remove asset {}: {}", reference, e),
        }
    }
}

/// A v4 UUID not already used in the document.
fn mint_id(doc: &ArticleDocument) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if doc.find(&id).is_none() {
            return id;
        }
    }
}

/// `now`, or 1 ms past `previous` if the clock has not moved on.
fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = timestamp::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        store: ArticleStore,
        backend: Arc<JsonFileBackend>,
        _tmp: TempDir,
    }

    fn create_store() -> Fixture {
        create_store_with_limit(DEFAULT_MAX_UPLOAD_BYTES)
    }

    fn create_store_with_limit(max_upload_bytes: usize) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(JsonFileBackend::new(tmp.path().join("db.json")));
        let assets = AssetDir::new(tmp.path().join("uploads"), max_upload_bytes);
        assets.ensure_exists().unwrap();
        let store = ArticleStore::new(backend.clone(), assets);
        Fixture {
            store,
            backend,
            _tmp: tmp,
        }
    }

    fn fields(title: &str, content: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    fn png(name: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: b"dummy image content".to_vec(),
        }
    }

    fn asset_exists(store: &ArticleStore, reference: &str) -> bool {
        store.assets().path_for(reference).unwrap().exists()
    }

    #[test]
    fn test_create_stamps_id_and_equal_timestamps() {
        let f = create_store();

        let a = f.store.create(fields("A", "B"), None).unwrap();
        let b = f.store.create(fields("A", "B"), None).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
        assert!(a.image.is_none());
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_create_accepts_empty_fields() {
        let f = create_store();

        let article = f.store.create(NewArticle::default(), None).unwrap();
        assert_eq!(article.title, "");
        assert_eq!(article.content, "");
    }

    #[test]
    fn test_list_preserves_creation_order() {
        let f = create_store();

        let ids: Vec<String> = (0..5)
            .map(|i| f.store.create(fields(&format!("t{i}"), ""), None).unwrap().id)
            .collect();

        let listed: Vec<String> = f.store.list_all().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_get_returns_created_record() {
        let f = create_store();

        let created = f.store.create(fields("Title", "Body"), None).unwrap();
        assert_eq!(f.store.get(&created.id).unwrap(), created);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let f = create_store();
        f.store.create(fields("A", "B"), None).unwrap();

        assert!(matches!(f.store.get("nope"), Err(StoreError::NotFound)));
        assert!(matches!(
            f.store.update("nope", ArticlePatch::default(), None),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(f.store.delete("nope"), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_update_for_unknown_id_writes_no_asset() {
        let f = create_store();

        let result = f.store.update("nope", ArticlePatch::default(), Some(png("x.png")));
        assert!(matches!(result, Err(StoreError::NotFound)));
        assert!(f.store.assets().file_names().unwrap().is_empty());
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let f = create_store();
        let original = f.store.create(fields("A", "B"), None).unwrap();

        let patch = ArticlePatch {
            title: Some("C".to_string()),
            ..ArticlePatch::default()
        };
        let updated = f.store.update(&original.id, patch, None).unwrap();

        assert_eq!(updated.title, "C");
        assert_eq!(updated.content, "B");
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at > original.updated_at);

        let on_disk = f.backend.load().unwrap();
        assert_eq!(on_disk.articles[0], updated);
    }

    #[test]
    fn test_update_time_strictly_increases_even_with_empty_patch() {
        let f = create_store();
        let original = f.store.create(fields("A", "B"), None).unwrap();

        let first = f.store.update(&original.id, ArticlePatch::default(), None).unwrap();
        let second = f.store.update(&original.id, ArticlePatch::default(), None).unwrap();

        assert!(first.updated_at > original.updated_at);
        assert!(second.updated_at > first.updated_at);
        assert!(second.updated_at >= second.created_at);
    }

    #[test]
    fn test_update_rejects_image_reference_string() {
        let f = create_store();
        let original = f.store.create(fields("A", "B"), None).unwrap();

        let patch = ArticlePatch {
            image: Some(Some("/uploads/../../etc/passwd".to_string())),
            ..ArticlePatch::default()
        };
        let err = f.store.update(&original.id, patch, None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
        assert_eq!(f.store.get(&original.id).unwrap(), original);
    }

    #[test]
    fn test_update_accepts_current_image_reference_unchanged() {
        let f = create_store();
        let article = f.store.create(fields("A", "B"), Some(png("cat.png"))).unwrap();
        let reference = article.image.clone().unwrap();

        // A client sending back the whole record it just read.
        let patch = ArticlePatch {
            title: Some("C".to_string()),
            content: Some(article.content.clone()),
            image: Some(Some(reference.clone())),
        };
        let updated = f.store.update(&article.id, patch, None).unwrap();

        assert_eq!(updated.title, "C");
        assert_eq!(updated.image.as_deref(), Some(reference.as_str()));
        assert!(asset_exists(&f.store, &reference));
        assert_eq!(f.store.assets().file_names().unwrap().len(), 1);
    }

    #[test]
    fn test_update_rejects_other_image_reference_for_unknown_id_as_not_found() {
        let f = create_store();

        let patch = ArticlePatch {
            image: Some(Some("/uploads/1-cat.png".to_string())),
            ..ArticlePatch::default()
        };
        assert!(matches!(
            f.store.update("nope", patch, None),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_update_with_non_image_upload_changes_nothing() {
        let f = create_store();
        let article = f.store.create(fields("A", "B"), Some(png("cat.png"))).unwrap();
        let reference = article.image.clone().unwrap();

        let upload = Upload {
            file_name: "notes.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: b"hi".to_vec(),
        };
        let patch = ArticlePatch {
            title: Some("C".to_string()),
            ..ArticlePatch::default()
        };
        let err = f.store.update(&article.id, patch, Some(upload)).unwrap_err();

        assert!(matches!(err, StoreError::InvalidAsset(_)));
        assert_eq!(f.store.get(&article.id).unwrap(), article);
        assert!(asset_exists(&f.store, &reference));
        assert_eq!(f.store.assets().file_names().unwrap().len(), 1);
    }

    #[test]
    fn test_update_with_oversized_upload_changes_nothing() {
        let f = create_store_with_limit(32);
        let article = f.store.create(fields("A", "B"), Some(png("cat.png"))).unwrap();
        let reference = article.image.clone().unwrap();

        let upload = Upload {
            file_name: "big.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0; 33],
        };
        let err = f
            .store
            .update(&article.id, ArticlePatch::default(), Some(upload))
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidAsset(_)));
        assert_eq!(f.store.get(&article.id).unwrap(), article);
        assert!(asset_exists(&f.store, &reference));
        assert_eq!(f.store.assets().file_names().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_record() {
        let f = create_store();
        let keep = f.store.create(fields("keep", ""), None).unwrap();
        let gone = f.store.create(fields("gone", ""), None).unwrap();

        f.store.delete(&gone.id).unwrap();

        assert!(matches!(f.store.get(&gone.id), Err(StoreError::NotFound)));
        let remaining = f.store.list_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[test]
    fn test_create_with_image_writes_file() {
        let f = create_store();

        let article = f.store.create(fields("A", "B"), Some(png("test-image.png"))).unwrap();
        let reference = article.image.expect("image reference");

        assert!(reference.starts_with("/uploads/"));
        assert!(asset_exists(&f.store, &reference));
    }

    #[test]
    fn test_create_with_non_image_persists_nothing() {
        let f = create_store();

        let upload = Upload {
            file_name: "notes.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: b"hi".to_vec(),
        };
        let err = f.store.create(fields("A", "B"), Some(upload)).unwrap_err();

        assert!(matches!(err, StoreError::InvalidAsset(_)));
        assert!(f.store.list_all().unwrap().is_empty());
        assert!(f.store.assets().file_names().unwrap().is_empty());
    }

    #[test]
    fn test_update_replaces_image_and_removes_old_file() {
        let f = create_store();
        let article = f.store.create(fields("A", "B"), Some(png("old.png"))).unwrap();
        let old = article.image.clone().unwrap();

        let updated = f
            .store
            .update(&article.id, ArticlePatch::default(), Some(png("new.png")))
            .unwrap();
        let new = updated.image.clone().unwrap();

        assert_ne!(old, new);
        assert!(!asset_exists(&f.store, &old));
        assert!(asset_exists(&f.store, &new));
        assert_eq!(f.store.get(&article.id).unwrap().image, Some(new));
    }

    #[test]
    fn test_update_succeeds_when_old_file_is_already_gone() {
        let f = create_store();
        let article = f.store.create(fields("A", "B"), Some(png("old.png"))).unwrap();
        let old = article.image.clone().unwrap();
        fs::remove_file(f.store.assets().path_for(&old).unwrap()).unwrap();

        let updated = f
            .store
            .update(&article.id, ArticlePatch::default(), Some(png("new.png")))
            .unwrap();
        assert!(asset_exists(&f.store, updated.image.as_deref().unwrap()));
    }

    #[test]
    fn test_update_with_null_image_clears_reference() {
        let f = create_store();
        let article = f.store.create(fields("A", "B"), Some(png("old.png"))).unwrap();
        let old = article.image.clone().unwrap();

        let patch = ArticlePatch {
            image: Some(None),
            ..ArticlePatch::default()
        };
        let updated = f.store.update(&article.id, patch, None).unwrap();

        assert!(updated.image.is_none());
        assert!(!asset_exists(&f.store, &old));
    }

    #[test]
    fn test_delete_removes_image_file() {
        let f = create_store();
        let article = f.store.create(fields("A", "B"), Some(png("cat.png"))).unwrap();
        let reference = article.image.clone().unwrap();

        f.store.delete(&article.id).unwrap();
        assert!(!asset_exists(&f.store, &reference));
    }

    #[test]
    fn test_delete_tolerates_tampered_image_reference() {
        let f = create_store();
        let now = timestamp::now();
        f.backend
            .save(&ArticleDocument {
                articles: vec![Article {
                    id: "test-id".to_string(),
                    title: "Test Article".to_string(),
                    content: "Test Content".to_string(),
                    image: Some("/uploads/../db.json".to_string()),
                    created_at: now,
                    updated_at: now,
                }],
            })
            .unwrap();

        f.store.delete("test-id").unwrap();
        assert!(f.backend.path().exists());
        assert!(f.store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document_is_storage_failure() {
        let f = create_store();
        fs::write(f.backend.path(), b"[1, 2").unwrap();

        let err = f.store.list_all().unwrap_err();
        assert!(err.is_storage_failure());
        assert!(f.store.create(fields("A", "B"), None).unwrap_err().is_storage_failure());
    }

    #[test]
    fn test_sweep_removes_only_unreferenced_files() {
        let f = create_store();
        let kept = f.store.create(fields("A", "B"), Some(png("kept.png"))).unwrap();
        let orphan = f.store.assets().store(&png("orphan.png")).unwrap();

        let report = f.store.sweep_orphans().unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                removed: 1,
                failed: 0
            }
        );
        assert!(asset_exists(&f.store, kept.image.as_deref().unwrap()));
        assert!(!asset_exists(&f.store, &orphan));
    }

    #[test]
    fn test_concurrent_creates_are_all_kept() {
        let f = create_store();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = f.store.clone();
                std::thread::spawn(move || store.create(fields(&format!("t{i}"), ""), None).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(f.store.list_all().unwrap().len(), 8);
    }

    #[test]
    fn test_memory_backend_supports_same_contract() {
        let store = ArticleStore::new(
            Arc::new(MemoryBackend::new()),
            AssetDir::new(std::env::temp_dir(), DEFAULT_MAX_UPLOAD_BYTES),
        );

        let created = store.create(fields("A", "B"), None).unwrap();
        assert_eq!(store.list_all().unwrap(), vec![created.clone()]);
        store.delete(&created.id).unwrap();
        assert!(store.list_all().unwrap().is_empty());
    }
}
