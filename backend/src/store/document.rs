//! Whole-document persistence for the article collection.
//!
//! Every store operation loads the full document, mutates it in memory and
//! saves it back. Backends only have to read and write the document as a unit.

use crate::error::{Result, StoreError};
use cms_common::model::article::ArticleDocument;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Backend trait for the article document.
///
/// Implementations must be thread-safe; the store serializes
/// read-modify-write sequences itself, so backends do not need to.
pub trait DocumentBackend: Send + Sync + 'static {
    /// Reads the whole document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` when the backing medium cannot be read
    /// and `StoreError::MalformedDocument` when its contents do not parse.
    fn load(&self) -> Result<ArticleDocument>;

    /// Replaces the whole document.
    fn save(&self, document: &ArticleDocument) -> Result<()>;
}

/// The production backend: one pretty-printed JSON file.
///
/// A missing (or blank) file reads as an empty document. Writes go to a
/// temporary file in the same directory which is synced and then renamed over
/// the target, so readers never observe a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl DocumentBackend for JsonFileBackend {
    fn load(&self) -> Result<ArticleDocument> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ArticleDocument::default()),
            Err(e) => {
                return Err(StoreError::storage(
                    format!("reading {}", self.path.display()),
                    e,
                ))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ArticleDocument::default());
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save(&self, document: &ArticleDocument) -> Result<()> {
        let context = || format!("writing {}", self.path.display());
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| StoreError::storage(context(), e.into()))?;

        let mut tmp =
            NamedTempFile::new_in(self.parent_dir()).map_err(|e| StoreError::storage(context(), e))?;
        tmp.write_all(&bytes)
            .map_err(|e| StoreError::storage(context(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::storage(context(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::storage(context(), e.error))?;

        Ok(())
    }
}

/// In-process backend. Nothing survives the process; useful for embedding
/// the store in tests or tools that do not want a data file.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    document: Mutex<ArticleDocument>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentBackend for MemoryBackend {
    fn load(&self) -> Result<ArticleDocument> {
        let doc = self.document.lock().unwrap_or_else(|e| e.into_inner());
        Ok(doc.clone())
    }

    fn save(&self, document: &ArticleDocument) -> Result<()> {
        let mut doc = self.document.lock().unwrap_or_else(|e| e.into_inner());
        *doc = document.clone();
        Ok(())
    }
}
