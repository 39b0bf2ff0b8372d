//! Companion image files for articles.
//!
//! Images live as plain files in one directory and are referenced from
//! records by their public URL (`/uploads/<filename>`). File names are
//! prefixed with the upload time in milliseconds so uploads with the same
//! original name do not collide.

use crate::error::{Result, StoreError};
use chrono::Utc;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use uuid::Uuid;

/// Public URL prefix under which the uploads directory is served.
pub const DEFAULT_PUBLIC_PREFIX: &str = "/uploads";

/// Upload ceiling: 5 MB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const MAX_FILE_NAME_LEN: usize = 128;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex is valid"));

/// An uploaded file, fully received but not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Name the client gave the file. Only used to build the stored name.
    pub file_name: String,
    /// MIME type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Declared content type, or one guessed from the file name.
    pub fn effective_content_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            mime_guess::from_path(&self.file_name)
                .first()
                .map(|mime| mime.essence_str().to_string())
        })
    }
}

pub fn is_image_type(content_type: &str) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// Directory holding article images.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl AssetDir {
    pub fn new<P: AsRef<Path>>(root: P, max_bytes: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
            max_bytes,
        }
    }

    pub fn with_public_prefix(mut self, prefix: &str) -> Self {
        self.public_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Creates the directory (and parents) if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            StoreError::storage(format!("creating {}", self.root.display()), e)
        })
    }

    /// Checks an upload against the image-only rule and the size ceiling.
    ///
    /// # Errors
    ///
    /// `StoreError::InvalidAsset` when the upload is not an image or is too large.
    pub fn validate(&self, upload: &Upload) -> Result<()> {
        match upload.effective_content_type() {
            Some(ct) if is_image_type(&ct) => {}
            _ => return Err(StoreError::InvalidAsset("Only image files are allowed!".into())),
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(self.too_large());
        }
        Ok(())
    }

    pub(crate) fn too_large(&self) -> StoreError {
        StoreError::InvalidAsset(format!(
            "File too large: the limit is {} bytes",
            self.max_bytes
        ))
    }

    /// Writes an upload to a fresh file and returns its public reference.
    ///
    /// Never overwrites an existing file: if the time-prefixed name is taken,
    /// a short random tag is added to it.
    pub fn store(&self, upload: &Upload) -> Result<String> {
        self.validate(upload)?;

        let safe_name = sanitize_file_name(
            &upload.file_name,
            upload.effective_content_type().as_deref(),
        );
        let millis = Utc::now().timestamp_millis();

        let mut file_name = format!("{millis}-{safe_name}");
        let mut file = match self.create_new(&file_name) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let tag = Uuid::new_v4().simple().to_string();
                file_name = format!("{millis}-{}-{safe_name}", &tag[..8]);
                self.create_new(&file_name)
            }
            other => other,
        }
        .map_err(|e| StoreError::storage(format!("creating asset {file_name}"), e))?;

        file.write_all(&upload.bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::storage(format!("writing asset {file_name}"), e))?;

        Ok(format!("{}/{}", self.public_prefix, file_name))
    }

    fn create_new(&self, file_name: &str) -> std::io::Result<fs::File> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(file_name))
    }

    /// The bare file name a reference points to, if it is one of ours.
    ///
    /// Only references of the form `<prefix>/<single plain file name>` are
    /// accepted, so a tampered document cannot point outside the directory.
    pub fn file_name_of<'a>(&self, reference: &'a str) -> Option<&'a str> {
        let rest = reference
            .strip_prefix(self.public_prefix.as_str())?
            .strip_prefix('/')?;

        let mut components = Path::new(rest).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !rest.contains('\\') => Some(rest),
            _ => None,
        }
    }

    pub fn path_for(&self, reference: &str) -> Option<PathBuf> {
        self.file_name_of(reference).map(|name| self.root.join(name))
    }

    /// Deletes the file behind a reference.
    ///
    /// # Returns
    /// * `Ok(true)` - the file existed and was removed
    /// * `Ok(false)` - there was nothing to remove
    pub fn remove(&self, reference: &str) -> Result<bool> {
        let path = self.path_for(reference).ok_or_else(|| {
            StoreError::InvalidAsset(format!("unrecognised image reference: {reference}"))
        })?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::storage(format!("removing {}", path.display()), e)),
        }
    }

    /// Names of the regular files currently in the directory.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::storage(
                    format!("listing {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                StoreError::storage(format!("listing {}", self.root.display()), e)
            })?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Reduces a client-supplied file name to `[A-Za-z0-9._-]`.
fn sanitize_file_name(original: &str, content_type: Option<&str>) -> String {
    // Some browsers send the full client path.
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let mut name = cleaned.trim_start_matches('.').to_string();

    if name.is_empty() {
        let ext = content_type
            .and_then(mime_guess::get_mime_extensions_str)
            .and_then(|exts| exts.first())
            .unwrap_or(&"bin");
        name = format!("upload.{ext}");
    }

    if name.len() > MAX_FILE_NAME_LEN {
        name = name[name.len() - MAX_FILE_NAME_LEN..].to_string();
    }
    name
}
