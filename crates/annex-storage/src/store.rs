//! Filesystem-backed attachment store.
//!
//! All paths are given as segment lists produced by [`crate::layout`] and are
//! resolved against a single root directory. Uploaded files get a random
//! name (a v4 UUID in simple hex form) plus an extension taken from the
//! declared media type, and are published with a rename so a reader never
//! observes a partially written file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mime_guess::Mime;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::layout;

/// Suffix of in-flight uploads. Files carrying it are never listed.
const PARTIAL_SUFFIX: &str = ".part";

/// Attempts at finding an unused name before giving up.
const MAX_NAME_ATTEMPTS: usize = 4;

/// A file present under a resolved attachment directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub media_type: String,
    pub size: u64,
}

/// Attachment files rooted at one directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path for a segment list.
    pub fn path_for(&self, segments: &[String]) -> PathBuf {
        layout::to_path(&self.root, segments)
    }

    /// Look up an existing entry.
    ///
    /// `Ok(None)` means the entry does not exist; any other I/O failure while
    /// resolving it is returned as an error.
    pub async fn find(&self, segments: &[String]) -> Result<Option<PathBuf>> {
        let path = self.path_for(segments);
        match fs::try_exists(&path).await {
            Ok(true) => Ok(Some(path)),
            Ok(false) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Return the directory for `segments`, creating every missing level.
    pub async fn find_or_create_directory(&self, segments: &[String]) -> Result<PathBuf> {
        let path = self.path_for(segments);

        fs::create_dir_all(&path).await.map_err(|e| {
            Error::StorageUnavailable(format!(
                "could not create directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let metadata = fs::metadata(&path).await.map_err(|e| {
            Error::StorageUnavailable(format!("could not stat {}: {}", path.display(), e))
        })?;

        if !metadata.is_dir() {
            return Err(Error::StorageUnavailable(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(Error::StorageUnavailable(format!(
                "directory {} is not writable",
                path.display()
            )));
        }

        Ok(path)
    }

    /// Write `content` under `directory` with a freshly generated name.
    ///
    /// The bytes go to a hidden temp file first and are renamed into place
    /// once fully flushed. On failure the temp file is removed.
    pub async fn write_unique(
        &self,
        directory: &Path,
        media_type: &Mime,
        content: &[u8],
    ) -> Result<StoredFile> {
        let extension = extension_for(media_type);

        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = layout::file_name(&generate_token(), &extension);
            let target = directory.join(&filename);
            if fs::try_exists(&target).await.unwrap_or(false) {
                continue;
            }

            let partial = directory.join(format!(".{}{}", filename, PARTIAL_SUFFIX));
            if let Err(e) = write_partial(&partial, content).await {
                let _ = fs::remove_file(&partial).await;
                return Err(Error::StorageUnavailable(format!(
                    "could not write {}: {}",
                    filename, e
                )));
            }

            if let Err(e) = fs::rename(&partial, &target).await {
                let _ = fs::remove_file(&partial).await;
                return Err(Error::StorageUnavailable(format!(
                    "could not publish {}: {}",
                    filename, e
                )));
            }

            info!(
                path = %target.display(),
                media_type = %media_type,
                size = content.len(),
                "Stored attachment"
            );

            return Ok(StoredFile {
                filename,
                media_type: media_type.essence_str().to_string(),
                size: content.len() as u64,
            });
        }

        Err(Error::StorageUnavailable(format!(
            "no unused file name found in {}",
            directory.display()
        )))
    }

    /// Read a whole file.
    ///
    /// A missing entry is `FileNotFound`; an entry that exists but cannot be
    /// read (a directory, no permission) is `Unreadable`.
    pub async fn read(&self, segments: &[String]) -> Result<Vec<u8>> {
        let path = self
            .find(segments)
            .await?
            .ok_or_else(|| Error::FileNotFound(segments.join("/")))?;

        fs::read(&path)
            .await
            .map_err(|e| Error::Unreadable(format!("{}: {}", segments.join("/"), e)))
    }

    /// Regular, non-hidden files of a directory, sorted by name.
    ///
    /// A missing directory lists as empty.
    pub async fn list(&self, segments: &[String]) -> Result<Vec<StoredFile>> {
        let path = self.path_for(segments);
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let media_type = mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            files.push(StoredFile {
                filename: name,
                media_type,
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /// Remove one file. Returns `false` if it was already absent.
    pub async fn delete_file(&self, segments: &[String]) -> Result<bool> {
        let path = self.path_for(segments);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted attachment");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::StorageUnavailable(format!(
                "could not delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Remove a directory and everything below it.
    ///
    /// Files are removed first, then directories deepest-first, each only if
    /// it ended up empty. A failure on one entry does not stop the others;
    /// the failures are reported together once the walk is done. Returns
    /// `false` if the directory did not exist.
    pub async fn delete_directory_recursive(&self, segments: &[String]) -> Result<bool> {
        let root = self.path_for(segments);
        match fs::metadata(&root).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return Err(Error::StorageUnavailable(format!(
                    "{} is not a directory",
                    root.display()
                )))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::Io(e)),
        }

        let mut failures = Vec::new();
        let mut directories = vec![root.clone()];
        let mut index = 0;

        while index < directories.len() {
            let dir = directories[index].clone();
            index += 1;

            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    failures.push(format!("{}: {}", dir.display(), e));
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        failures.push(format!("{}: {}", dir.display(), e));
                        break;
                    }
                };
                let path = entry.path();
                match entry.file_type().await {
                    Ok(t) if t.is_dir() => directories.push(path),
                    Ok(_) => {
                        if let Err(e) = fs::remove_file(&path).await {
                            failures.push(format!("{}: {}", path.display(), e));
                        }
                    }
                    Err(e) => failures.push(format!("{}: {}", path.display(), e)),
                }
            }
        }

        // Children were discovered after their parents.
        for dir in directories.iter().rev() {
            if let Err(e) = fs::remove_dir(dir).await {
                failures.push(format!("{}: {}", dir.display(), e));
            }
        }

        if failures.is_empty() {
            info!(path = %root.display(), "Deleted attachment directory");
            Ok(true)
        } else {
            warn!(
                path = %root.display(),
                failures = failures.len(),
                "Attachment directory only partially deleted"
            );
            Err(Error::StorageUnavailable(format!(
                "could not fully delete {}: {}",
                root.display(),
                failures.join("; ")
            )))
        }
    }

    /// Check that the root exists (creating it if needed) and is writable.
    pub async fn check_writable(&self) -> Result<()> {
        self.find_or_create_directory(&[]).await.map(|_| ())
    }
}

/// File extension for a media type: its subtype, lower-cased, with any
/// structured-syntax suffix (`+xml`) already stripped by the parser.
pub fn extension_for(media_type: &Mime) -> String {
    let ext: String = media_type
        .subtype()
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
        .collect::<String>()
        .to_ascii_lowercase();

    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}

fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

async fn write_partial(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    Ok(())
}
