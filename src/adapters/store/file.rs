//! JSON file store
//!
//! The document is rewritten after every mutation: serialized to a sibling
//! temporary file, then renamed over the target. The file holds credentials,
//! so on Unix the temporary file is created with mode 0600 and is never
//! readable by other users.

use super::document::{DocumentStore, Persistence, StoreDocument};
use crate::domain::{MedSyncError, Result, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Saves the document as pretty-printed JSON at a fixed path
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Persistence for JsonFile {
    async fn save(&self, document: &StoreDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let temp = self.temp_path();
        let write_failed =
            |e: std::io::Error| StoreError::WriteFailed(format!("{}: {e}", temp.display()));

        let mut file = create_private(&temp).await.map_err(write_failed)?;
        file.write_all(&bytes).await.map_err(write_failed)?;
        file.sync_all().await.map_err(write_failed)?;
        drop(file);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

/// Creates `path` fresh, owner read/write only on Unix
///
/// A leftover file from an interrupted save is removed first so its
/// permissions are not inherited.
async fn create_private(path: &Path) -> std::io::Result<File> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).await
}

/// Store persisted to a JSON document on disk
pub type FileStore = DocumentStore<JsonFile>;

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing file is not a valid store document.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MedSyncError::Configuration(format!(
                    "Failed to create storage directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                MedSyncError::Serialization(format!(
                    "Store file {} is not a valid document: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), "Opened file store");
        Ok(DocumentStore::with_document(document, JsonFile { path }))
    }
}
