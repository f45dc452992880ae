/**
 * Filesystem Attachment Store
 *
 * Attachment blobs live as flat files named by their reference id under the
 * upload directory. The external HTTP layer writes them; the router only
 * ever deletes through this store when a message or account cascade runs.
 */
use crate::backend::store::{AttachmentStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Attachment blobs under a single upload directory
#[derive(Clone)]
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    /// Open the store, creating the upload directory when missing
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Path of a blob by reference
    pub fn blob_path(&self, attachment: Uuid) -> PathBuf {
        self.root.join(attachment.to_string())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn delete(&self, attachment: Uuid) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.blob_path(attachment)).await {
            Ok(()) => Ok(()),
            // Already gone counts as deleted
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
