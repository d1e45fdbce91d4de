use crate::api_client::RemoteData;
use crate::error::ClientError;
use crate::lock;
use crate::models::{FileId, FileStatus, UploadedFile};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub files: Vec<UploadedFile>,
    pub last_refresh: Option<DateTime<Local>>,
    /// False until the first successful listing.
    pub loaded: bool,
}

impl RegistrySnapshot {
    pub fn get(&self, id: &FileId) -> Option<&UploadedFile> {
        self.files.iter().find(|f| &f.file_id == id)
    }

    pub fn processing_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Uploading | FileStatus::Processing))
            .count()
    }
}

/// Cached copy of the service's file list.
#[derive(Default)]
pub struct FileRegistry {
    snapshot: Mutex<RegistrySnapshot>,
    /// Ids deleted locally that the service may still list. Cleared once a
    /// listing no longer contains them.
    deleted: Mutex<HashSet<FileId>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot with the service's current list. On failure the
    /// previous snapshot is kept as is.
    pub async fn refresh(&self, client: &dyn RemoteData) -> Result<usize, ClientError> {
        let mut files = client.list_files().await?;
        {
            let mut deleted = lock(&self.deleted);
            if !deleted.is_empty() {
                deleted.retain(|id| files.iter().any(|f| &f.file_id == id));
                files.retain(|f| !deleted.contains(&f.file_id));
            }
        }
        let count = files.len();

        let mut snapshot = lock(&self.snapshot);
        snapshot.files = files;
        snapshot.last_refresh = Some(Local::now());
        snapshot.loaded = true;

        debug!("File registry refreshed: {} files", count);
        Ok(count)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        lock(&self.snapshot).clone()
    }

    pub fn files(&self) -> Vec<UploadedFile> {
        lock(&self.snapshot).files.clone()
    }

    pub fn get(&self, id: &FileId) -> Option<UploadedFile> {
        lock(&self.snapshot).get(id).cloned()
    }

    /// Drops the local copy of a deleted file ahead of the next refresh. A
    /// listing that was already in flight will not bring it back.
    pub fn forget(&self, id: &FileId) -> bool {
        lock(&self.deleted).insert(id.clone());

        let mut snapshot = lock(&self.snapshot);
        let before = snapshot.files.len();
        snapshot.files.retain(|f| &f.file_id != id);
        snapshot.files.len() != before
    }
}
