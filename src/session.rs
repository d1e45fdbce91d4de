use crate::api_client::RemoteData;
use crate::config::Config;
use crate::disk::{DiskSpaceMonitor, DiskSpaceView};
use crate::error::ClientError;
use crate::feedback::{BackgroundFailure, ErrorChannels};
use crate::lock;
use crate::models::{FileId, UploadOutcome, UploadedFile};
use crate::registry::{FileRegistry, RegistrySnapshot};
use crate::scheduler::{spawn_poller, PollHandle};
use crate::upload::{ProgressCallback, UploadController, UploadEndpoint, UploadSource, UploadState};
use crate::viewer::{DataViewer, PageApplied, PageRequest};
use futures::future::join_all;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Large-file endpoint above the configured size threshold, small below.
    #[default]
    Auto,
    Small,
    Large,
}

impl UploadMode {
    pub fn resolve(&self, size: u64, threshold: u64) -> UploadEndpoint {
        match self {
            UploadMode::Auto => UploadEndpoint::for_size(size, threshold),
            UploadMode::Small => UploadEndpoint::Small,
            UploadMode::Large => UploadEndpoint::Large,
        }
    }
}

/// Owns the top-level view state and wires the components together:
/// file registry and disk monitor on their own pollers, the data viewer,
/// the upload controller, and the two error channels.
pub struct Session {
    client: Arc<dyn RemoteData>,
    files_interval: Duration,
    disk_space_interval: Duration,
    large_upload_threshold: u64,
    registry: FileRegistry,
    disk: DiskSpaceMonitor,
    viewer: Mutex<DataViewer>,
    upload: Arc<Mutex<UploadController>>,
    errors: ErrorChannels,
    pollers: Mutex<Vec<PollHandle>>,
}

impl Session {
    pub fn new(client: Arc<dyn RemoteData>, config: &Config) -> Self {
        Self {
            client,
            files_interval: config.polling.files_interval(),
            disk_space_interval: config.polling.disk_space_interval(),
            large_upload_threshold: config.upload.large_file_threshold_bytes,
            registry: FileRegistry::new(),
            disk: DiskSpaceMonitor::new(),
            viewer: Mutex::new(DataViewer::new(config.viewer.default_page_size)),
            upload: Arc::new(Mutex::new(UploadController::new())),
            errors: ErrorChannels::default(),
            pollers: Mutex::new(Vec::new()),
        }
    }

    pub fn client(&self) -> &Arc<dyn RemoteData> {
        &self.client
    }

    /// Starts the file-list and disk-space pollers. Both fetch immediately.
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let mut pollers = lock(&self.pollers);
        if !pollers.is_empty() {
            return;
        }

        let weak = Arc::downgrade(self);
        pollers.push(spawn_poller(
            "file list",
            self.files_interval,
            self.errors.background.clone(),
            move || poll_with(weak.clone(), |session| async move {
                session.reload_files().await.map(|_| ())
            }),
        ));

        let weak = Arc::downgrade(self);
        pollers.push(spawn_poller(
            "disk space",
            self.disk_space_interval,
            self.errors.background.clone(),
            move || poll_with(weak.clone(), |session| async move {
                session.disk.refresh(session.client.as_ref()).await
            }),
        ));

        info!(
            "Session started (files every {:?}, disk space every {:?})",
            self.files_interval, self.disk_space_interval
        );
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.pollers).is_empty()
    }

    /// Stops both pollers. Requests already in flight are not aborted, and
    /// a stalled one holds teardown up for at most the scheduler's grace period.
    pub async fn shutdown(&self) {
        let pollers: Vec<PollHandle> = lock(&self.pollers).drain(..).collect();
        join_all(pollers.into_iter().map(|poller| {
            debug!("Stopping {} poller", poller.name());
            poller.shutdown()
        }))
        .await;
    }

    // Registry

    pub fn files(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Refreshes the registry now instead of waiting for the next tick.
    /// Failures only reach the background log.
    pub async fn refresh_files(&self) -> Result<usize, ClientError> {
        let result = self.reload_files().await;
        if let Err(e) = &result {
            self.errors.background.record("file list", e);
        }
        result
    }

    async fn reload_files(&self) -> Result<usize, ClientError> {
        let count = self.registry.refresh(self.client.as_ref()).await?;

        let files = self.registry.files();
        let request = lock(&self.viewer).sync_selection(&files);
        // page failures are surfaced by load_page itself
        let _ = self.load_page(request).await;

        Ok(count)
    }

    // Disk space

    pub fn disk_space(&self) -> DiskSpaceView {
        self.disk.view()
    }

    pub async fn refresh_disk_space(&self) -> Result<(), ClientError> {
        let result = self.disk.refresh(self.client.as_ref()).await;
        if let Err(e) = &result {
            self.errors.background.record("disk space", e);
        }
        result
    }

    // Data viewer

    /// Runs `f` against the viewer without cloning the displayed page.
    pub fn with_viewer<R>(&self, f: impl FnOnce(&DataViewer) -> R) -> R {
        f(&lock(&self.viewer))
    }

    pub async fn select_file(&self, file: UploadedFile) -> Result<(), ClientError> {
        debug!("Selecting {} ({})", file.filename, file.status);
        let request = lock(&self.viewer).select(file);
        self.load_page(request).await.map(|_| ())
    }

    pub async fn select_file_by_id(&self, id: &FileId) -> Result<(), ClientError> {
        match self.registry.get(id) {
            Some(file) => self.select_file(file).await,
            None => {
                let err = ClientError::NotFound(id.clone());
                self.errors.foreground.raise("Select", &err);
                Err(err)
            }
        }
    }

    pub fn clear_selection(&self) {
        lock(&self.viewer).clear();
    }

    pub async fn go_to_page(&self, page: u32) -> Result<(), ClientError> {
        let request = lock(&self.viewer).go_to_page(page);
        self.load_page(request).await.map(|_| ())
    }

    pub async fn next_page(&self) -> Result<(), ClientError> {
        let request = lock(&self.viewer).next_page();
        self.load_page(request).await.map(|_| ())
    }

    pub async fn previous_page(&self) -> Result<(), ClientError> {
        let request = lock(&self.viewer).previous_page();
        self.load_page(request).await.map(|_| ())
    }

    pub async fn set_page_size(&self, page_size: u32) -> Result<(), ClientError> {
        let request = lock(&self.viewer).set_page_size(page_size);
        self.load_page(request).await.map(|_| ())
    }

    async fn load_page(
        &self,
        request: Option<PageRequest>,
    ) -> Result<Option<PageApplied>, ClientError> {
        let Some(request) = request else {
            return Ok(None);
        };

        let result = self
            .client
            .fetch_page(&request.file_id, request.page, request.page_size)
            .await;

        match lock(&self.viewer).apply(request.seq, result) {
            Ok(applied) => Ok(Some(applied)),
            Err(e) => {
                self.errors.foreground.raise("Loading data", &e);
                Err(e)
            }
        }
    }

    // Deletion

    /// Deletes a file remotely, then drops it from the registry and clears
    /// the viewer if it was selected.
    pub async fn delete_file(&self, id: &FileId) -> Result<(), ClientError> {
        if let Err(e) = self.client.delete_file(id).await {
            self.errors.foreground.raise("Delete", &e);
            return Err(e);
        }

        self.registry.forget(id);
        if lock(&self.viewer).clear_if_selected(id) {
            debug!("Cleared selection of deleted file {}", id);
        }
        let _ = self.refresh_files().await;
        Ok(())
    }

    // Upload

    pub fn upload_state(&self) -> UploadState {
        lock(&self.upload).state().clone()
    }

    pub fn choose_upload(&self, path: &Path) -> Result<(), ClientError> {
        match UploadSource::from_path(path) {
            Ok(source) => {
                self.choose_upload_source(source);
                Ok(())
            }
            Err(e) => {
                self.errors.foreground.raise("Choosing file", &e);
                Err(e)
            }
        }
    }

    pub fn choose_upload_source(&self, source: UploadSource) -> bool {
        lock(&self.upload).select(source)
    }

    pub fn clear_upload(&self) {
        lock(&self.upload).clear_selection();
    }

    /// Uploads the chosen file. On success the selection is cleared and the
    /// registry refreshed right away so the new file shows up.
    pub async fn upload(&self, mode: UploadMode) -> Result<UploadOutcome, ClientError> {
        let source = match lock(&self.upload).begin() {
            Ok(source) => source,
            Err(e) => {
                self.errors.foreground.raise("Upload", &e);
                return Err(e);
            }
        };

        let endpoint = mode.resolve(source.len(), self.large_upload_threshold);
        let controller = Arc::clone(&self.upload);
        let on_progress: ProgressCallback =
            Arc::new(move |percent| lock(&controller).record_progress(percent));

        let result = self.client.upload_file(source, endpoint, on_progress).await;
        lock(&self.upload).finish(&result);

        match result {
            Ok(outcome) => {
                let _ = self.refresh_files().await;
                Ok(outcome)
            }
            Err(e) => {
                self.errors.foreground.raise("Upload", &e);
                Err(e)
            }
        }
    }

    // Errors

    pub fn error(&self) -> Option<String> {
        self.errors.foreground.current()
    }

    pub fn dismiss_error(&self) {
        self.errors.foreground.dismiss();
    }

    pub fn background_failures(&self) -> Vec<BackgroundFailure> {
        self.errors.background.recent()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // PollHandle cancels on drop
        lock(&self.pollers).clear();
    }
}

/// Runs one poll against the session if it is still alive.
async fn poll_with<F, Fut>(weak: Weak<Session>, job: F) -> Result<(), ClientError>
where
    F: FnOnce(Arc<Session>) -> Fut,
    Fut: std::future::Future<Output = Result<(), ClientError>>,
{
    match weak.upgrade() {
        Some(session) => job(session).await,
        None => Ok(()),
    }
}
