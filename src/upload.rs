use crate::error::ClientError;
use crate::models::UploadOutcome;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

const MEMORY_CHUNK_SIZE: usize = 64 * 1024;

/// Receives transport progress in percent, `0.0..=100.0`.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEndpoint {
    /// Synchronous upload; the service parses the CSV before answering.
    Small,
    /// Accepted immediately and ingested in the background.
    Large,
}

impl UploadEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            UploadEndpoint::Small => "api/upload-csv/",
            UploadEndpoint::Large => "api/upload-large-csv/",
        }
    }

    /// Anything bigger than `threshold` bytes goes to the background ingester.
    pub fn for_size(size: u64, threshold: u64) -> Self {
        if size > threshold {
            UploadEndpoint::Large
        } else {
            UploadEndpoint::Small
        }
    }
}

#[derive(Debug, Clone)]
enum SourceBody {
    Disk(PathBuf),
    Memory(Bytes),
}

/// A file chosen for upload. On-disk sources are streamed, never read whole.
#[derive(Debug, Clone)]
pub struct UploadSource {
    filename: String,
    len: u64,
    body: SourceBody,
}

impl UploadSource {
    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(ClientError::validation(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv")
            .to_string();

        Ok(Self {
            filename,
            len: metadata.len(),
            body: SourceBody::Disk(path.to_path_buf()),
        })
    }

    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            filename: filename.into(),
            len: data.len() as u64,
            body: SourceBody::Memory(data),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.body {
            SourceBody::Disk(path) => Some(path),
            SourceBody::Memory(_) => None,
        }
    }

    pub(crate) async fn into_stream(
        self,
    ) -> Result<BoxStream<'static, std::io::Result<Bytes>>, ClientError> {
        match self.body {
            SourceBody::Disk(path) => {
                let file = tokio::fs::File::open(&path).await?;
                Ok(ReaderStream::new(file).boxed())
            }
            SourceBody::Memory(data) => {
                let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                    .step_by(MEMORY_CHUNK_SIZE)
                    .map(|start| {
                        let end = (start + MEMORY_CHUNK_SIZE).min(data.len());
                        Ok(data.slice(start..end))
                    })
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
        }
    }
}

/// Converts bytes handed to the transport into percentages. Only ever
/// reports a value larger than the previous one.
pub struct ProgressTracker {
    total: u64,
    sent: u64,
    last_reported: Option<f32>,
    callback: ProgressCallback,
}

impl ProgressTracker {
    pub fn new(total: u64, callback: ProgressCallback) -> Self {
        Self {
            total,
            sent: 0,
            last_reported: None,
            callback,
        }
    }

    pub fn start(&mut self) {
        self.report(0.0);
    }

    pub fn advance(&mut self, bytes: u64) {
        self.sent = self.sent.saturating_add(bytes).min(self.total);
        let percent = if self.total == 0 {
            100.0
        } else {
            ((self.sent as f64 * 100.0) / self.total as f64).round() as f32
        };
        self.report(percent);
    }

    fn report(&mut self, percent: f32) {
        if self.last_reported.is_some_and(|last| percent <= last) {
            return;
        }
        self.last_reported = Some(percent);
        (self.callback)(percent);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Selecting,
    Uploading,
}

#[derive(Debug, Clone, Default)]
pub struct UploadState {
    pub selected: Option<UploadSource>,
    pub uploading: bool,
    pub progress: f32,
    pub error: Option<String>,
    pub last_outcome: Option<UploadOutcome>,
}

/// Idle -> Selecting -> Uploading -> Idle. One upload at a time.
#[derive(Debug, Default)]
pub struct UploadController {
    state: UploadState,
}

impl UploadController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn phase(&self) -> UploadPhase {
        if self.state.uploading {
            UploadPhase::Uploading
        } else if self.state.selected.is_some() {
            UploadPhase::Selecting
        } else {
            UploadPhase::Idle
        }
    }

    /// Choosing a new file is ignored while an upload is running.
    pub fn select(&mut self, source: UploadSource) -> bool {
        if self.state.uploading {
            return false;
        }
        self.state.selected = Some(source);
        self.state.error = None;
        self.state.last_outcome = None;
        self.state.progress = 0.0;
        true
    }

    pub fn clear_selection(&mut self) {
        if !self.state.uploading {
            self.state.selected = None;
        }
    }

    /// Moves to `Uploading` and hands out the source to send.
    pub fn begin(&mut self) -> Result<UploadSource, ClientError> {
        if self.state.uploading {
            return Err(ClientError::validation("An upload is already in progress"));
        }
        let source = self
            .state
            .selected
            .clone()
            .ok_or_else(|| ClientError::validation("Please select a file first"))?;

        self.state.uploading = true;
        self.state.progress = 0.0;
        self.state.error = None;
        self.state.last_outcome = None;
        Ok(source)
    }

    pub fn record_progress(&mut self, percent: f32) {
        if !self.state.uploading {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent > self.state.progress {
            self.state.progress = percent;
        }
    }

    pub fn finish(&mut self, result: &Result<UploadOutcome, ClientError>) {
        self.state.uploading = false;
        match result {
            Ok(outcome) => {
                debug!("Upload finished");
                self.state.selected = None;
                self.state.progress = 100.0;
                self.state.last_outcome = Some(outcome.clone());
            }
            Err(e) => {
                self.state.error = Some(e.to_string());
            }
        }
    }
}
