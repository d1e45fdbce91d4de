use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier assigned by the service when it accepts an upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file known to the service. The client only ever holds read-only copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_id: FileId,
    pub filename: String,
    pub file_size: u64,
    pub status: FileStatus,
    #[serde(default)]
    pub processing_progress: f32,
    #[serde(default)]
    pub total_rows: Option<u64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl UploadedFile {
    pub fn is_completed(&self) -> bool {
        self.status == FileStatus::Completed
    }

    /// Server-side ingestion progress as a fraction in `[0, 1]`.
    pub fn progress_fraction(&self) -> f32 {
        (self.processing_progress / 100.0).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

pub type Row = Map<String, Value>;

/// One window of rows. Boundary flags are computed by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult {
    pub columns: Vec<String>,
    pub data: Vec<Row>,
    pub page: u32,
    pub page_size: u32,
    pub total_rows: u64,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PagedResult {
    /// 1-based number of the first row on this page, 0 for an empty dataset.
    pub fn first_row(&self) -> u64 {
        if self.total_rows == 0 {
            return 0;
        }
        (u64::from(self.page.max(1)) - 1) * u64::from(self.page_size) + 1
    }

    pub fn last_row(&self) -> u64 {
        (u64::from(self.page) * u64::from(self.page_size)).min(self.total_rows)
    }

    pub fn range_label(&self) -> String {
        format!(
            "Showing {} to {} of {} rows",
            self.first_row(),
            self.last_row(),
            crate::format::format_count(self.total_rows)
        )
    }

    pub fn page_label(&self) -> String {
        format!("Page {} of {}", self.page, self.total_pages)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceAmount {
    pub bytes: u64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpaceInfo {
    pub free_space: SpaceAmount,
    pub total_space: SpaceAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_space: Option<SpaceAmount>,
    pub usage_percentage: f32,
}

/// Result of a synchronous small-file upload: the service parsed the whole
/// CSV and describes it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CsvUploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub filename: String,
    pub dataframe_info: DataFrameInfo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataFrameInfo {
    /// `[rows, columns]`
    pub shape: [u64; 2],
    pub columns: Vec<String>,
    #[serde(default)]
    pub dtypes: BTreeMap<String, String>,
    #[serde(default)]
    pub head: Vec<Row>,
    pub info: DataFrameStats,
}

impl DataFrameInfo {
    pub fn rows(&self) -> u64 {
        self.shape[0]
    }

    pub fn column_count(&self) -> u64 {
        self.shape[1]
    }

    /// Memory usage in whole kilobytes.
    pub fn memory_usage_kb(&self) -> u64 {
        (self.info.memory_usage as f64 / 1024.0).round() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataFrameStats {
    pub memory_usage: u64,
    #[serde(default)]
    pub null_counts: BTreeMap<String, u64>,
}

/// Acknowledgement of a queued large-file ingestion.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LargeUploadAck {
    #[serde(default)]
    pub file_id: Option<FileId>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<FileStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Parsed(CsvUploadResponse),
    Queued(LargeUploadAck),
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: u32, page_size: u32, total_rows: u64) -> PagedResult {
        PagedResult {
            columns: vec![],
            data: vec![],
            page,
            page_size,
            total_rows,
            total_pages: 0,
            has_previous: false,
            has_next: false,
        }
    }

    #[test]
    fn range_label_for_middle_page() {
        assert_eq!(page(2, 100, 250).range_label(), "Showing 101 to 200 of 250 rows");
    }

    #[test]
    fn range_label_for_last_partial_page() {
        assert_eq!(page(3, 100, 250).range_label(), "Showing 201 to 250 of 250 rows");
    }

    #[test]
    fn range_label_for_empty_dataset() {
        assert_eq!(page(1, 100, 0).range_label(), "Showing 0 to 0 of 0 rows");
    }

    #[test]
    fn parses_file_list() {
        let body = r#"{"files":[{
            "file_id":"7d3c0a34-7f1b-4a8e-9a44-2b4a6f0d1e55",
            "filename":"big.csv",
            "file_size":2048,
            "status":"processing",
            "processing_progress":42.5,
            "total_rows":null,
            "created_at":"2024-05-01T10:00:00.123456Z"
        }]}"#;
        let list: FileList = serde_json::from_str(body).unwrap();
        let file = &list.files[0];
        assert_eq!(file.status, FileStatus::Processing);
        assert_eq!(file.total_rows, None);
        assert!((file.progress_fraction() - 0.425).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_disk_space() {
        let body = r#"{
            "free_space":{"bytes":1024,"formatted":"1 KB"},
            "total_space":{"bytes":4096,"formatted":"4 KB"},
            "usage_percentage":75.0
        }"#;
        let info: DiskSpaceInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.free_space.bytes, 1024);
        assert!(info.used_space.is_none());
    }
}
