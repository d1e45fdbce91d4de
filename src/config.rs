use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const PAGE_SIZE_OPTIONS: [u32; 5] = [50, 100, 500, 1000, 5000];

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_FILES_POLL_MS: u64 = 2_000;
const DEFAULT_DISK_POLL_MS: u64 = 30_000;
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_LARGE_UPLOAD_THRESHOLD: u64 = 100 * 1024 * 1024; // 100MB
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Applies to everything except uploads, which may run for hours.
    /// `null` disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> Option<u64> {
    Some(DEFAULT_REQUEST_TIMEOUT_SECS)
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_files_poll_ms")]
    pub files_interval_ms: u64,
    #[serde(default = "default_disk_poll_ms")]
    pub disk_space_interval_ms: u64,
}

fn default_files_poll_ms() -> u64 {
    DEFAULT_FILES_POLL_MS
}

fn default_disk_poll_ms() -> u64 {
    DEFAULT_DISK_POLL_MS
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            files_interval_ms: DEFAULT_FILES_POLL_MS,
            disk_space_interval_ms: DEFAULT_DISK_POLL_MS,
        }
    }
}

impl PollingConfig {
    pub fn files_interval(&self) -> Duration {
        Duration::from_millis(self.files_interval_ms)
    }

    pub fn disk_space_interval(&self) -> Duration {
        Duration::from_millis(self.disk_space_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Files above this size go to the asynchronous large-file endpoint.
    #[serde(default = "default_large_upload_threshold")]
    pub large_file_threshold_bytes: u64,
}

fn default_large_upload_threshold() -> u64 {
    DEFAULT_LARGE_UPLOAD_THRESHOLD
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            large_file_threshold_bytes: DEFAULT_LARGE_UPLOAD_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_json::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Builds a config from `CSV_PAGER_*` variables; anything unset keeps its default.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("CSV_PAGER_API_URL") {
            config.api.base_url = url;
        }
        if let Some(ms) = env_number("CSV_PAGER_FILES_POLL_MS")? {
            config.polling.files_interval_ms = ms;
        }
        if let Some(ms) = env_number("CSV_PAGER_DISK_POLL_MS")? {
            config.polling.disk_space_interval_ms = ms;
        }
        if let Some(size) = env_number("CSV_PAGER_PAGE_SIZE")? {
            config.viewer.default_page_size = u32::try_from(size)
                .context("CSV_PAGER_PAGE_SIZE is out of range")?;
        }
        if let Some(secs) = env_number("CSV_PAGER_REQUEST_TIMEOUT_SECS")? {
            config.api.request_timeout_secs = Some(secs);
        }
        if let Some(bytes) = env_number("CSV_PAGER_LARGE_UPLOAD_THRESHOLD")? {
            config.upload.large_file_threshold_bytes = bytes;
        }

        config.validate()?;
        Ok(config)
    }

    /// Uses the file at the default location when present, the environment otherwise.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Self::from_env(),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("csv-pager").join("config.json"))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }
        fs::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))
    }

    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.polling.files_interval_ms == 0 || self.polling.disk_space_interval_ms == 0 {
            return Err(anyhow!("Polling intervals must be greater than zero"));
        }
        if self.api.request_timeout_secs == Some(0) {
            return Err(anyhow!("Request timeout must be greater than zero"));
        }
        if !PAGE_SIZE_OPTIONS.contains(&self.viewer.default_page_size) {
            return Err(anyhow!(
                "Default page size {} is not one of {:?}",
                self.viewer.default_page_size,
                PAGE_SIZE_OPTIONS
            ));
        }
        Ok(())
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a number", name)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.polling.files_interval(), Duration::from_secs(2));
        assert_eq!(config.polling.disk_space_interval(), Duration::from_secs(30));
        assert_eq!(config.viewer.default_page_size, 100);
        assert_eq!(config.api.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api":{"base_url":"http://csv.internal:9000"}}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api.base_url, "http://csv.internal:9000");
        assert_eq!(config.polling.files_interval_ms, 2_000);
        assert_eq!(config.api.request_timeout_secs, Some(30));
    }

    #[test]
    fn request_timeout_can_be_disabled_but_not_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"api":{"base_url":"http://localhost:8000","request_timeout_secs":null}}"#,
        )
        .unwrap();
        assert_eq!(Config::from_file(&path).unwrap().api.request_timeout(), None);

        let mut config = Config::default();
        config.api.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_page_size() {
        let mut config = Config::default();
        config.viewer.default_page_size = 42;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.viewer.default_page_size = 500;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.viewer.default_page_size, 500);
    }
}
