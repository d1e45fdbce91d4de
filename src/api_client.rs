use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::error::{ClientError, GENERIC_SERVER_ERROR, GENERIC_UPLOAD_ERROR};
use crate::models::{
    CsvUploadResponse, DiskSpaceInfo, ErrorPayload, FileId, FileList, HealthStatus,
    LargeUploadAck, PagedResult, UploadOutcome, UploadedFile,
};
use crate::upload::{ProgressCallback, ProgressTracker, UploadEndpoint, UploadSource};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{multipart, Body, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Everything the UI layer needs from the CSV service. Implementations own
/// no view state; they hand results or failures back to the caller.
#[async_trait]
pub trait RemoteData: Send + Sync {
    /// Streams `source` to the chosen upload endpoint. `on_progress` receives
    /// transport-level percentages as bytes are handed to the connection.
    async fn upload_file(
        &self,
        source: UploadSource,
        endpoint: UploadEndpoint,
        on_progress: ProgressCallback,
    ) -> Result<UploadOutcome, ClientError>;

    async fn list_files(&self) -> Result<Vec<UploadedFile>, ClientError>;

    async fn file_status(&self, id: &FileId) -> Result<UploadedFile, ClientError>;

    async fn fetch_page(
        &self,
        id: &FileId,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult, ClientError>;

    /// Deleting a file that is already gone succeeds.
    async fn delete_file(&self, id: &FileId) -> Result<(), ClientError>;

    async fn fetch_disk_space(&self) -> Result<DiskSpaceInfo, ClientError>;

    async fn health_check(&self) -> Result<HealthStatus, ClientError>;
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
    request_timeout: Option<Duration>,
}

impl ApiClient {
    /// Client with the default request timeout.
    pub fn new(base_url: Url) -> Self {
        Self::with_timeout(
            base_url,
            Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        )
    }

    pub fn with_timeout(mut base_url: Url, request_timeout: Option<Duration>) -> Self {
        // Url::join drops the last segment unless the base ends in a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            client: Client::new(),
            base_url,
            request_timeout,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Self> {
        Ok(Self::with_timeout(
            config.base_url()?,
            config.api.request_timeout(),
        ))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.with_request_timeout(self.client.get(url))
    }

    fn delete(&self, url: Url) -> reqwest::RequestBuilder {
        self.with_request_timeout(self.client.delete(url))
    }

    fn with_request_timeout(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteData for ApiClient {
    async fn upload_file(
        &self,
        source: UploadSource,
        endpoint: UploadEndpoint,
        on_progress: ProgressCallback,
    ) -> Result<UploadOutcome, ClientError> {
        let url = self.endpoint(endpoint.path())?;
        let filename = source.filename().to_string();
        let total = source.len();

        info!("Uploading {} ({} bytes) to {}", filename, total, url);

        let mut tracker = ProgressTracker::new(total, on_progress);
        tracker.start();
        let stream = source
            .into_stream()
            .await?
            .inspect_ok(move |chunk| tracker.advance(chunk.len() as u64));

        let part = multipart::Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(filename.clone())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response, GENERIC_UPLOAD_ERROR).await);
        }

        let outcome = match endpoint {
            UploadEndpoint::Small => UploadOutcome::Parsed(
                decode::<CsvUploadResponse>(response).await?,
            ),
            UploadEndpoint::Large => UploadOutcome::Queued(
                decode::<LargeUploadAck>(response).await?,
            ),
        };

        info!("Upload of {} accepted", filename);
        Ok(outcome)
    }

    async fn list_files(&self) -> Result<Vec<UploadedFile>, ClientError> {
        let url = self.endpoint("api/files/")?;
        let response = self.get(url).send().await?;

        if !response.status().is_success() {
            return Err(rejection(response, GENERIC_SERVER_ERROR).await);
        }

        let list: FileList = decode(response).await?;
        debug!("Listed {} files", list.files.len());
        Ok(list.files)
    }

    async fn file_status(&self, id: &FileId) -> Result<UploadedFile, ClientError> {
        let url = self.endpoint(&format!("api/files/{}/", id))?;
        let response = self.get(url).send().await?;

        match response.status() {
            status if status.is_success() => decode(response).await,
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(id.clone())),
            _ => Err(rejection(response, GENERIC_SERVER_ERROR).await),
        }
    }

    async fn fetch_page(
        &self,
        id: &FileId,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult, ClientError> {
        let url = self.endpoint(&format!("api/files/{}/data/", id))?;
        debug!("Fetching page {} (size {}) of {}", page, page_size, id);

        let response = self
            .get(url)
            .query(&[("page", page), ("page_size", page_size)])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => decode(response).await,
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(id.clone())),
            StatusCode::BAD_REQUEST => {
                let message = match rejection(response, GENERIC_SERVER_ERROR).await {
                    ClientError::Rejected { message, .. } => message,
                    other => other.to_string(),
                };
                Err(ClientError::NotReady {
                    id: id.clone(),
                    message,
                })
            }
            _ => Err(rejection(response, GENERIC_SERVER_ERROR).await),
        }
    }

    async fn delete_file(&self, id: &FileId) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("api/files/{}/delete/", id))?;
        let response = self.delete(url).send().await?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(rejection(response, GENERIC_SERVER_ERROR).await);
        }

        info!("Deleted file {}", id);
        Ok(())
    }

    async fn fetch_disk_space(&self) -> Result<DiskSpaceInfo, ClientError> {
        let url = self.endpoint("api/disk-space/")?;
        let response = self.get(url).send().await?;

        if !response.status().is_success() {
            return Err(rejection(response, GENERIC_SERVER_ERROR).await);
        }

        decode(response).await
    }

    async fn health_check(&self) -> Result<HealthStatus, ClientError> {
        let url = self.endpoint("api/health/")?;
        let response = self.get(url).send().await?;

        if !response.status().is_success() {
            return Err(rejection(response, GENERIC_SERVER_ERROR).await);
        }

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Turns a non-success response into `Rejected`, preferring the payload's
/// `{ "error": ... }` text over `fallback`.
async fn rejection(response: Response, fallback: &str) -> ClientError {
    let status = response.status().as_u16();
    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorPayload>(&body)
        .ok()
        .and_then(|payload| payload.error)
        .unwrap_or_else(|| fallback.to_string());

    ClientError::Rejected { status, message }
}
