use crate::models::FileId;
use thiserror::Error;

pub const GENERIC_UPLOAD_ERROR: &str = "An error occurred while uploading the file";
pub const GENERIC_SERVER_ERROR: &str = "The server returned an error";

#[derive(Error, Debug)]
pub enum ClientError {
    /// Caught locally, never reaches the network.
    #[error("{0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-success status. `message` is the
    /// payload's `error` field when present, a generic text otherwise.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("File {0} not found")]
    NotFound(FileId),

    #[error("File {id} is not ready: {message}")]
    NotReady { id: FileId, message: String },

    #[error("Invalid response from server: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// Not-found answers count as success for idempotent operations.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::NotFound(_) | ClientError::Rejected { status: 404, .. }
        )
    }
}
