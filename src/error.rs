//! Error types for the drive_folder crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when interacting with Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Failed to read credentials file {path}: {source}")]
    CredentialsFileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Remote file name cannot be used as a local file name: {0:?}")]
    InvalidFileName(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Upload did not complete: {0}")]
    UploadIncomplete(String),

    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    #[error("{failed} of {total} files failed")]
    PartialFailure { failed: usize, total: usize },
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
