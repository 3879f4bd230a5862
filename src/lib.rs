//! drive_folder - list, download, upload and clear a Google Drive folder.
//!
//! This library provides functionality to:
//! - Lazily list the files of a folder, page by page
//! - Download single files into memory or to disk
//! - Download a whole folder concurrently, with per-file outcomes
//! - Upload files through resumable sessions
//! - Delete every file of a folder while keeping the folder
//!
//! # Example
//!
//! ```no_run
//! use drive_folder::{BulkDownloadOptions, FolderClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = FolderClient::from_credentials_file("service-account.json")?;
//!
//!     let report = client
//!         .download_images("folder-id", "images", BulkDownloadOptions::default())
//!         .await?;
//!     for (file, error) in report.failed() {
//!         eprintln!("{}: {}", file.name, error);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod models;
pub mod progress;
pub mod report;

// Re-exports for convenience
pub use auth::Authenticator;
pub use bulk::BulkDownloadOptions;
pub use client::FolderClient;
pub use config::ClientConfig;
pub use error::{DriveError, Result};
pub use id::DriveId;
pub use models::{Downloaded, FileRef};
pub use progress::{BulkProgress, ProgressCallback};
pub use report::{BatchReport, ItemOutcome};
