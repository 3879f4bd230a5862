//! Concurrent download of a whole folder into a local directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::client::FolderClient;
use crate::error::{DriveError, Result};
use crate::models::FileRef;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::report::{BatchReport, ItemOutcome};

/// Options for [`FolderClient::download_images`].
///
/// Unset fields fall back to the client's [`ClientConfig`](crate::ClientConfig).
#[derive(Clone, Default)]
pub struct BulkDownloadOptions {
    pub page_size: Option<u32>,
    pub concurrency: Option<usize>,
    /// Draw a terminal progress bar.
    pub show_progress: bool,
    /// Called once per finished file, in completion order.
    pub on_progress: Option<ProgressCallback>,
}

impl BulkDownloadOptions {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl FolderClient {
    /// Download every file of `folder_id` into `destination`, several at a
    /// time.
    ///
    /// The folder is listed completely before any download starts and the
    /// destination directory is created if missing. Each file is written to
    /// `destination/<name>`, replacing any existing file. Every download is
    /// awaited; failures end up in the report (in listing order) rather than
    /// aborting the others. Only listing or directory creation errors are
    /// returned as `Err`.
    pub async fn download_images<P: AsRef<Path>>(
        &self,
        folder_id: &str,
        destination: P,
        options: BulkDownloadOptions,
    ) -> Result<BatchReport<PathBuf>> {
        let destination = destination.as_ref().to_path_buf();
        let page_size = options.page_size.unwrap_or(self.config().page_size);
        let concurrency = options
            .concurrency
            .unwrap_or(self.config().concurrency)
            .max(1);

        let files = self.list_all(folder_id, page_size).await?;
        tokio::fs::create_dir_all(&destination).await?;

        tracing::info!(
            folder_id,
            files = files.len(),
            concurrency,
            destination = %destination.display(),
            "starting bulk download"
        );

        let tracker = Arc::new(ProgressTracker::new(
            files.len(),
            options.show_progress,
            options.on_progress,
        ));
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DriveError::TaskFailed(e.to_string()))?;
            let client = self.clone();
            let tracker = tracker.clone();
            let directory = destination.clone();
            let task_file = file.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = client.download_into(&task_file, &directory).await;
                tracker.record(result.is_ok());
                result
            });

            handles.push((file, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (file, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracker.record(false);
                    Err(DriveError::TaskFailed(e.to_string()))
                }
            };

            if let Err(e) = &result {
                tracing::warn!(file_id = %file.id, name = %file.name, error = %e, "failed to download file");
            }
            outcomes.push(ItemOutcome { file, result });
        }

        tracker.finish();

        let report = BatchReport { outcomes };
        tracing::info!(
            folder_id,
            downloaded = report.total() - report.failure_count(),
            failed = report.failure_count(),
            "bulk download finished"
        );
        Ok(report)
    }

    async fn download_into(&self, file: &FileRef, directory: &Path) -> Result<PathBuf> {
        let path = directory.join(local_file_name(&file.name)?);
        self.download_to(&file.id, &path).await?;
        Ok(path)
    }
}

/// Use a remote name as a local file name, refusing names that would escape
/// the destination directory.
fn local_file_name(name: &str) -> Result<&str> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(DriveError::InvalidFileName(name.to_string()));
    }
    Ok(name)
}
