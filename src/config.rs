//! Client configuration.

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Entries requested per listing call.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Resumable upload chunks must be a multiple of this.
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

const MAX_DEFAULT_CONCURRENCY: usize = 32;

/// Worker count for bulk downloads: available parallelism plus a few extra
/// slots for I/O-bound work, capped at 32.
pub fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 4).min(MAX_DEFAULT_CONCURRENCY)
}

/// Settings for a [`FolderClient`](crate::FolderClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub upload_base: String,
    pub page_size: u32,
    pub concurrency: usize,
    upload_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: default_concurrency(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    /// Point both the metadata and upload endpoints at `base`, e.g. a local
    /// mock server. Uploads go to `<base>/upload`.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_base = base.to_string();
        self.upload_base = format!("{}/upload", base);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the resumable upload chunk size, rounded up to a multiple of
    /// 256 KiB.
    pub fn with_upload_chunk_size(mut self, bytes: usize) -> Self {
        let chunks = bytes.div_ceil(UPLOAD_CHUNK_GRANULARITY).max(1);
        self.upload_chunk_size = chunks * UPLOAD_CHUNK_GRANULARITY;
        self
    }

    pub fn upload_chunk_size(&self) -> usize {
        self.upload_chunk_size
    }
}
