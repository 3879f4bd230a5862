//! Google Drive API client scoped to folder operations.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, Downloaded, FileListResponse, FileRef};
use crate::report::{BatchReport, ItemOutcome};

/// Fields requested for every file entry.
const FILE_FIELDS: &str = "id, name, mimeType";

/// Client for listing, transferring and deleting the files of a Drive folder.
///
/// Cloning is cheap; clones share the HTTP connection pool and token cache.
#[derive(Clone)]
pub struct FolderClient {
    auth: Authenticator,
    http: Client,
    config: Arc<ClientConfig>,
}

enum ChunkStatus {
    /// Upload finished; the server returned the new file.
    Done(FileRef),
    /// Session still open; the server has committed this many bytes.
    Incomplete(u64),
}

impl FolderClient {
    /// Create a new FolderClient.
    ///
    /// Redirects are never followed: Drive answers an unfinished resumable
    /// upload with `308`.
    pub fn new(auth: Authenticator, config: ClientConfig) -> Result<Self> {
        let http = Client::builder().redirect(Policy::none()).build()?;
        Ok(Self {
            auth,
            http,
            config: Arc::new(config),
        })
    }

    /// Create a client with default settings from a service account key file.
    pub fn from_credentials_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let auth = Authenticator::from_file(path)?;
        Self::new(auth, ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Lazily list the non-trashed files directly under `folder_id`.
    ///
    /// One request per page of up to `page_size` entries, issued as the
    /// stream is polled; entries come out in server order. Each call starts
    /// again from the first page.
    pub fn list_files(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> impl Stream<Item = Result<FileRef>> + '_ {
        let query = format!(
            "'{}' in parents and trashed = false",
            folder_id.replace('\'', "\\'")
        );

        paginate(move |cursor| {
            let query = query.clone();
            async move { self.fetch_page(&query, page_size, cursor).await }
        })
        .map_ok(|page| stream::iter(page.files.into_iter().map(Ok::<FileRef, DriveError>)))
        .try_flatten()
    }

    /// Collect the whole listing of `folder_id`.
    pub async fn list_all(&self, folder_id: &str, page_size: u32) -> Result<Vec<FileRef>> {
        self.list_files(folder_id, page_size).try_collect().await
    }

    async fn fetch_page(
        &self,
        query: &str,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<FileListResponse> {
        let token = self.auth.get_access_token().await?;
        let page_size = page_size.max(1).to_string();
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);

        tracing::debug!(%query, cursor = cursor.as_deref(), "fetching file list page");

        // pageSize goes last so a following pageToken is the only thing that
        // distinguishes continuation requests.
        let mut request = self
            .http
            .get(format!("{}/files", self.config.api_base))
            .bearer_auth(&token)
            .query(&[
                ("q", query),
                ("fields", fields.as_str()),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
                ("pageSize", page_size.as_str()),
            ]);

        if let Some(ref cursor) = cursor {
            request = request.query(&[("pageToken", cursor)]);
        }

        let response = error_for_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Download a file into memory (`destination` is `None`) or stream it to
    /// `destination`, which is created or replaced. The parent directory
    /// must already exist.
    pub async fn download_file(
        &self,
        file_id: &str,
        destination: Option<&Path>,
    ) -> Result<Downloaded> {
        match destination {
            None => self.download_bytes(file_id).await.map(Downloaded::Bytes),
            Some(path) => {
                let bytes = self.download_to(file_id, path).await?;
                Ok(Downloaded::Written {
                    path: path.to_path_buf(),
                    bytes,
                })
            }
        }
    }

    /// Download a file's content into memory.
    pub async fn download_bytes(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self.fetch_media(file_id).await?;
        let content = response.bytes().await?;
        tracing::debug!(file_id, bytes = content.len(), "file downloaded to memory");
        Ok(content.to_vec())
    }

    /// Stream a file's content to a local path, returning the bytes written.
    ///
    /// Content goes to a temporary file next to `destination`, which is
    /// renamed into place once the whole body has arrived. A failed download
    /// leaves `destination` untouched.
    pub async fn download_to<P: AsRef<Path>>(&self, file_id: &str, destination: P) -> Result<u64> {
        let destination = destination.as_ref();
        let response = self.fetch_media(file_id).await?;

        let directory = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(".drive-")
            .suffix(".part")
            .tempfile_in(directory)?
            .into_parts();

        let mut file = File::from_std(file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        drop(file);
        temp_path.persist(destination).map_err(|e| e.error)?;

        tracing::info!(file_id, path = %destination.display(), bytes = written, "file downloaded");
        Ok(written)
    }

    async fn fetch_media(&self, file_id: &str) -> Result<Response> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.config.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;

        error_for_status(response).await
    }

    /// Download every file of a folder, one at a time, yielding contents in
    /// listing order.
    ///
    /// Entries are not filtered by type: anything in the folder is yielded.
    pub fn iter_images(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> impl Stream<Item = Result<Vec<u8>>> + '_ {
        self.list_files(folder_id, page_size)
            .and_then(move |file| async move { self.download_bytes(&file.id).await })
    }

    /// Upload a local file into `folder_id` through a resumable session.
    ///
    /// The remote name defaults to the local file name. A new file is always
    /// created, even if one with the same name exists.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        folder_id: &str,
        file_name: Option<&str>,
    ) -> Result<FileRef> {
        let local_path = file_path.as_ref();
        let name = match file_name {
            Some(name) => name.to_string(),
            None => local_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| DriveError::InvalidFileName(local_path.display().to_string()))?,
        };

        let file = File::open(local_path).await?;
        let total_size = file.metadata().await?.len();
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let session_uri = self
            .start_resumable_upload(&name, folder_id, &mime_type, total_size)
            .await?;
        let uploaded = self.upload_chunks(&session_uri, file, total_size).await?;

        tracing::info!(id = %uploaded.id, name = %uploaded.name, bytes = total_size, "file uploaded");
        Ok(uploaded)
    }

    /// Open a resumable upload session and return its URI.
    async fn start_resumable_upload(
        &self,
        name: &str,
        folder_id: &str,
        mime_type: &str,
        total_size: u64,
    ) -> Result<String> {
        let token = self.auth.get_access_token().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id]
        });

        let response = self
            .http
            .post(format!("{}/files", self.config.upload_base))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", total_size.to_string())
            .json(&metadata)
            .send()
            .await?;

        let response = error_for_status(response).await?;

        let session_uri = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DriveError::UploadIncomplete("no upload URI in response".to_string()))?
            .to_string();

        tracing::debug!(name, total_size, "resumable upload session started");
        Ok(session_uri)
    }

    /// Send the file in chunks, continuing after whatever range the server
    /// reports as committed.
    async fn upload_chunks(&self, session_uri: &str, file: File, total_size: u64) -> Result<FileRef> {
        let chunk_size = self.config.upload_chunk_size();

        if total_size == 0 {
            return match self.put_chunk(session_uri, &[], 0, 0).await? {
                ChunkStatus::Done(uploaded) => Ok(uploaded),
                ChunkStatus::Incomplete(_) => Err(DriveError::UploadIncomplete(
                    "server did not accept empty file".to_string(),
                )),
            };
        }

        let mut stream = ReaderStream::with_capacity(file, chunk_size);
        let mut buffer: Vec<u8> = Vec::with_capacity(chunk_size);
        let mut offset = 0u64;
        let mut exhausted = false;

        loop {
            while !exhausted && buffer.len() < chunk_size {
                match stream.next().await {
                    Some(bytes) => buffer.extend_from_slice(&bytes?),
                    None => exhausted = true,
                }
            }

            if buffer.is_empty() {
                return Err(DriveError::UploadIncomplete(format!(
                    "server committed {} of {} bytes",
                    offset, total_size
                )));
            }

            let len = buffer.len().min(chunk_size);
            match self.put_chunk(session_uri, &buffer[..len], offset, total_size).await? {
                ChunkStatus::Done(uploaded) => return Ok(uploaded),
                ChunkStatus::Incomplete(committed) => {
                    if committed <= offset || committed > offset + len as u64 {
                        return Err(DriveError::UploadIncomplete(format!(
                            "server committed {} bytes after receiving bytes {}-{}",
                            committed,
                            offset,
                            offset + len as u64 - 1
                        )));
                    }
                    buffer.drain(..(committed - offset) as usize);
                    offset = committed;
                    tracing::debug!(offset, total_size, "upload chunk committed");
                }
            }
        }
    }

    async fn put_chunk(
        &self,
        session_uri: &str,
        data: &[u8],
        start: u64,
        total_size: u64,
    ) -> Result<ChunkStatus> {
        let content_range = if data.is_empty() {
            format!("bytes */{}", total_size)
        } else {
            format!(
                "bytes {}-{}/{}",
                start,
                start + data.len() as u64 - 1,
                total_size
            )
        };

        let response = self
            .http
            .put(session_uri)
            .header(CONTENT_RANGE, content_range)
            .body(data.to_vec())
            .send()
            .await?;

        // 308 Resume Incomplete
        if response.status() == StatusCode::PERMANENT_REDIRECT {
            let committed = response
                .headers()
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(committed_bytes)
                .unwrap_or(0);
            return Ok(ChunkStatus::Incomplete(committed));
        }

        let response = error_for_status(response).await?;
        Ok(ChunkStatus::Done(response.json().await?))
    }

    /// Delete a file by ID. A file that is already gone counts as deleted.
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .delete(format!("{}/files/{}", self.config.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        error_for_status(response).await?;

        Ok(())
    }

    /// Delete every file directly under `folder_id`, keeping the folder.
    ///
    /// The listing is collected before deleting anything. Subfolders are
    /// deleted as single entries. Only a listing failure is an `Err`;
    /// per-file failures are recorded in the report.
    pub async fn delete_folder_contents(&self, folder_id: &str) -> Result<BatchReport<()>> {
        let files = self.list_all(folder_id, self.config.page_size).await?;
        let mut outcomes = Vec::with_capacity(files.len());

        for file in files {
            let result = self.delete_file(&file.id).await;
            match &result {
                Ok(()) => tracing::info!(file_id = %file.id, name = %file.name, "deleted file"),
                Err(e) => {
                    tracing::warn!(file_id = %file.id, name = %file.name, error = %e, "failed to delete file")
                }
            }
            outcomes.push(ItemOutcome { file, result });
        }

        let report = BatchReport { outcomes };
        tracing::info!(
            folder_id,
            deleted = report.total() - report.failure_count(),
            failed = report.failure_count(),
            "folder contents deleted"
        );
        Ok(report)
    }
}

/// Turn a non-success response into `DriveError::ApiError`, preferring the
/// message from Google's JSON error body.
async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

/// Drive a cursor-paginated listing: call `fetch` with no cursor, then with
/// each returned cursor until a page comes back without one.
fn paginate<F, Fut>(fetch: F) -> impl Stream<Item = Result<FileListResponse>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<FileListResponse>>,
{
    stream::try_unfold((fetch, Some(None)), |(mut fetch, cursor)| async move {
        let Some(cursor) = cursor else {
            return Ok(None);
        };
        let page = fetch(cursor).await?;
        let next = page.cursor().map(|c| Some(c.to_string()));
        Ok::<_, DriveError>(Some((page, (fetch, next))))
    })
}

/// Parse a resumable-upload `Range: bytes=0-N` header into a byte count.
fn committed_bytes(range: &str) -> Option<u64> {
    let (_, end) = range.strip_prefix("bytes=")?.split_once('-')?;
    end.trim().parse::<u64>().ok().map(|end| end + 1)
}
