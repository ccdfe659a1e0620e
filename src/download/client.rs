//! HTTP downloader for harvested documents.
//!
//! This module provides the `PdfDownloader` struct, which applies the fetch
//! gates (already on disk, status, content type, empty body) and persists
//! accepted bodies without ever exposing a half-written file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use futures_util::StreamExt;
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{ACCEPTED_CONTENT_TYPES, CONNECT_TIMEOUT, DOWNLOAD_TIMEOUT};
use super::error::DownloadError;
use super::filename::target_filename;
use crate::user_agent::BROWSER_USER_AGENT;

/// Successful result of a download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The document was fetched and written to `path`.
    Fetched {
        /// Final output path.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// A file already occupies the target path; nothing was requested or written.
    AlreadyPresent {
        /// The existing file.
        path: PathBuf,
    },
    /// Another task of this downloader is already fetching the same target.
    ///
    /// Nothing was requested; the owning task reports whether the file landed.
    Deferred {
        /// The contested target path.
        path: PathBuf,
    },
}

impl DownloadOutcome {
    /// Target path of the document.
    ///
    /// For [`Deferred`](Self::Deferred) the file may not exist yet, or ever.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Fetched { path, .. } | Self::AlreadyPresent { path } | Self::Deferred { path } => {
                path
            }
        }
    }

    /// Whether this attempt wrote a new file.
    #[must_use]
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }
}

/// Downloads documents into a flat output directory.
///
/// Created once and shared (cheaply cloneable) across downloads so the
/// underlying connection pool and the in-flight claim set are reused.
///
/// # Example
///
/// ```no_run
/// use harvester_core::download::PdfDownloader;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = PdfDownloader::new()?;
/// let outcome = downloader
///     .fetch("https://radiolink.com/filedownload/114468", Path::new("PDFs"))
///     .await?;
/// println!("{}", outcome.path().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PdfDownloader {
    client: Client,
    in_flight: Arc<DashSet<PathBuf>>,
}

impl PdfDownloader {
    /// Creates a downloader with the 15 minute request ceiling and the shared
    /// browser User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_settings(DOWNLOAD_TIMEOUT, BROWSER_USER_AGENT)
    }

    /// Creates a downloader with an explicit request ceiling and User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the client cannot be built.
    #[instrument(level = "debug", skip(user_agent))]
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self {
            client,
            in_flight: Arc::new(DashSet::new()),
        })
    }

    /// Fetches `url` into `output_dir`, returning what happened.
    ///
    /// Gates, in order; the first failing gate ends the attempt:
    /// 1. another task is fetching the same path → [`DownloadOutcome::Deferred`];
    ///    a file already exists at the derived path → [`DownloadOutcome::AlreadyPresent`]
    /// 2. GET with the configured timeout and User-Agent
    /// 3. status must be exactly `200`
    /// 4. Content-Type must be a PDF or generic octet-stream
    /// 5. body must be non-empty
    /// 6. bytes are written to a temp file and linked into place without clobbering
    ///
    /// # Errors
    ///
    /// One [`DownloadError`] variant per failed gate; see [`DownloadError::kind`].
    #[instrument(skip(self, output_dir), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        output_dir: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let file_path = output_dir.join(target_filename(url));

        let Some(_claim) = InFlightClaim::acquire(&self.in_flight, &file_path) else {
            debug!(path = %file_path.display(), "download already in flight, deferring");
            return Ok(DownloadOutcome::Deferred { path: file_path });
        };
        if is_existing_file(&file_path).await {
            debug!(path = %file_path.display(), "file already exists, skipping");
            return Ok(DownloadOutcome::AlreadyPresent { path: file_path });
        }

        let body = self.fetch_body(url).await?;
        let bytes = body.len() as u64;
        if !persist_no_clobber(&file_path, &body).await? {
            debug!(path = %file_path.display(), "file appeared during download, keeping existing");
            return Ok(DownloadOutcome::AlreadyPresent { path: file_path });
        }

        info!(bytes, path = %file_path.display(), "download complete");
        Ok(DownloadOutcome::Fetched {
            path: file_path,
            bytes,
        })
    }

    /// Boolean form of [`fetch`](Self::fetch): `true` only when a new file was written.
    ///
    /// Every other result, including "already present", is logged and reported as `false`.
    pub async fn download_pdf(&self, url: &str, output_dir: &Path) -> bool {
        match self.fetch(url, output_dir).await {
            Ok(DownloadOutcome::Fetched { .. }) => true,
            Ok(DownloadOutcome::AlreadyPresent { path }) => {
                info!(path = %path.display(), "file already exists, skipping");
                false
            }
            Ok(DownloadOutcome::Deferred { path }) => {
                debug!(path = %path.display(), "download already in flight elsewhere");
                false
            }
            Err(error) => {
                warn!(url = %url, kind = %error.kind(), error = %error, "download failed");
                false
            }
        }
    }

    /// Sends the request, checks status and type, and buffers the body.
    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_accepted_content_type(&content_type) {
            return Err(DownloadError::content_type(url, content_type));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_reqwest_error(url, e))?;
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(DownloadError::empty_body(url));
        }
        debug!(bytes = body.len(), content_type = %content_type, "response body buffered");
        Ok(body)
    }
}

fn classify_reqwest_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

/// Case-insensitive check against [`ACCEPTED_CONTENT_TYPES`]; parameters such
/// as `; charset=` are tolerated.
pub(crate) fn is_accepted_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    ACCEPTED_CONTENT_TYPES
        .iter()
        .any(|accepted| lowered.contains(accepted))
}

async fn is_existing_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Writes `bytes` to a sibling temp file, then hard-links it to `target`.
///
/// Returns `Ok(false)` when `target` already exists; it is never overwritten.
/// The temp file is removed on every path.
async fn persist_no_clobber(target: &Path, bytes: &[u8]) -> Result<bool, DownloadError> {
    let temp_path = temp_path_for(target);
    let result = write_then_link(&temp_path, target, bytes).await;
    if let Err(e) = tokio::fs::remove_file(&temp_path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
    }
    result
}

async fn write_then_link(
    temp_path: &Path,
    target: &Path,
    bytes: &[u8],
) -> Result<bool, DownloadError> {
    let mut file: File = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    drop(file);

    match tokio::fs::hard_link(temp_path, target).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(DownloadError::io(target, e)),
    }
}

/// `dir/.name.XXXXXXXX.part` next to `target`.
fn temp_path_for(target: &Path) -> PathBuf {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{suffix}.part"))
}

/// RAII claim on a target path in the in-flight set.
struct InFlightClaim<'a> {
    set: &'a DashSet<PathBuf>,
    path: PathBuf,
}

impl<'a> InFlightClaim<'a> {
    fn acquire(set: &'a DashSet<PathBuf>, path: &Path) -> Option<Self> {
        set.insert(path.to_path_buf()).then(|| Self {
            set,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.path);
    }
}
