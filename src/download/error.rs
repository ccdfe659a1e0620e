//! Error types for the download module.
//!
//! Every gate the downloader applies has its own variant so callers can tell
//! a rejected status from a rejected content type from a local write failure.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching and persisting a document.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL could not be parsed as an absolute http(s) URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS, body read).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the configured ceiling.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with anything other than `200 OK`.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response Content-Type is not a PDF or generic binary stream.
    #[error("invalid content type for {url}: {content_type:?} (expected PDF)")]
    ContentType {
        /// The URL whose response was rejected.
        url: String,
        /// The Content-Type header value, empty when absent.
        content_type: String,
    },

    /// The server answered 200 with an empty body.
    #[error("downloaded 0 bytes for {url}; not creating file")]
    EmptyBody {
        /// The URL that returned no bytes.
        url: String,
    },

    /// File system error while writing the document.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// Coarse failure category, stable for counting and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// URL did not parse.
    InvalidUrl,
    /// Connection or transfer failure.
    Network,
    /// Request exceeded its ceiling.
    Timeout,
    /// Non-200 status.
    RejectedStatus,
    /// Unexpected Content-Type.
    RejectedType,
    /// Zero-byte body.
    EmptyBody,
    /// Local write failure (including client construction).
    Io,
}

impl FailureKind {
    /// Returns the stable label used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RejectedStatus => "rejected_status",
            Self::RejectedType => "rejected_type",
            Self::EmptyBody => "empty_body",
            Self::Io => "io_error",
        }
    }

    /// Whether a later run could plausibly succeed without any change on our side.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DownloadError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content-type rejection.
    pub fn content_type(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::ContentType {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates an empty-body rejection.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps the error onto its failure category.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidUrl { .. } => FailureKind::InvalidUrl,
            Self::Network { .. } => FailureKind::Network,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::HttpStatus { .. } => FailureKind::RejectedStatus,
            Self::ContentType { .. } => FailureKind::RejectedType,
            Self::EmptyBody { .. } => FailureKind::EmptyBody,
            Self::Io { .. } | Self::ClientBuild { .. } => FailureKind::Io,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path, which the source errors do not carry.
