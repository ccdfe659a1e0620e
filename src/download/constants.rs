//! Constants for the download module (timeouts, accepted content types).

use std::time::Duration;

/// Hard ceiling on a single file request, including the body transfer (15 minutes).
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Connect timeout for the download client (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Content-Type fragments accepted as a PDF payload.
///
/// Many manufacturer CDNs label PDFs with a generic octet-stream type.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "binary/octet-stream",
    "application/octet-stream",
];

/// Extension appended when a sanitized name carries none.
pub const DEFAULT_EXTENSION: &str = ".pdf";
