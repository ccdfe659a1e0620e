//! Document downloader with skip-if-present semantics.
//!
//! This module fetches a single document URL into a flat output directory.
//!
//! # Features
//!
//! - Deterministic local names derived from the URL ([`url_to_filename`])
//! - Existing files are never re-requested or overwritten
//! - Strict gates: exact `200`, PDF/octet-stream content type, non-empty body
//! - Temp-file + hard-link persistence, so a failed write never leaves a
//!   partial file under the final name
//! - Structured outcomes ([`DownloadOutcome`]) and errors ([`DownloadError`])
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::download::PdfDownloader;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = PdfDownloader::new()?;
//! let fetched = downloader
//!     .download_pdf("https://radiolink.com/filedownload/114468", Path::new("PDFs"))
//!     .await;
//! println!("new file: {fetched}");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod filename;

pub use client::{DownloadOutcome, PdfDownloader};
pub use error::{DownloadError, FailureKind};
pub use filename::{target_filename, url_to_filename};
