//! PDF Harvester Core Library
//!
//! Renders a manufacturer's download-listing page in a headless browser,
//! extracts the `/filedownload/<id>` links from the resulting markup and
//! fetches each linked document into a flat output directory, skipping
//! files that are already on disk.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`render`] - Headless Chrome rendering behind the [`PageRenderer`] trait
//! - [`extract`] - Download link extraction and URL resolution
//! - [`download`] - Filename derivation and the gated, no-clobber downloader
//! - [`pipeline`] - Render → extract → download orchestration
//! - [`validate`] - Post-download PDF validation pass
//! - [`config`] - Run configuration and the optional TOML overlay

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod extract;
pub mod pipeline;
pub mod render;
pub mod user_agent;
pub mod validate;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, PipelineMode, ScrapeConfig};
pub use download::{
    DownloadError, DownloadOutcome, FailureKind, PdfDownloader, target_filename, url_to_filename,
};
pub use extract::{dedupe_links, extract_download_paths, is_url_valid, resolve_download_url};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, PipelineStats};
pub use render::{
    ChromeRenderer, PageRenderer, RenderError, RenderSettings, RenderedPage, WaitCondition,
    render_or_blank, render_or_empty,
};
pub use validate::{ValidateError, ValidationReport, validate_directory};
