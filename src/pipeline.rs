//! Render → extract → download orchestration.
//!
//! [`Pipeline::run`] makes sure the output directory exists, renders the
//! source page once, extracts `/filedownload/<id>` links and then either logs
//! them ([`PipelineMode::ListOnly`]) or resolves each one against the page the
//! browser ended on and hands it to the downloader.
//!
//! # Concurrency Model
//!
//! - With `concurrency == 1` downloads run one after another, in link order
//! - Otherwise each download runs in its own Tokio task
//! - A semaphore permit is acquired before spawning each download task and
//!   released when the task finishes (RAII)
//! - The downloader's in-flight claims keep skip-if-exists exact under overlap
//!
//! Individual failures never fail the run; they are counted in [`PipelineStats`].

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::{MAX_CONCURRENCY, PipelineMode, ScrapeConfig};
use crate::download::{DownloadOutcome, FailureKind, PdfDownloader};
use crate::extract::{dedupe_links, extract_download_paths, resolve_download_url};
use crate::render::{PageRenderer, render_or_blank};

/// Errors that stop a run before any work is attempted.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Concurrency outside `1..=32`.
    #[error("invalid concurrency value {value}: must be between 1 and {MAX_CONCURRENCY}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Per-run counters, updated from concurrent download tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    fetched: AtomicUsize,
    already_present: AtomicUsize,
    deferred: AtomicUsize,
    failed: AtomicUsize,
    transient_failures: AtomicUsize,
}

impl PipelineStats {
    /// Creates a tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents written by this run.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    /// Links whose target file was already on disk.
    #[must_use]
    pub fn already_present(&self) -> usize {
        self.already_present.load(Ordering::SeqCst)
    }

    /// Links whose target was being fetched by another task of the same run.
    ///
    /// Only possible with duplicates kept and `concurrency > 1`; the owning
    /// task's result is counted in the other fields.
    #[must_use]
    pub fn deferred(&self) -> usize {
        self.deferred.load(Ordering::SeqCst)
    }

    /// Links that failed any gate.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Failures a later run could plausibly fix (network errors, timeouts).
    ///
    /// A subset of [`failed`](Self::failed).
    #[must_use]
    pub fn transient_failures(&self) -> usize {
        self.transient_failures.load(Ordering::SeqCst)
    }

    /// Links attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.fetched() + self.already_present() + self.deferred() + self.failed()
    }

    fn record(&self, outcome: &DownloadOutcome) {
        let counter = match outcome {
            DownloadOutcome::Fetched { .. } => &self.fetched,
            DownloadOutcome::AlreadyPresent { .. } => &self.already_present,
            DownloadOutcome::Deferred { .. } => &self.deferred,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self, kind: FailureKind) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        if kind.is_transient() {
            self.transient_failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Self {
        Self {
            fetched: AtomicUsize::new(self.fetched()),
            already_present: AtomicUsize::new(self.already_present()),
            deferred: AtomicUsize::new(self.deferred()),
            failed: AtomicUsize::new(self.failed()),
            transient_failures: AtomicUsize::new(self.transient_failures()),
        }
    }
}

/// What a run found and did.
#[derive(Debug)]
pub struct PipelineReport {
    /// Extracted paths, after optional de-duplication.
    pub links: Vec<String>,
    /// Download counters; all zero in list-only mode.
    pub stats: PipelineStats,
}

/// The harvest orchestrator.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ScrapeConfig,
}

impl Pipeline {
    /// Creates a pipeline for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConcurrency`] if `config.concurrency`
    /// is outside `1..=32`.
    pub fn new(config: ScrapeConfig) -> Result<Self, PipelineError> {
        if !(1..=MAX_CONCURRENCY).contains(&config.concurrency) {
            return Err(PipelineError::InvalidConcurrency {
                value: config.concurrency,
            });
        }
        Ok(Self { config })
    }

    /// Runs one harvest.
    ///
    /// A render failure yields zero links, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SemaphoreClosed`] only if the worker pool
    /// breaks; per-link failures are logged and counted instead.
    #[instrument(skip(self, renderer, downloader), fields(source_url = %self.config.source_url))]
    pub async fn run(
        &self,
        renderer: &dyn PageRenderer,
        downloader: &PdfDownloader,
    ) -> Result<PipelineReport, PipelineError> {
        ensure_output_dir(&self.config.output_dir);

        let page = render_or_blank(renderer, &self.config.source_url).await;
        let mut links = extract_download_paths(&page.html);
        if self.config.dedupe_links {
            let before = links.len();
            links = dedupe_links(links);
            debug!(before, after = links.len(), "de-duplicated links");
        }
        info!(count = links.len(), "download links extracted");

        if links.is_empty() {
            return Ok(PipelineReport {
                links,
                stats: PipelineStats::new(),
            });
        }

        let stats = match self.config.mode {
            PipelineMode::ListOnly => {
                for link in &links {
                    info!(path = %link, "found download link");
                }
                PipelineStats::new()
            }
            PipelineMode::Download => {
                self.download_all(&links, page.base_url(), downloader)
                    .await?
            }
        };

        info!(
            fetched = stats.fetched(),
            already_present = stats.already_present(),
            deferred = stats.deferred(),
            failed = stats.failed(),
            transient_failures = stats.transient_failures(),
            total = stats.total(),
            "harvest complete"
        );
        Ok(PipelineReport { links, stats })
    }

    /// Downloads every link, resolved against `base_url`.
    async fn download_all(
        &self,
        links: &[String],
        base_url: &str,
        downloader: &PdfDownloader,
    ) -> Result<PipelineStats, PipelineError> {
        let stats = Arc::new(PipelineStats::new());
        let output_dir = self.config.output_dir.as_path();

        if self.config.concurrency == 1 {
            for link in links {
                download_link(downloader, base_url, link, output_dir, &stats).await;
            }
            return Ok(stats.snapshot());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(links.len());
        for link in links {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::SemaphoreClosed)?;

            let downloader = downloader.clone();
            let base_url = base_url.to_string();
            let link = link.clone();
            let output_dir = output_dir.to_path_buf();
            let stats = Arc::clone(&stats);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                download_link(&downloader, &base_url, &link, &output_dir, &stats).await;
            }));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
                stats.increment_failed();
            }
        }

        Ok(stats.snapshot())
    }
}

async fn download_link(
    downloader: &PdfDownloader,
    base_url: &str,
    link: &str,
    output_dir: &Path,
    stats: &PipelineStats,
) {
    let url = match resolve_download_url(base_url, link) {
        Ok(url) => url,
        Err(e) => {
            warn!(path = %link, error = %e, "cannot resolve download link");
            stats.record_failure(FailureKind::InvalidUrl);
            return;
        }
    };

    match downloader.fetch(url.as_str(), output_dir).await {
        Ok(outcome) => {
            match &outcome {
                DownloadOutcome::Fetched { .. } => {}
                DownloadOutcome::AlreadyPresent { path } => {
                    info!(path = %path.display(), "file already exists, skipping");
                }
                DownloadOutcome::Deferred { path } => {
                    debug!(path = %path.display(), "same target already downloading, deferring");
                }
            }
            stats.record(&outcome);
        }
        Err(error) => {
            let kind = error.kind();
            warn!(
                url = %url,
                kind = %kind,
                transient = kind.is_transient(),
                error = %error,
                "download failed"
            );
            stats.record_failure(kind);
        }
    }
}

/// Creates `path` (and parents) with mode `0755` if absent.
///
/// Failure is logged, not returned: the run continues and later writes
/// report their own errors.
pub fn ensure_output_dir(path: &Path) {
    if path.is_dir() {
        return;
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    match builder.create(path) {
        Ok(()) => info!(path = %path.display(), "created output directory"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to create output directory"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::render::{RenderError, RenderedPage};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StaticPage(&'static str);

    #[async_trait]
    impl PageRenderer for StaticPage {
        async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
            Ok(RenderedPage {
                url: url.to_string(),
                final_url: None,
                html: self.0.to_string(),
            })
        }
    }

    fn config_for(dir: &Path) -> ScrapeConfig {
        ScrapeConfig {
            source_url: "http://127.0.0.1:9/manuals_download".to_string(),
            output_dir: dir.join("PDFs"),
            mode: PipelineMode::ListOnly,
            ..ScrapeConfig::default()
        }
    }

    #[test]
    fn test_pipeline_new_rejects_invalid_concurrency() {
        let dir = TempDir::new().unwrap();
        for value in [0, 33] {
            let config = ScrapeConfig {
                concurrency: value,
                ..config_for(dir.path())
            };
            assert!(matches!(
                Pipeline::new(config),
                Err(PipelineError::InvalidConcurrency { value: v }) if v == value
            ));
        }
    }

    #[test]
    fn test_ensure_output_dir_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("PDFs");
        ensure_output_dir(&target);
        assert!(target.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_output_dir_uses_0755() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("PDFs");
        ensure_output_dir(&target);
        let mode = std::fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        // umask can only clear bits
        assert_eq!(mode & !0o755, 0, "got {mode:o}");
    }

    #[test]
    fn test_ensure_output_dir_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        ensure_output_dir(&blocker.join("PDFs"));
        assert!(!blocker.join("PDFs").exists());
    }

    #[tokio::test]
    async fn test_run_list_only_dedupes_and_downloads_nothing() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config_for(dir.path())).unwrap();
        let renderer = StaticPage(
            r#"<a href="/filedownload/2">b</a><a href="/filedownload/1">a</a><a href="/filedownload/2">b</a>"#,
        );
        let report = pipeline
            .run(&renderer, &PdfDownloader::new().unwrap())
            .await
            .unwrap();
        assert_eq!(report.links, vec!["/filedownload/2", "/filedownload/1"]);
        assert_eq!(report.stats.total(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("PDFs")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_keeps_duplicates_when_disabled() {
        let dir = TempDir::new().unwrap();
        let config = ScrapeConfig {
            dedupe_links: false,
            ..config_for(dir.path())
        };
        let pipeline = Pipeline::new(config).unwrap();
        let renderer = StaticPage(r#"<a href="/filedownload/2"></a><a href="/filedownload/2"></a>"#);
        let report = pipeline
            .run(&renderer, &PdfDownloader::new().unwrap())
            .await
            .unwrap();
        assert_eq!(report.links.len(), 2);
    }

    #[test]
    fn test_pipeline_stats_record_and_total() {
        let stats = PipelineStats::new();
        stats.record(&DownloadOutcome::Fetched {
            path: "a.pdf".into(),
            bytes: 3,
        });
        stats.record(&DownloadOutcome::AlreadyPresent {
            path: "b.pdf".into(),
        });
        stats.record(&DownloadOutcome::Deferred {
            path: "a.pdf".into(),
        });
        stats.increment_failed();
        assert_eq!(stats.fetched(), 1);
        assert_eq!(stats.already_present(), 1);
        assert_eq!(stats.deferred(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.snapshot().total(), 4);
    }

    #[test]
    fn test_pipeline_stats_split_transient_failures() {
        let stats = PipelineStats::new();
        stats.record_failure(FailureKind::Timeout);
        stats.record_failure(FailureKind::Network);
        stats.record_failure(FailureKind::RejectedStatus);
        stats.record_failure(FailureKind::InvalidUrl);
        assert_eq!(stats.failed(), 4);
        assert_eq!(stats.transient_failures(), 2);
        assert_eq!(stats.snapshot().transient_failures(), 2);
    }
}
