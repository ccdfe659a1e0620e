//! Harvest configuration.
//!
//! [`ScrapeConfig`] is the single value the pipeline runs from; its defaults
//! reproduce the fixed deployment (listing URL, `PDFs/`, 10 s settle delay,
//! 5 min render ceiling, 15 min download ceiling, sequential downloads).
//! An optional TOML [`FileConfig`] can override any of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::constants::DOWNLOAD_TIMEOUT;
use crate::extract::is_url_valid;
use crate::render::{DEFAULT_POLL_INTERVAL, RenderSettings, WaitCondition};
use crate::user_agent::BROWSER_USER_AGENT;

/// Listing page harvested when nothing else is configured.
pub const DEFAULT_SOURCE_URL: &str = "https://radiolink.com/manuals_download";

/// Output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "PDFs/";

/// Default number of simultaneous downloads (sequential).
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound accepted for `concurrency`.
pub const MAX_CONCURRENCY: usize = 32;

/// What the pipeline does with extracted links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    /// Resolve each link against the source page and download it.
    #[default]
    Download,
    /// Only log the extracted paths.
    ListOnly,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Offending value, rendered.
        value: String,
        /// Human-readable accepted range.
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Everything one harvest run needs.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Listing page to render.
    pub source_url: String,
    /// Flat directory receiving the documents.
    pub output_dir: PathBuf,
    /// Browser settings, including the readiness condition and render ceiling.
    pub render: RenderSettings,
    /// Ceiling on a single file request.
    pub download_timeout: Duration,
    /// User-Agent for file requests.
    pub user_agent: String,
    /// Simultaneous downloads.
    pub concurrency: usize,
    /// Download or list only.
    pub mode: PipelineMode,
    /// Drop repeated links before downloading.
    pub dedupe_links: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            render: RenderSettings::default(),
            download_timeout: DOWNLOAD_TIMEOUT,
            user_agent: BROWSER_USER_AGENT.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            mode: PipelineMode::default(),
            dedupe_links: true,
        }
    }
}

impl ScrapeConfig {
    /// Checks cross-field constraints before a run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_url_valid(&self.source_url) {
            return Err(ConfigError::invalid(
                "source_url",
                &self.source_url,
                "an absolute http(s) URL",
            ));
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::invalid(
                "concurrency",
                self.concurrency,
                "range 1..=32",
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "output_dir",
                "\"\"",
                "a non-empty path",
            ));
        }
        Ok(())
    }

    /// Sets the User-Agent for both page rendering and file requests.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        let user_agent = user_agent.into();
        self.render.user_agent.clone_from(&user_agent);
        self.user_agent = user_agent;
    }
}

/// Layers wait settings over `current`, field by field.
///
/// A selector switches to selector polling and wins over `document_complete`.
/// `document_complete` switches to `document.readyState` polling. With
/// neither, the current kind is kept. `settle` replaces the bound (or the
/// pause); when absent the current bound carries over.
#[must_use]
pub fn overlay_wait(
    current: WaitCondition,
    settle: Option<Duration>,
    selector: Option<String>,
    document_complete: bool,
) -> WaitCondition {
    let bound = settle.unwrap_or_else(|| current.max_wait());
    match selector {
        Some(selector) => WaitCondition::Selector {
            selector,
            poll: DEFAULT_POLL_INTERVAL,
            max: bound,
        },
        None if document_complete => WaitCondition::DocumentComplete {
            poll: DEFAULT_POLL_INTERVAL,
            max: bound,
        },
        None => current.with_max(bound),
    }
}

/// TOML-backed overrides; every field is optional.
///
/// ```toml
/// source_url = "https://radiolink.com/manuals_download"
/// output_dir = "PDFs/"
/// settle_delay_secs = 10
/// concurrency = 4
/// mode = "download"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Listing page to render.
    pub source_url: Option<String>,
    /// Output directory.
    pub output_dir: Option<PathBuf>,
    /// Settle delay, or upper bound for polling waits.
    pub settle_delay_secs: Option<u64>,
    /// CSS selector to wait for instead of a blind pause.
    pub wait_for_selector: Option<String>,
    /// Poll `document.readyState` instead of a blind pause.
    pub wait_for_document_complete: Option<bool>,
    /// Render ceiling.
    pub render_timeout_secs: Option<u64>,
    /// Per-file request ceiling.
    pub download_timeout_secs: Option<u64>,
    /// User-Agent for rendering and downloads.
    pub user_agent: Option<String>,
    /// Run the browser without a window.
    pub headless: Option<bool>,
    /// Explicit Chrome binary.
    pub chrome_executable: Option<PathBuf>,
    /// Simultaneous downloads.
    pub concurrency: Option<usize>,
    /// `download` or `list-only`.
    pub mode: Option<PipelineMode>,
    /// Drop repeated links.
    pub dedupe_links: Option<bool>,
}

impl FileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys,
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&text, path)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(concurrency) = self.concurrency
            && !(1..=MAX_CONCURRENCY).contains(&concurrency)
        {
            return Err(ConfigError::invalid(
                "concurrency",
                concurrency,
                "range 1..=32",
            ));
        }
        if let Some(delay) = self.settle_delay_secs
            && delay > 600
        {
            return Err(ConfigError::invalid(
                "settle_delay_secs",
                delay,
                "range 0..=600",
            ));
        }
        validate_timeout_secs("render_timeout_secs", self.render_timeout_secs)?;
        validate_timeout_secs("download_timeout_secs", self.download_timeout_secs)?;
        if let Some(url) = &self.source_url
            && !is_url_valid(url)
        {
            return Err(ConfigError::invalid(
                "source_url",
                url,
                "an absolute http(s) URL",
            ));
        }
        Ok(())
    }

    /// Applies every present field on top of `config`.
    pub fn apply_to(&self, config: &mut ScrapeConfig) {
        if let Some(url) = &self.source_url {
            config.source_url.clone_from(url);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        config.render.wait = overlay_wait(
            std::mem::take(&mut config.render.wait),
            self.settle_delay_secs.map(Duration::from_secs),
            self.wait_for_selector.clone(),
            self.wait_for_document_complete.unwrap_or(false),
        );
        if let Some(secs) = self.render_timeout_secs {
            config.render.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.download_timeout_secs {
            config.download_timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = &self.user_agent {
            config.set_user_agent(user_agent.clone());
        }
        if let Some(headless) = self.headless {
            config.render.headless = headless;
        }
        if let Some(path) = &self.chrome_executable {
            config.render.chrome_executable = Some(path.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(dedupe) = self.dedupe_links {
            config.dedupe_links = dedupe;
        }
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(field, value, "range 1..=3600"));
    }
    Ok(())
}
