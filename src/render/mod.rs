//! Headless page rendering.
//!
//! Manufacturer listing pages build their link lists in client-side script
//! and sit behind anti-automation challenges, so the raw HTTP body is
//! useless. A [`PageRenderer`] drives a real browser to the page, waits per
//! its [`WaitCondition`], and hands back the serialized DOM.
//!
//! [`ChromeRenderer`] is the production implementation; tests substitute
//! their own renderer through the trait.

mod chrome;
mod wait;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::extract::is_url_valid;

pub use chrome::{ChromeRenderer, RenderSettings};
pub use wait::{
    DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, PollResult, WaitCondition, poll_until,
};

/// DOM serialization captured once the page was considered ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// URL that was requested.
    pub url: String,
    /// URL the browser ended on after redirects, when known.
    pub final_url: Option<String>,
    /// Outer HTML of the document.
    pub html: String,
}

impl RenderedPage {
    /// URL that relative links in `html` are relative to.
    ///
    /// The post-redirect URL when it is an absolute http(s) URL, else the
    /// requested one.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.final_url {
            Some(final_url) if is_url_valid(final_url) => final_url,
            _ => &self.url,
        }
    }
}

/// Errors that can occur while rendering a page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The browser process could not be started.
    #[error("failed to launch browser: {reason}")]
    Launch {
        /// Launcher or configuration error text.
        reason: String,
    },

    /// Navigation to the page failed.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Protocol error text.
        reason: String,
    },

    /// Launch, navigation, wait and snapshot did not finish within the ceiling.
    #[error("rendering {url} exceeded {timeout_secs}s")]
    Timeout {
        /// Target URL.
        url: String,
        /// The ceiling that was hit.
        timeout_secs: u64,
    },

    /// The DOM could not be serialized.
    #[error("failed to capture markup of {url}: {reason}")]
    Snapshot {
        /// Target URL.
        url: String,
        /// Protocol error text.
        reason: String,
    },
}

/// Something that can turn a URL into rendered markup.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renders `url` and returns the DOM serialization.
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;
}

/// Renders `url`, logging any failure and returning a blank page instead.
///
/// The blank page has empty markup and no final URL.
pub async fn render_or_blank(renderer: &dyn PageRenderer, url: &str) -> RenderedPage {
    match renderer.render(url).await {
        Ok(page) => {
            if let Some(final_url) = page.final_url.as_deref()
                && final_url != url
            {
                debug!(url = %url, final_url = %final_url, "page was redirected");
            }
            page
        }
        Err(error) => {
            warn!(url = %url, error = %error, "page render failed");
            RenderedPage {
                url: url.to_string(),
                final_url: None,
                html: String::new(),
            }
        }
    }
}

/// Renders `url`, logging any failure and returning an empty string instead.
pub async fn render_or_empty(renderer: &dyn PageRenderer, url: &str) -> String {
    render_or_blank(renderer, url).await.html
}
