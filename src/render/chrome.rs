//! Chrome DevTools renderer built on chromiumoxide.
//!
//! One browser process per [`ChromeRenderer::render`] call: launched, used
//! for a single page, then closed and reaped on both success and failure.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};

use super::wait::{PollResult, WaitCondition, poll_until};
use super::{PageRenderer, RenderError, RenderedPage};
use crate::user_agent::BROWSER_USER_AGENT;

/// Hard ceiling on navigation + wait + snapshot (5 minutes).
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How long a closed browser gets to exit before we stop waiting on it.
const BROWSER_EXIT_GRACE: Duration = Duration::from_secs(10);

/// Flags that keep Chrome portable across containers and GPU-less hosts.
const PORTABILITY_ARGS: &[&str] = &["--disable-gpu", "--disable-setuid-sandbox"];

/// Browser launch and capture settings.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Readiness condition applied after navigation.
    pub wait: WaitCondition,
    /// Ceiling on navigation + wait + snapshot.
    pub timeout: Duration,
    /// Browser window size in pixels.
    pub window_size: (u32, u32),
    /// Run without a visible window.
    pub headless: bool,
    /// User-Agent the page sees.
    pub user_agent: String,
    /// Explicit Chrome binary; autodetected when `None`.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            wait: WaitCondition::default(),
            timeout: DEFAULT_RENDER_TIMEOUT,
            window_size: (1, 1),
            headless: true,
            user_agent: BROWSER_USER_AGENT.to_string(),
            chrome_executable: None,
        }
    }
}

/// Renders pages in a fresh headless Chrome per call.
#[derive(Debug, Clone, Default)]
pub struct ChromeRenderer {
    settings: RenderSettings,
}

impl ChromeRenderer {
    /// Creates a renderer with the given settings.
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    async fn capture(&self, browser: &Browser, url: &str) -> Result<RenderedPage, RenderError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| navigation_error(url, &e))?;
        let result = self.capture_on(&page, url).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "failed to close page");
        }
        result
    }

    async fn capture_on(&self, page: &Page, url: &str) -> Result<RenderedPage, RenderError> {
        page.execute(SetUserAgentOverrideParams::new(
            self.settings.user_agent.clone(),
        ))
        .await
        .map_err(|e| navigation_error(url, &e))?;

        debug!("navigating");
        page.goto(url)
            .await
            .map_err(|e| navigation_error(url, &e))?;

        self.wait_until_ready(page).await;

        let final_url = page.url().await.ok().flatten();
        let html = page.content().await.map_err(|e| RenderError::Snapshot {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        info!(bytes = html.len(), final_url = ?final_url, "page rendered");
        Ok(RenderedPage {
            url: url.to_string(),
            final_url,
            html,
        })
    }

    async fn wait_until_ready(&self, page: &Page) {
        let result = match &self.settings.wait {
            WaitCondition::Fixed(delay) => {
                debug!(delay_ms = delay.as_millis(), "waiting for page scripts to settle");
                sleep(*delay).await;
                return;
            }
            WaitCondition::DocumentComplete { poll, max } => {
                poll_until(*poll, *max, move || async move {
                    page.evaluate("document.readyState")
                        .await
                        .ok()
                        .and_then(|value| value.into_value::<String>().ok())
                        .is_some_and(|state| state == "complete")
                })
                .await
            }
            WaitCondition::Selector {
                selector,
                poll,
                max,
            } => {
                let selector = selector.as_str();
                poll_until(*poll, *max, move || async move {
                    page.find_element(selector).await.is_ok()
                })
                .await
            }
        };

        match result {
            PollResult::Satisfied { attempts } => debug!(attempts, "page ready"),
            PollResult::TimedOut { attempts } => {
                warn!(attempts, "readiness condition not met, capturing anyway");
            }
        }
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    #[instrument(skip(self), fields(url = %url))]
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        info!("rendering page");
        // One deadline covers launch, navigation, wait and snapshot.
        let deadline = Instant::now() + self.settings.timeout;
        let timed_out = || RenderError::Timeout {
            url: url.to_string(),
            timeout_secs: self.settings.timeout.as_secs(),
        };

        let session = timeout_at(deadline, BrowserSession::launch(&self.settings))
            .await
            .map_err(|_| timed_out())??;
        let outcome = timeout_at(deadline, self.capture(&session.browser, url)).await;
        session.shutdown().await;

        outcome.unwrap_or_else(|_| Err(timed_out()))
    }
}

/// A launched browser plus the task pumping its CDP connection.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(settings: &RenderSettings) -> Result<Self, RenderError> {
        let config = browser_config(settings)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch {
                reason: e.to_string(),
            })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        debug!(headless = settings.headless, "browser launched");
        Ok(Self { browser, handler })
    }

    /// Closes the browser, waits for the process, and stops the handler task.
    ///
    /// Each step is bounded by [`BROWSER_EXIT_GRACE`].
    async fn shutdown(mut self) {
        match timeout(BROWSER_EXIT_GRACE, self.browser.close()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(error = %e, "browser close command failed"),
            Err(_) => warn!("browser close command timed out"),
        }
        match timeout(BROWSER_EXIT_GRACE, self.browser.wait()).await {
            Ok(Ok(status)) => debug!(?status, "browser exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap browser process"),
            Err(_) => warn!("browser did not exit within grace period"),
        }
        self.handler.abort();
        let _ = self.handler.await;
    }
}

fn browser_config(settings: &RenderSettings) -> Result<BrowserConfig, RenderError> {
    let (width, height) = settings.window_size;
    let mut builder = BrowserConfig::builder()
        .window_size(width, height)
        .request_timeout(settings.timeout)
        .no_sandbox();
    if !settings.headless {
        builder = builder.with_head();
    }
    if let Some(path) = &settings.chrome_executable {
        builder = builder.chrome_executable(path);
    }
    for arg in PORTABILITY_ARGS {
        builder = builder.arg(*arg);
    }
    builder
        .build()
        .map_err(|reason| RenderError::Launch { reason })
}

fn navigation_error(url: &str, error: &chromiumoxide::error::CdpError) -> RenderError {
    RenderError::Navigation {
        url: url.to_string(),
        reason: error.to_string(),
    }
}
