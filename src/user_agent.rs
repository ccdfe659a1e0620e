//! Shared User-Agent string for the page renderer and the file downloader.
//!
//! Some manufacturer CDNs reject empty or library-default agents, so both the
//! headless browser and the HTTP client present the same desktop Chrome UA.

/// Desktop Chrome User-Agent sent with every page navigation and file request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";
