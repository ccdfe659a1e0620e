//! Download link extraction from rendered page markup.
//!
//! Matching is textual, not a DOM walk: any `href="/filedownload/<digits>"`
//! in the markup counts, wherever it appears.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};
use url::Url;

/// Pattern for download anchors; group 1 is the relative path.
#[allow(clippy::expect_used)]
static DOWNLOAD_HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(/filedownload/[0-9]+)""#).expect("download href regex is valid") // Static pattern, safe to panic
});

/// Returns every `/filedownload/<digits>` path referenced by an `href` in `html`.
///
/// Results keep the order of appearance and include duplicates; pass them to
/// [`dedupe_links`] if each path should appear once. No match yields an
/// empty list.
///
/// # Examples
///
/// ```
/// use harvester_core::extract::extract_download_paths;
///
/// let html = r#"<a class="w-list-title-text" href="/filedownload/114468">Manual</a>"#;
/// assert_eq!(extract_download_paths(html), vec!["/filedownload/114468"]);
/// ```
#[tracing::instrument(skip(html), fields(html_len = html.len()))]
#[must_use]
pub fn extract_download_paths(html: &str) -> Vec<String> {
    let paths: Vec<String> = DOWNLOAD_HREF_PATTERN
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .map(|m| {
            trace!(path = m.as_str(), "found download path");
            m.as_str().to_string()
        })
        .collect();
    debug!(count = paths.len(), "extracted download paths");
    paths
}

/// Removes repeated entries, keeping the first occurrence of each.
#[must_use]
pub fn dedupe_links(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(links.len());
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Resolves an extracted relative path against the page it was found on.
///
/// # Errors
///
/// Returns [`url::ParseError`] when `page_url` is not absolute or the join fails.
pub fn resolve_download_url(page_url: &str, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(page_url)?.join(path)
}

/// True for absolute `http`/`https` URLs with a host.
#[must_use]
pub fn is_url_valid(candidate: &str) -> bool {
    Url::parse(candidate)
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}
