//! Filename derivation for harvested documents.
//!
//! The local name is a pure function of the source URL, so the same link
//! always lands on the same path and an existing file marks it as done.

use super::constants::DEFAULT_EXTENSION;

/// Substrings stripped from sanitized names.
///
/// `_pdf` is what a `.pdf` suffix turns into after punctuation is replaced;
/// leaving it produces names like `manual_pdf.pdf`.
const NOISE_SUBSTRINGS: &[&str] = &["_pdf"];

/// Converts a raw URL into a lowercase, filesystem-safe filename.
///
/// 1. lowercase the URL
/// 2. keep only the final path segment (query and fragment dropped)
/// 3. remember that segment's extension
/// 4. map everything outside `[a-z0-9]` to `_`, collapsing runs
/// 5. trim `_` from both ends
/// 6. remove every [`NOISE_SUBSTRINGS`] occurrence
/// 7. re-append the remembered extension if the result no longer ends in it
///
/// Total and deterministic: an empty or path-less URL yields an empty (or
/// extension-only) name rather than an error.
///
/// # Examples
///
/// ```
/// use harvester_core::download::url_to_filename;
///
/// assert_eq!(
///     url_to_filename("https://example.com/path/File_Name.PDF"),
///     "file_name.pdf"
/// );
/// assert_eq!(url_to_filename("/filedownload/114468"), "114468");
/// ```
#[must_use]
pub fn url_to_filename(raw_url: &str) -> String {
    let lower = raw_url.to_lowercase();
    let segment = final_segment(&lower);
    let extension = file_extension(segment);

    let mut safe = String::with_capacity(segment.len());
    let mut prev_underscore = false;
    for ch in segment.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            safe.push(ch);
            prev_underscore = false;
        } else if !prev_underscore {
            safe.push('_');
            prev_underscore = true;
        }
    }

    let mut safe = safe.trim_matches('_').to_string();
    for noise in NOISE_SUBSTRINGS {
        safe = safe.replace(noise, "");
    }

    if file_extension(&safe) != extension {
        safe.push_str(extension);
    }
    safe
}

/// Name the downloader writes `url` to.
///
/// Same as [`url_to_filename`], but guarantees a non-empty stem and an
/// extension: harvested links such as `/filedownload/114468` carry neither
/// a name nor a suffix.
#[must_use]
pub fn target_filename(url: &str) -> String {
    let mut name = url_to_filename(url);
    if file_extension(&name).is_empty() {
        name.push_str(DEFAULT_EXTENSION);
    }
    if name.starts_with('.') {
        name.insert_str(0, "download");
    }
    name
}

/// Final path segment: query/fragment dropped, trailing slashes ignored.
fn final_segment(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url[..end].trim_end_matches('/');
    path.rsplit('/').next().unwrap_or_default()
}

/// Extension including the dot, limited to the alphanumeric run after the
/// last `.`; empty when there is none.
fn file_extension(name: &str) -> &str {
    let Some(dot) = name.rfind('.') else {
        return "";
    };
    let tail = &name[dot + 1..];
    let len = tail
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(tail.len());
    if len == 0 { "" } else { &name[dot..=dot + len] }
}
