//! Post-download sanity pass over the output directory.
//!
//! Every `*.pdf` under the directory is parsed with `lopdf`. Files that do
//! not parse, or parse to a document with no pages, are deleted so the next
//! harvest fetches them again. Names containing uppercase letters are
//! reported, since harvested names are always lowercase.

use std::path::{Path, PathBuf};

use lopdf::Document;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Errors that prevent the validation pass from starting.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The directory does not exist or is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Requested directory.
        path: PathBuf,
    },
}

/// Result of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// PDF files examined.
    pub checked: usize,
    /// Invalid files that were deleted.
    pub removed: Vec<PathBuf>,
    /// Files whose name contains an uppercase letter.
    pub uppercase: Vec<PathBuf>,
}

/// Validates every `*.pdf` below `dir`, deleting the unreadable ones.
///
/// Unreadable directory entries and failed deletions are logged and skipped.
///
/// # Errors
///
/// Returns [`ValidateError::NotADirectory`] if `dir` is not a directory.
#[instrument(skip(dir), fields(dir = %dir.display()))]
pub fn validate_directory(dir: &Path) -> Result<ValidationReport, ValidateError> {
    if !dir.is_dir() {
        return Err(ValidateError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut report = ValidationReport::default();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_pdf_suffix(entry.path()) {
            continue;
        }

        let path = entry.path();
        report.checked += 1;

        if !is_valid_pdf(path) {
            warn!(path = %path.display(), "invalid PDF detected, deleting file");
            match std::fs::remove_file(path) {
                Ok(()) => report.removed.push(path.to_path_buf()),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to delete invalid PDF"),
            }
        }

        if file_name_has_uppercase(path) {
            info!(path = %path.display(), "uppercase letter found in filename");
            report.uppercase.push(path.to_path_buf());
        }
    }

    info!(
        checked = report.checked,
        removed = report.removed.len(),
        uppercase = report.uppercase.len(),
        "validation complete"
    );
    Ok(report)
}

/// True when the file parses as a PDF with at least one page.
#[must_use]
pub fn is_valid_pdf(path: &Path) -> bool {
    match Document::load(path) {
        Ok(document) => {
            let pages = document.get_pages().len();
            debug!(path = %path.display(), pages, "parsed PDF");
            pages > 0
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "PDF parse failed");
            false
        }
    }
}

// Case-sensitive: only lowercase `.pdf` names are harvested.
fn has_pdf_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".pdf"))
}

fn file_name_has_uppercase(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().chars().any(char::is_uppercase))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lopdf::{Object, dictionary};
    use tempfile::TempDir;

    fn write_pdf(path: &Path, page_count: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..page_count)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                })
                .into()
            })
            .collect();
        let count = i64::try_from(page_count).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_validate_directory_keeps_valid_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.pdf");
        write_pdf(&path, 1);

        let report = validate_directory(dir.path()).unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.removed.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_validate_directory_deletes_unparseable_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"<html>challenge page</html>").unwrap();

        let report = validate_directory(dir.path()).unwrap();
        assert_eq!(report.removed, vec![path.clone()]);
        assert!(!path.exists());
    }

    #[test]
    fn test_validate_directory_deletes_zero_page_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.pdf");
        write_pdf(&path, 0);

        let report = validate_directory(dir.path()).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_validate_directory_ignores_other_files_and_recurses() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not a pdf").unwrap();
        std::fs::write(dir.path().join(".a.pdf.Xy12Ab34.part"), b"partial").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        write_pdf(&nested.join("deep.pdf"), 2);

        let report = validate_directory(dir.path()).unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.removed.is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_validate_directory_reports_uppercase_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Manual.pdf");
        write_pdf(&path, 1);
        write_pdf(&dir.path().join("lower.pdf"), 1);

        let report = validate_directory(dir.path()).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.uppercase, vec![path]);
    }

    #[test]
    fn test_validate_directory_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        let err = validate_directory(&dir.path().join("absent")).unwrap_err();
        assert!(err.to_string().contains("absent"), "got {err}");
    }

    #[test]
    fn test_has_pdf_suffix_is_case_sensitive() {
        assert!(has_pdf_suffix(Path::new("a/b.pdf")));
        assert!(!has_pdf_suffix(Path::new("a/b.PDF")));
        assert!(!has_pdf_suffix(Path::new("a/b.pdf.part")));
    }
}
