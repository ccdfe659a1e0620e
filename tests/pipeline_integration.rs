//! Integration tests for the harvest pipeline.
//!
//! A stub renderer stands in for Chrome; document endpoints are wiremock.

use std::path::Path;

use async_trait::async_trait;
use harvester_core::{
    PageRenderer, PdfDownloader, Pipeline, PipelineMode, RenderError, RenderedPage, ScrapeConfig,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF_BYTES: &[u8] = b"%PDF-1.4 stub document";

/// Returns fixed markup for any URL, optionally reporting a redirect.
struct StubRenderer {
    html: String,
    final_url: Option<String>,
}

#[async_trait]
impl PageRenderer for StubRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        Ok(RenderedPage {
            url: url.to_string(),
            final_url: self.final_url.clone(),
            html: self.html.clone(),
        })
    }
}

/// Always fails, like a browser that never comes up.
struct FailingRenderer;

#[async_trait]
impl PageRenderer for FailingRenderer {
    async fn render(&self, _url: &str) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Launch {
            reason: "no chrome".to_string(),
        })
    }
}

fn listing(ids: &[u32]) -> StubRenderer {
    let anchors: String = ids
        .iter()
        .map(|id| format!(r#"<a class="w-list-title-text" href="/filedownload/{id}">Manual {id}</a>"#))
        .collect();
    StubRenderer {
        html: format!("<html><body><div class=\"w-list\">{anchors}</div></body></html>"),
        final_url: None,
    }
}

async fn mount_document(server: &MockServer, id: u32, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/filedownload/{id}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(PDF_BYTES.to_vec()),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn config_for(server: &MockServer, output_dir: &Path) -> ScrapeConfig {
    ScrapeConfig {
        source_url: format!("{}/manuals_download", server.uri()),
        output_dir: output_dir.to_path_buf(),
        ..ScrapeConfig::default()
    }
}

fn sorted_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("should read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_pipeline_downloads_every_extracted_link() {
    let server = MockServer::start().await;
    mount_document(&server, 101, 1).await;
    mount_document(&server, 102, 1).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    let pipeline = Pipeline::new(config_for(&server, &output_dir)).expect("valid config");
    let report = pipeline
        .run(&listing(&[101, 102]), &PdfDownloader::new().expect("client"))
        .await
        .expect("run should succeed");

    assert_eq!(report.links, vec!["/filedownload/101", "/filedownload/102"]);
    assert_eq!(report.stats.fetched(), 2);
    assert_eq!(report.stats.failed(), 0);
    assert_eq!(sorted_names(&output_dir), vec!["101.pdf", "102.pdf"]);
}

#[tokio::test]
async fn test_pipeline_rerun_skips_existing_files() {
    let server = MockServer::start().await;
    // One request per document across both runs.
    mount_document(&server, 1, 1).await;
    mount_document(&server, 2, 1).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    let pipeline = Pipeline::new(config_for(&server, &output_dir)).expect("valid config");
    let downloader = PdfDownloader::new().expect("client");
    let renderer = listing(&[1, 2]);

    let first = pipeline.run(&renderer, &downloader).await.expect("first run");
    assert_eq!(first.stats.fetched(), 2);
    let before: Vec<Vec<u8>> = ["1.pdf", "2.pdf"]
        .iter()
        .map(|n| std::fs::read(output_dir.join(n)).expect("read"))
        .collect();

    let second = pipeline.run(&renderer, &downloader).await.expect("second run");
    assert_eq!(second.stats.fetched(), 0);
    assert_eq!(second.stats.already_present(), 2);
    assert_eq!(second.stats.failed(), 0);

    assert_eq!(sorted_names(&output_dir), vec!["1.pdf", "2.pdf"]);
    let after: Vec<Vec<u8>> = ["1.pdf", "2.pdf"]
        .iter()
        .map(|n| std::fs::read(output_dir.join(n)).expect("read"))
        .collect();
    assert_eq!(before, after, "files must not be rewritten");
}

#[tokio::test]
async fn test_pipeline_counts_failures_and_continues() {
    let server = MockServer::start().await;
    mount_document(&server, 1, 1).await;
    Mock::given(method("GET"))
        .and(path("/filedownload/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_document(&server, 3, 1).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    let pipeline = Pipeline::new(config_for(&server, &output_dir)).expect("valid config");
    let report = pipeline
        .run(&listing(&[1, 2, 3]), &PdfDownloader::new().expect("client"))
        .await
        .expect("per-link failures do not fail the run");

    assert_eq!(report.stats.fetched(), 2);
    assert_eq!(report.stats.failed(), 1);
    assert_eq!(report.stats.transient_failures(), 0, "a 404 is not transient");
    assert_eq!(sorted_names(&output_dir), vec!["1.pdf", "3.pdf"]);
}

#[tokio::test]
async fn test_pipeline_concurrent_run_dedupes_and_fetches_once() {
    let server = MockServer::start().await;
    let ids: Vec<u32> = (1..=8).collect();
    for id in &ids {
        mount_document(&server, *id, 1).await;
    }
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    let config = ScrapeConfig {
        concurrency: 4,
        ..config_for(&server, &output_dir)
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let mut repeated = ids.clone();
    repeated.extend(&ids);
    let report = pipeline
        .run(&listing(&repeated), &PdfDownloader::new().expect("client"))
        .await
        .expect("run should succeed");

    assert_eq!(report.links.len(), 8);
    assert_eq!(report.stats.fetched(), 8);
    assert_eq!(sorted_names(&output_dir).len(), 8);
}

#[tokio::test]
async fn test_pipeline_duplicates_kept_are_skipped_on_disk() {
    let server = MockServer::start().await;
    mount_document(&server, 5, 1).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    let config = ScrapeConfig {
        dedupe_links: false,
        ..config_for(&server, &output_dir)
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let report = pipeline
        .run(&listing(&[5, 5]), &PdfDownloader::new().expect("client"))
        .await
        .expect("run should succeed");

    assert_eq!(report.links.len(), 2);
    assert_eq!(report.stats.fetched(), 1);
    assert_eq!(report.stats.already_present(), 1);
}

#[tokio::test]
async fn test_pipeline_list_only_makes_no_requests() {
    let server = MockServer::start().await;
    mount_document(&server, 1, 0).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    let config = ScrapeConfig {
        mode: PipelineMode::ListOnly,
        ..config_for(&server, &output_dir)
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let report = pipeline
        .run(&listing(&[1]), &PdfDownloader::new().expect("client"))
        .await
        .expect("run should succeed");

    assert_eq!(report.links, vec!["/filedownload/1"]);
    assert_eq!(report.stats.total(), 0);
    assert!(output_dir.is_dir(), "output dir is still created");
    assert!(sorted_names(&output_dir).is_empty());
}

#[tokio::test]
async fn test_pipeline_render_failure_yields_no_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    let pipeline = Pipeline::new(config_for(&server, &output_dir)).expect("valid config");
    let report = pipeline
        .run(&FailingRenderer, &PdfDownloader::new().expect("client"))
        .await
        .expect("render failure is not a run failure");

    assert!(report.links.is_empty());
    assert_eq!(report.stats.total(), 0);
    assert!(output_dir.is_dir());
}

#[tokio::test]
async fn test_pipeline_counts_unreachable_host_as_transient() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    // Nothing listens on port 9.
    let config = ScrapeConfig {
        source_url: "http://127.0.0.1:9/manuals_download".to_string(),
        output_dir: output_dir.clone(),
        ..ScrapeConfig::default()
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let report = pipeline
        .run(&listing(&[1]), &PdfDownloader::new().expect("client"))
        .await
        .expect("run should succeed");

    assert_eq!(report.stats.failed(), 1);
    assert_eq!(report.stats.transient_failures(), 1);
}

#[tokio::test]
async fn test_pipeline_resolves_links_against_redirected_page() {
    let server = MockServer::start().await;
    mount_document(&server, 7, 1).await;
    mount_document(&server, 8, 1).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("PDFs");

    // The listing moved; only the host the browser landed on is reachable.
    let renderer = StubRenderer {
        final_url: Some(format!("{}/en/manuals_download", server.uri())),
        ..listing(&[7, 8])
    };
    let config = ScrapeConfig {
        source_url: "http://127.0.0.1:9/manuals_download".to_string(),
        output_dir: output_dir.clone(),
        ..ScrapeConfig::default()
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let report = pipeline
        .run(&renderer, &PdfDownloader::new().expect("client"))
        .await
        .expect("run should succeed");

    assert_eq!(report.stats.fetched(), 2);
    assert_eq!(report.stats.failed(), 0);
    assert_eq!(sorted_names(&output_dir), vec!["7.pdf", "8.pdf"]);
}
