//! CLI entry point for the PDF harvester.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use harvester_core::{
    ChromeRenderer, FileConfig, PdfDownloader, Pipeline, ScrapeConfig, validate_directory,
};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if let Some(Command::Validate { dir }) = &args.command {
        let report = run_validation(dir.clone()).await?;
        info!(
            checked = report.checked,
            removed = report.removed.len(),
            "validation finished"
        );
        return Ok(());
    }

    let config = build_config(&args)?;
    info!(
        source_url = %config.source_url,
        output_dir = %config.output_dir.display(),
        mode = ?config.mode,
        concurrency = config.concurrency,
        "PDF harvester starting"
    );

    let downloader = PdfDownloader::with_settings(config.download_timeout, &config.user_agent)
        .context("failed to build HTTP client")?;
    let renderer = ChromeRenderer::new(config.render.clone());
    let output_dir = config.output_dir.clone();
    let pipeline = Pipeline::new(config)?;

    // From here on every failure is logged and the process still exits 0.
    match pipeline.run(&renderer, &downloader).await {
        Ok(report) => info!(
            links = report.links.len(),
            fetched = report.stats.fetched(),
            already_present = report.stats.already_present(),
            failed = report.stats.failed(),
            transient_failures = report.stats.transient_failures(),
            "harvest finished"
        ),
        Err(e) => warn!(error = %e, "harvest aborted"),
    }

    if args.validate
        && let Err(e) = run_validation(output_dir).await
    {
        warn!(error = %e, "validation pass failed");
    }

    Ok(())
}

/// Defaults, then the config file, then flags.
fn build_config(args: &Args) -> Result<ScrapeConfig> {
    let mut config = ScrapeConfig::default();
    if let Some(path) = &args.config {
        let file = FileConfig::load(path)?;
        file.apply_to(&mut config);
        debug!(path = %path.display(), "applied config file");
    }
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run_validation(dir: PathBuf) -> Result<harvester_core::ValidationReport> {
    let report = tokio::task::spawn_blocking(move || validate_directory(&dir))
        .await
        .context("validation task panicked")??;
    Ok(report)
}
