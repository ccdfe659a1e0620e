//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use harvester_core::ScrapeConfig;
use harvester_core::config::{DEFAULT_OUTPUT_DIR, PipelineMode, overlay_wait};

/// Render a manufacturer download page and harvest its linked PDF documents.
///
/// With no flags, renders the default listing page, downloads every
/// `/filedownload/<id>` document into `PDFs/` and skips files already there.
#[derive(Parser, Debug)]
#[command(name = "pdf-harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Listing page to render
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Directory receiving the documents [default: PDFs/]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// TOML config file; flags given here override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum concurrent downloads (1-32) [default: 1]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Seconds to let page scripts settle, or the upper bound when polling (0-600) [default: 10]
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=600))]
    pub settle_secs: Option<u64>,

    /// Wait until this CSS selector matches instead of a fixed pause
    #[arg(long, value_name = "SELECTOR")]
    pub wait_for_selector: Option<String>,

    /// Wait until document.readyState is "complete" instead of a fixed pause
    #[arg(long)]
    pub wait_for_load: bool,

    /// Render ceiling in seconds (1-3600) [default: 300]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub render_timeout: Option<u64>,

    /// Per-file download ceiling in seconds (1-3600) [default: 900]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub download_timeout: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chrome executable to launch instead of the autodetected one
    #[arg(long, value_name = "PATH")]
    pub chrome: Option<PathBuf>,

    /// Only log extracted links; download nothing
    #[arg(long)]
    pub list_only: bool,

    /// Attempt every extracted link, including repeats
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Validate the output directory after harvesting
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands; without one, a harvest runs.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Delete unreadable PDFs in a directory and report uppercase file names
    Validate {
        /// Directory to check
        #[arg(default_value = DEFAULT_OUTPUT_DIR)]
        dir: PathBuf,
    },
}

impl Args {
    /// Applies every flag that was given on top of `config`.
    pub fn apply_to(&self, config: &mut ScrapeConfig) {
        if let Some(url) = &self.url {
            config.source_url.clone_from(url);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = usize::from(concurrency);
        }
        config.render.wait = overlay_wait(
            std::mem::take(&mut config.render.wait),
            self.settle_secs.map(Duration::from_secs),
            self.wait_for_selector.clone(),
            self.wait_for_load,
        );
        if let Some(secs) = self.render_timeout {
            config.render.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.download_timeout {
            config.download_timeout = Duration::from_secs(secs);
        }
        if self.headed {
            config.render.headless = false;
        }
        if let Some(path) = &self.chrome {
            config.render.chrome_executable = Some(path.clone());
        }
        if self.list_only {
            config.mode = PipelineMode::ListOnly;
        }
        if self.keep_duplicates {
            config.dedupe_links = false;
        }
    }
}
