//! crd-scraper command line
//!
//! Launches (or attaches to) Chrome and scrapes the reaction archive into a JSON file,
//! resuming from whatever that file already contains.

use anyhow::Context;
use clap::Parser;
use crd_scraper::{BrowserSession, ConnectionOptions, JsonCheckpoint, LaunchOptions, ScrapeConfig, Scraper,
                  config::{DEFAULT_ARCHIVE_URL, DEFAULT_OUTPUT_FILE}};
use std::{path::PathBuf, time::Duration};

#[derive(Parser)]
#[command(name = "crd-scraper")]
#[command(version)]
#[command(about = "Scrape chemical reaction records into a resumable JSON dataset", long_about = None)]
struct Cli {
    /// Archive index listing the reaction data pages
    #[arg(long, value_name = "URL", default_value = DEFAULT_ARCHIVE_URL)]
    archive_url: String,

    /// Scrape at most this many archive pages (default: all)
    #[arg(long, short = 'n', value_name = "N")]
    max_pages: Option<usize>,

    /// Dataset file; existing records are kept and their pages skipped
    #[arg(long, short = 'o', value_name = "PATH", default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// Seconds to wait for elements and tabs before giving up on them
    #[arg(long, value_name = "SECS", default_value = "10")]
    timeout_secs: u64,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    chrome_path: Option<PathBuf>,

    /// WebSocket endpoint URL for remote browser connection
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Disable the Chrome sandbox (needed in some containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Log every row-level miss
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = ScrapeConfig::new()
        .archive_url(cli.archive_url.clone())
        .max_pages(cli.max_pages)
        .output_path(cli.output.clone())
        .wait_timeout(Duration::from_secs(cli.timeout_secs));

    let mut session = match &cli.ws_endpoint {
        Some(endpoint) => {
            log::info!("Connecting to browser at {}", endpoint);
            BrowserSession::connect(ConnectionOptions::new(endpoint.clone()))
                .with_context(|| format!("Failed to connect to {}", endpoint))?
        }
        None => {
            let mut options = LaunchOptions::new().headless(!cli.headed).sandbox(!cli.no_sandbox);
            if let Some(path) = &cli.chrome_path {
                options = options.chrome_path(path);
            }
            if let Some(dir) = &cli.user_data_dir {
                options = options.user_data_dir(dir);
            }
            log::info!("Launching {} browser", if options.headless { "headless" } else { "headed" });
            BrowserSession::launch(options).context("Failed to launch browser")?
        }
    };

    let mut checkpoint = JsonCheckpoint::new(&config.output_path);
    let output = config.output_path.clone();
    let result = Scraper::new(&mut session, &mut checkpoint, config).run();

    let summary = result.with_context(|| format!("Scrape aborted; partial results are in {}", output.display()))?;
    log::info!(
        "{} pages scraped, {} skipped, {} failed; {} new reactions",
        summary.scraped,
        summary.skipped,
        summary.failed,
        summary.records_added
    );
    log::info!("Data saved to: {}", std::fs::canonicalize(&output).unwrap_or(output).display());

    Ok(())
}
