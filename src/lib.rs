//! # crd-scraper
//!
//! Scrapes chemical reaction records from the reaction archive at
//! `kmt.vander-lingen.nl` into a resumable JSON dataset.
//!
//! ## How a run works
//!
//! 1. The archive index is loaded and every "reaction data" link is collected.
//! 2. Pages already present in the checkpoint file are skipped.
//! 3. On each remaining page every visible reaction panel is opened in a detail tab.
//!    Reactants, solvents, and products are read from its table, and the SMILES of
//!    each reactant and product is looked up on its molecule profile tab.
//! 4. The dataset is written back after every page, and once more if the run dies.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use crd_scraper::{BrowserSession, JsonCheckpoint, LaunchOptions, ScrapeConfig, Scraper};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScrapeConfig::new().max_pages(Some(5));
//! let mut session = BrowserSession::launch(LaunchOptions::new().headless(true))?;
//! let mut checkpoint = JsonCheckpoint::new(&config.output_path);
//!
//! let summary = Scraper::new(&mut session, &mut checkpoint, config).run()?;
//! println!("{} reactions stored", summary.total_records);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: The [`Session`] capability, its Chrome implementation, and the context stack
//! - [`collector`]: Archive index link collection
//! - [`extractor`]: Per-page reaction extraction
//! - [`orchestrator`]: The full run with skip and recovery logic
//! - [`checkpoint`]: Dataset persistence
//! - [`record`]: Reaction records and role classification
//! - [`config`]: Run configuration
//! - [`error`]: Error types and result aliases

pub mod browser;
pub mod checkpoint;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod record;

pub use browser::{BrowserSession, ConnectionOptions, ContextId, ContextStack, LaunchOptions, Locator, Session};
pub use checkpoint::{Checkpoint, JsonCheckpoint};
pub use collector::collect_links;
pub use config::ScrapeConfig;
pub use error::{BrowserError, Result, ScrapeError};
pub use extractor::{PageExtractor, PageReport, PanelFailure, RowFailure};
pub use orchestrator::{RunSummary, Scraper};
pub use record::{Dataset, ReactionRecord, Role, RoleBuckets, UNAVAILABLE_SMILES};
