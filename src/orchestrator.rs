//! Top-level run: collect pages, skip finished ones, extract, checkpoint

use crate::browser::Session;
use crate::checkpoint::Checkpoint;
use crate::collector::collect_links;
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::extractor::PageExtractor;
use crate::record::Dataset;

/// Counts from a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages selected from the archive index
    pub targets: usize,
    /// Pages already present in the checkpoint
    pub skipped: usize,
    /// Pages extracted and checkpointed
    pub scraped: usize,
    /// Pages abandoned because of an error
    pub failed: usize,
    /// Records added during this run
    pub records_added: usize,
    /// Records in the dataset at the end of the run
    pub total_records: usize,
    /// Where the dataset is checkpointed
    pub output: String,
}

/// One scraping run over a session and a checkpoint
pub struct Scraper<'a, S: Session, C: Checkpoint> {
    session: &'a mut S,
    checkpoint: &'a mut C,
    config: ScrapeConfig,
}

impl<'a, S: Session, C: Checkpoint> Scraper<'a, S, C> {
    pub fn new(session: &'a mut S, checkpoint: &'a mut C, config: ScrapeConfig) -> Self {
        Self { session, checkpoint, config }
    }

    /// Run to completion.
    ///
    /// On a run-level failure the dataset collected so far is persisted before the
    /// error is returned. The session is shut down exactly once either way.
    pub fn run(self) -> Result<RunSummary, ScrapeError> {
        let Scraper { session, checkpoint, config } = self;

        let mut dataset = checkpoint.load();
        if !dataset.is_empty() {
            log::info!("Loaded {} reactions from {}", dataset.len(), checkpoint.describe());
        }

        let outcome = scrape_all(&mut *session, &mut *checkpoint, &config, &mut dataset);

        if let Err(e) = &outcome {
            log::error!("CRITICAL ERROR: {}", e);
            if let Err(persist_err) = checkpoint.persist(&dataset) {
                log::error!("Final save failed: {}", persist_err);
            }
        }

        if let Err(e) = session.quit() {
            log::warn!("Browser did not shut down cleanly: {}", e);
        }

        let summary = RunSummary { output: checkpoint.describe(), ..outcome? };
        log::info!("GRAND TOTAL: {} reactions in {}", summary.total_records, summary.output);
        Ok(summary)
    }
}

fn scrape_all<S: Session, C: Checkpoint>(
    session: &mut S,
    checkpoint: &mut C,
    config: &ScrapeConfig,
    dataset: &mut Dataset,
) -> Result<RunSummary, ScrapeError> {
    let targets = collect_links(session, &config.archive_url, config.max_pages, config.wait_timeout)?;
    let mut summary = RunSummary { targets: targets.len(), ..Default::default() };

    let mut extractor = PageExtractor::new(session, config)?;
    for (page_index, url) in targets.iter().enumerate() {
        log::info!("--- Processing page {}/{} ---", page_index + 1, targets.len());
        log::info!("URL: {}", url);

        if dataset.contains(url) {
            log::info!("   [Skip] Already scraped this page.");
            summary.skipped += 1;
            continue;
        }

        match extractor.extract_page(url, page_index) {
            Ok(report) => {
                let added = report.records.len();
                dataset.extend(report.records);
                summary.records_added += added;

                // Records stay in memory and go out with the next successful write
                if let Err(e) = checkpoint.persist(dataset) {
                    log::warn!("Error on page {}: {}", url, e);
                    summary.failed += 1;
                    continue;
                }

                summary.scraped += 1;
                log::info!(
                    "Page complete. Saved {} reactions ({} of {} panels abandoned).",
                    added,
                    report.abandoned.len(),
                    report.visible_panels
                );
            }
            Err(e) if e.is_session_lost() => return Err(e.into()),
            Err(e) => {
                log::warn!("Error on page {}: {}", url, e);
                summary.failed += 1;
            }
        }
    }

    summary.total_records = dataset.len();
    Ok(summary)
}
