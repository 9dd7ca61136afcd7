//! Discovery of archive pages from the index

use crate::browser::{Locator, Session};
use crate::error::{Result, ScrapeError};
use indexmap::IndexSet;
use std::time::Duration;

/// Link text marking an archive page with reaction data
pub const REACTION_LINK_TEXT: &str = "reaction data";

/// Collect the distinct reaction-data page URLs listed on the archive index.
///
/// Order is first appearance on the index; `max_pages` truncates after
/// de-duplication. The index not showing any link within `timeout` is fatal.
pub fn collect_links<S: Session>(
    session: &mut S,
    archive_url: &str,
    max_pages: Option<usize>,
    timeout: Duration,
) -> std::result::Result<Vec<String>, ScrapeError> {
    log::info!("Loading archive: {}", archive_url);

    let links = session
        .navigate(archive_url)
        .and_then(|_| session.wait_for_elements(&Locator::link_text(REACTION_LINK_TEXT), timeout))
        .map_err(|source| ScrapeError::ArchiveUnreachable { url: archive_url.to_string(), source })?;

    let mut targets = IndexSet::new();
    for link in &links {
        if let Some(href) = read_href(session, link)? {
            targets.insert(href);
        }
    }

    let mut targets: Vec<String> = targets.into_iter().collect();
    if let Some(max) = max_pages {
        targets.truncate(max);
        log::info!("Limit applied: scraping only the first {} pages", max);
    }

    log::info!("Found {} reaction pages to scrape", targets.len());
    Ok(targets)
}

fn read_href<S: Session>(session: &mut S, link: &S::Element) -> Result<Option<String>> {
    match session.attribute(link, "href") {
        Ok(href) => Ok(href.filter(|h| !h.is_empty())),
        Err(e) if e.is_session_lost() => Err(e),
        Err(e) => {
            log::debug!("Skipping link without readable href: {}", e);
            Ok(None)
        }
    }
}
