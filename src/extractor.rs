//! Reaction extraction for a single archive page.
//!
//! Every visible reaction panel is walked through the same sequence: read the
//! reaction SMILES, open the detail tab, pick the reagent table, scan its rows
//! (opening a molecule profile tab for reactants and products), build the record,
//! and close the detail tab again. Failures are contained at the smallest scope
//! that can absorb them: a row loses its SMILES, a panel is abandoned, and only a
//! lost browser session escapes to the caller.

use crate::browser::{ContextStack, DETAIL_DEPTH, Locator, MAIN_DEPTH, PROFILE_DEPTH, Session};
use crate::config::ScrapeConfig;
use crate::error::{BrowserError, Result};
use crate::record::{ReactionRecord, Role, RoleBuckets, UNAVAILABLE_SMILES};
use std::{thread, time::Duration};
use thiserror::Error;

pub const PANE_SELECTOR: &str = "div[id^='reaction-pane-']";
pub const SMILES_BUTTON_SELECTOR: &str = "button[data-reaction-smiles]";
pub const SMILES_ATTRIBUTE: &str = "data-reaction-smiles";
pub const DETAILS_LINK_TEXT: &str = "Details";
pub const SMILES_LABEL: &str = "Smiles";
const PROFILE_HREF_MARKER: &str = "profile";
const TABLE_MARKERS: [&str; 2] = ["reactant", "product"];

/// Why a reaction panel produced no record
#[derive(Debug, Error)]
pub enum PanelFailure {
    #[error("could not click Details: {0}")]
    DetailsUnavailable(#[source] BrowserError),

    #[error("detail tab did not open: {0}")]
    DetailContext(#[source] BrowserError),

    #[error("no table in detail tab: {0}")]
    NoTable(#[source] BrowserError),

    #[error("detail tab became unreadable: {0}")]
    Interrupted(#[source] BrowserError),
}

impl PanelFailure {
    pub fn cause(&self) -> &BrowserError {
        match self {
            PanelFailure::DetailsUnavailable(e)
            | PanelFailure::DetailContext(e)
            | PanelFailure::NoTable(e)
            | PanelFailure::Interrupted(e) => e,
        }
    }

    pub fn is_session_lost(&self) -> bool {
        self.cause().is_session_lost()
    }

    pub fn into_cause(self) -> BrowserError {
        match self {
            PanelFailure::DetailsUnavailable(e)
            | PanelFailure::DetailContext(e)
            | PanelFailure::NoTable(e)
            | PanelFailure::Interrupted(e) => e,
        }
    }
}

/// Why a reactant or product row has no SMILES
#[derive(Debug, Error)]
pub enum RowFailure {
    #[error("row has no profile link")]
    NoProfileLink,

    #[error("profile tab did not open: {0}")]
    ProfileContext(#[source] BrowserError),

    #[error("profile lists no SMILES")]
    SmilesMissing,

    #[error("profile lookup failed: {0}")]
    Interrupted(#[source] BrowserError),
}

#[derive(Debug)]
pub struct AbandonedPanel {
    pub reaction_id: usize,
    pub failure: PanelFailure,
}

/// What one archive page yielded
#[derive(Debug, Default)]
pub struct PageReport {
    pub records: Vec<ReactionRecord>,
    pub visible_panels: usize,
    pub abandoned: Vec<AbandonedPanel>,
    /// Reactant/product rows whose SMILES could not be looked up
    pub structure_misses: usize,
}

/// Drives one session through archive pages, one panel at a time
pub struct PageExtractor<'a, S: Session> {
    session: &'a mut S,
    stack: ContextStack,
    timeout: Duration,
    settle_pause: Duration,
}

impl<'a, S: Session> PageExtractor<'a, S> {
    pub fn new(session: &'a mut S, config: &ScrapeConfig) -> Result<Self> {
        let stack = ContextStack::attach(session)?;
        Ok(Self { session, stack, timeout: config.wait_timeout, settle_pause: config.settle_pause })
    }

    /// Extract every visible reaction on `page_url`.
    ///
    /// Errors mean the page as a whole could not be processed (no panels, failed
    /// navigation, lost session). Panel and row failures are reported in the
    /// [`PageReport`] instead.
    pub fn extract_page(&mut self, page_url: &str, page_index: usize) -> Result<PageReport> {
        self.stack.unwind_to(self.session, MAIN_DEPTH)?;
        self.session.navigate(page_url)?;

        let panes = self.session.wait_for_elements(&Locator::css(PANE_SELECTOR), self.timeout)?;
        let mut visible = Vec::with_capacity(panes.len());
        for pane in panes {
            match self.session.is_visible(&pane) {
                Ok(true) => visible.push(pane),
                Ok(false) => {}
                Err(e) if e.is_session_lost() => return Err(e),
                Err(e) => log::debug!("Treating panel as hidden: {}", e),
            }
        }

        let count = visible.len();
        log::info!("Page {}: found {} visible reactions", page_index + 1, count);

        let mut report = PageReport { visible_panels: count, ..Default::default() };
        for (i, pane) in visible.iter().enumerate() {
            let reaction_id = i + 1;
            log::info!("  > Scraping reaction {} of {}", reaction_id, count);

            match self.extract_panel(page_url, reaction_id, pane, &mut report.structure_misses) {
                Ok(record) => report.records.push(record),
                Err(failure) if failure.is_session_lost() => return Err(failure.into_cause()),
                Err(failure) => {
                    log::warn!("    [Skip] Reaction {}: {}", reaction_id, failure);
                    report.abandoned.push(AbandonedPanel { reaction_id, failure });
                }
            }
        }

        self.stack.verify(self.session, MAIN_DEPTH)?;
        Ok(report)
    }

    fn extract_panel(
        &mut self,
        page_url: &str,
        reaction_id: usize,
        pane: &S::Element,
        structure_misses: &mut usize,
    ) -> std::result::Result<ReactionRecord, PanelFailure> {
        self.stack.unwind_to(self.session, MAIN_DEPTH).map_err(PanelFailure::Interrupted)?;

        let main_smiles = self.read_main_smiles(pane);

        if let Err(e) = self.open_details(pane) {
            return Err(self.abandon(PanelFailure::DetailsUnavailable(e)));
        }

        if let Err(e) = self.stack.open_newest(self.session, self.timeout) {
            return Err(self.abandon(PanelFailure::DetailContext(e)));
        }

        let table = match self.locate_table() {
            Ok(table) => table,
            Err(e) => return Err(self.abandon(PanelFailure::NoTable(e))),
        };

        let buckets = match self.scan_table(&table, structure_misses) {
            Ok(buckets) => buckets,
            Err(e) => return Err(self.abandon(PanelFailure::Interrupted(e))),
        };
        let record = buckets.into_record(page_url, reaction_id, main_smiles);

        if let Err(e) = self.stack.close_top(self.session) {
            if e.is_session_lost() {
                return Err(PanelFailure::Interrupted(e));
            }
            log::warn!("    Detail tab did not close cleanly: {}", e);
            self.stack.unwind_to(self.session, MAIN_DEPTH).map_err(PanelFailure::Interrupted)?;
        }
        self.settle();

        Ok(record)
    }

    /// Restore the main context after a panel failure
    fn abandon(&mut self, failure: PanelFailure) -> PanelFailure {
        match self.stack.unwind_to(self.session, MAIN_DEPTH) {
            Ok(()) => failure,
            Err(e) if e.is_session_lost() => PanelFailure::Interrupted(e),
            Err(e) => {
                log::warn!("    Contexts not fully restored: {}", e);
                failure
            }
        }
    }

    fn read_main_smiles(&mut self, pane: &S::Element) -> String {
        let button = self
            .session
            .find_elements(Some(pane), &Locator::css(SMILES_BUTTON_SELECTOR))
            .ok()
            .and_then(|found| found.into_iter().next());

        button
            .and_then(|button| self.session.attribute(&button, SMILES_ATTRIBUTE).ok().flatten())
            .unwrap_or_else(|| UNAVAILABLE_SMILES.to_string())
    }

    fn open_details(&mut self, pane: &S::Element) -> Result<()> {
        self.session.scroll_into_view(pane)?;
        self.settle();

        let details = self
            .session
            .find_elements(Some(pane), &Locator::link_text(DETAILS_LINK_TEXT))?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::ElementNotFound(format!("No `{}` link in panel", DETAILS_LINK_TEXT)))?;

        self.session.click(&details)
    }

    /// First table mentioning reactants or products, else the last table
    fn locate_table(&mut self) -> Result<S::Element> {
        let tables = self.session.wait_for_elements(&Locator::css("table"), self.timeout)?;

        for table in &tables {
            let text = match self.session.text(table) {
                Ok(text) => text.to_lowercase(),
                Err(e) if e.is_session_lost() => return Err(e),
                Err(_) => continue,
            };
            if TABLE_MARKERS.iter().any(|marker| text.contains(marker)) {
                return Ok(table.clone());
            }
        }

        tables
            .last()
            .cloned()
            .ok_or_else(|| BrowserError::ElementNotFound("table".to_string()))
    }

    fn scan_table(&mut self, table: &S::Element, structure_misses: &mut usize) -> Result<RoleBuckets> {
        let rows = self.session.find_elements(Some(table), &Locator::css("tr"))?;
        let mut buckets = RoleBuckets::default();

        for row in &rows {
            let Some((role, name)) = self.read_row(row)? else {
                continue;
            };

            let mut smiles = None;
            if Role::wants_structure(&role) {
                match self.lookup_structure(row) {
                    Ok(found) => smiles = Some(found),
                    Err(RowFailure::ProfileContext(e) | RowFailure::Interrupted(e)) if e.is_session_lost() => {
                        return Err(e);
                    }
                    Err(failure) => {
                        log::debug!("    No SMILES for {} `{}`: {}", role, name, failure);
                        *structure_misses += 1;
                    }
                }
                self.stack.verify(self.session, DETAIL_DEPTH)?;
            }

            buckets.dispatch(&role, name, smiles);
        }

        Ok(buckets)
    }

    /// Lowercased role and name of a row with at least three cells
    fn read_row(&mut self, row: &S::Element) -> Result<Option<(String, String)>> {
        let cells = match self.session.find_elements(Some(row), &Locator::css("td")) {
            Ok(cells) => cells,
            Err(e) if e.is_session_lost() => return Err(e),
            Err(_) => return Ok(None),
        };
        if cells.len() < 3 {
            return Ok(None);
        }

        let role = self.session.text(&cells[0]);
        let name = self.session.text(&cells[2]);
        match (role, name) {
            (Ok(role), Ok(name)) => Ok(Some((role.trim().to_lowercase(), name.trim().to_string()))),
            (Err(e), _) | (_, Err(e)) if e.is_session_lost() => Err(e),
            _ => Ok(None),
        }
    }

    /// SMILES from the row's molecule profile. Always returns with the detail context current.
    fn lookup_structure(&mut self, row: &S::Element) -> std::result::Result<String, RowFailure> {
        let link = self.profile_link(row)?;

        let smiles = match self.read_profile(&link) {
            Ok(smiles) => smiles,
            Err(failure) => {
                if let Err(e) = self.stack.unwind_to(self.session, DETAIL_DEPTH) {
                    if e.is_session_lost() {
                        return Err(RowFailure::Interrupted(e));
                    }
                    log::warn!("    Profile tabs not fully closed: {}", e);
                }
                return Err(failure);
            }
        };

        smiles.filter(|s| !s.is_empty()).ok_or(RowFailure::SmilesMissing)
    }

    fn profile_link(&mut self, row: &S::Element) -> std::result::Result<S::Element, RowFailure> {
        let links = self
            .session
            .find_elements(Some(row), &Locator::css("a"))
            .map_err(RowFailure::Interrupted)?;

        for link in links {
            let href = self.session.attribute(&link, "href").map_err(RowFailure::Interrupted)?;
            if href.is_some_and(|href| href.contains(PROFILE_HREF_MARKER)) {
                return Ok(link);
            }
        }

        Err(RowFailure::NoProfileLink)
    }

    fn read_profile(&mut self, link: &S::Element) -> std::result::Result<Option<String>, RowFailure> {
        self.session.click(link).map_err(RowFailure::Interrupted)?;
        self.stack
            .open_newest(self.session, self.timeout)
            .map_err(RowFailure::ProfileContext)?;
        debug_assert_eq!(self.stack.depth(), PROFILE_DEPTH);

        let smiles = match self.session.wait_for_elements(&Locator::cell_after(SMILES_LABEL), self.timeout) {
            Ok(cells) => match cells.first() {
                Some(cell) => Some(self.session.text(cell).map_err(RowFailure::Interrupted)?.trim().to_string()),
                None => None,
            },
            Err(e) if e.is_session_lost() => return Err(RowFailure::Interrupted(e)),
            Err(_) => None,
        };

        self.stack.close_top(self.session).map_err(RowFailure::Interrupted)?;
        Ok(smiles)
    }

    fn settle(&self) {
        if !self.settle_pause.is_zero() {
            thread::sleep(self.settle_pause);
        }
    }
}
