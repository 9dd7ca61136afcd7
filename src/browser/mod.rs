//! Browsing session capability
//!
//! The scraper never talks to Chrome directly. It drives a [`Session`], which can
//! open pages, locate elements, and juggle several browsing contexts (tabs).
//! [`BrowserSession`] implements it over `headless_chrome`; tests use an in-memory fake.

pub mod config;
pub mod contexts;
pub mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use config::{ConnectionOptions, LaunchOptions};
pub use contexts::{ContextStack, DETAIL_DEPTH, MAIN_DEPTH, PROFILE_DEPTH};
pub use session::{BrowserSession, ChromeElement};

use crate::error::Result;
use std::{fmt, time::Duration};

/// Opaque handle of one browsing context (a tab)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(pub String);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an element is located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// `<a>` elements whose visible text contains the fragment
    PartialLinkText(String),
    /// `<td>` cell directly following a `<td>` whose text contains the label
    CellAfterLabel(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn link_text(fragment: impl Into<String>) -> Self {
        Locator::PartialLinkText(fragment.into())
    }

    pub fn cell_after(label: impl Into<String>) -> Self {
        Locator::CellAfterLabel(label.into())
    }

    /// XPath equivalent, relative to the scope when `relative` is set
    pub fn to_xpath(&self, relative: bool) -> Option<String> {
        let prefix = if relative { "." } else { "" };
        match self {
            Locator::Css(_) => None,
            Locator::PartialLinkText(text) => Some(format!("{prefix}//a[contains(., '{text}')]")),
            Locator::CellAfterLabel(label) => {
                Some(format!("{prefix}//td[contains(text(), '{label}')]/following-sibling::td"))
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css `{selector}`"),
            Locator::PartialLinkText(text) => write!(f, "link containing `{text}`"),
            Locator::CellAfterLabel(label) => write!(f, "cell after `{label}`"),
        }
    }
}

/// A browsing session the scraper can drive.
///
/// Contexts behave like tabs: clicking a link that targets a new window appends a
/// context to [`Session::contexts`] (newest last) without switching to it.
pub trait Session {
    type Element: Clone + fmt::Debug;

    /// Load `url` in the current context
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// All elements matching `locator`, inside `scope` or the current page. May be empty.
    fn find_elements(&mut self, scope: Option<&Self::Element>, locator: &Locator) -> Result<Vec<Self::Element>>;

    /// Wait until at least one element in the current page matches `locator`
    fn wait_for_elements(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<Self::Element>>;

    /// DOM property or attribute value
    fn attribute(&mut self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Rendered text of the element and its descendants
    fn text(&mut self, element: &Self::Element) -> Result<String>;

    fn is_visible(&mut self, element: &Self::Element) -> Result<bool>;

    fn click(&mut self, element: &Self::Element) -> Result<()>;

    fn scroll_into_view(&mut self, element: &Self::Element) -> Result<()>;

    /// Open contexts in opening order
    fn contexts(&mut self) -> Result<Vec<ContextId>>;

    fn switch_to(&mut self, context: &ContextId) -> Result<()>;

    /// Close the current context. The session has no current context until the next switch.
    fn close_current(&mut self) -> Result<()>;

    /// Wait until exactly `count` contexts are open
    fn wait_for_context_count(&mut self, count: usize, timeout: Duration) -> Result<()>;

    /// Shut the session down
    fn quit(&mut self) -> Result<()>;
}
