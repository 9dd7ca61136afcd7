//! In-memory session used by unit tests.
//!
//! Pages are small trees of [`FakeNode`]s keyed by URL. Clicking a node with
//! `opens` URLs appends one context per URL, like a `target="_blank"` link.

use crate::browser::{ContextId, Locator, Session};
use crate::error::{BrowserError, Result};
use std::{collections::{HashMap, HashSet}, time::Duration};

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub hidden: bool,
    pub children: Vec<FakeNode>,
    pub opens: Vec<String>,
    pub click_fails: bool,
    pub click_crashes: bool,
}

impl FakeNode {
    pub fn new(tag: &str) -> Self {
        Self { tag: tag.to_string(), ..Default::default() }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn child(mut self, child: FakeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = FakeNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn opens(mut self, url: &str) -> Self {
        self.opens.push(url.to_string());
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }

    /// Clicking takes the whole browser down
    pub fn crashing_click(mut self) -> Self {
        self.click_crashes = true;
        self
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn full_text(&self) -> String {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(self.text.clone());
        }
        parts.extend(self.children.iter().map(FakeNode::full_text).filter(|t| !t.is_empty()));
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    url: String,
    path: Vec<usize>,
}

#[derive(Debug, Clone)]
struct FakeContext {
    id: ContextId,
    url: String,
}

#[derive(Debug, Default)]
pub struct FakeSession {
    pages: HashMap<String, FakeNode>,
    contexts: Vec<FakeContext>,
    current: Option<ContextId>,
    next_id: usize,
    lost_on: HashSet<String>,
    pub navigations: Vec<String>,
    /// URLs of contexts opened by clicks
    pub opened: Vec<String>,
    pub quit_calls: usize,
}

impl FakeSession {
    /// A session with a single blank main context
    pub fn new() -> Self {
        let mut session = Self::default();
        let id = session.open_context("about:blank");
        session.current = Some(id);
        session
    }

    pub fn add_page(&mut self, url: &str, root: FakeNode) {
        self.pages.insert(url.to_string(), root);
    }

    /// Point the main context at `url` without going through [`Session::navigate`]
    pub fn navigate_main(&mut self, url: &str) {
        self.contexts[0].url = url.to_string();
    }

    /// Navigating to `url` kills every context, as a crashed browser would
    pub fn lose_session_on(&mut self, url: &str) {
        self.lost_on.insert(url.to_string());
    }

    pub fn drop_all_contexts(&mut self) {
        self.contexts.clear();
        self.current = None;
    }

    pub fn context_ids(&self) -> Vec<ContextId> {
        self.contexts.iter().map(|c| c.id.clone()).collect()
    }

    pub fn current_url(&self) -> Option<String> {
        self.current_context().map(|c| c.url.clone())
    }

    fn open_context(&mut self, url: &str) -> ContextId {
        let id = ContextId(format!("ctx-{}", self.next_id));
        self.next_id += 1;
        self.contexts.push(FakeContext { id: id.clone(), url: url.to_string() });
        id
    }

    fn current_context(&self) -> Option<&FakeContext> {
        let current = self.current.as_ref()?;
        self.contexts.iter().find(|c| &c.id == current)
    }

    fn resolve(&self, element: &FakeElement) -> Result<&FakeNode> {
        let mut node = self
            .pages
            .get(&element.url)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("No page {}", element.url)))?;
        for &i in &element.path {
            node = node
                .children
                .get(i)
                .ok_or_else(|| BrowserError::ElementNotFound(format!("Stale path {:?}", element.path)))?;
        }
        Ok(node)
    }

    fn collect(node: &FakeNode, path: &mut Vec<usize>, locator: &Locator, out: &mut Vec<Vec<usize>>) {
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            if matches(child, &node.children[..i], locator) {
                out.push(path.clone());
            }
            Self::collect(child, path, locator, out);
            path.pop();
        }
    }
}

fn matches(node: &FakeNode, earlier_siblings: &[FakeNode], locator: &Locator) -> bool {
    match locator {
        Locator::Css(selector) => matches_css(node, selector),
        Locator::PartialLinkText(text) => node.tag == "a" && node.full_text().contains(text.as_str()),
        Locator::CellAfterLabel(label) => {
            node.tag == "td"
                && earlier_siblings.iter().any(|s| s.tag == "td" && s.text.contains(label.as_str()))
        }
    }
}

/// Supports `tag`, `tag[attr]`, `tag[attr='v']` and `tag[attr^='v']`
fn matches_css(node: &FakeNode, selector: &str) -> bool {
    let (tag, condition) = match selector.split_once('[') {
        Some((tag, rest)) => (tag, Some(rest.trim_end_matches(']'))),
        None => (selector, None),
    };
    if node.tag != tag {
        return false;
    }

    let Some(condition) = condition else {
        return true;
    };
    let unquote = |v: &str| v.trim_matches(|c| c == '\'' || c == '"').to_string();
    if let Some((name, value)) = condition.split_once("^=") {
        node.attribute(name).is_some_and(|v| v.starts_with(&unquote(value)))
    } else if let Some((name, value)) = condition.split_once('=') {
        node.attribute(name).is_some_and(|v| v == unquote(value))
    } else {
        node.attribute(condition).is_some()
    }
}

impl Session for FakeSession {
    type Element = FakeElement;

    fn navigate(&mut self, url: &str) -> Result<()> {
        if self.lost_on.contains(url) {
            self.drop_all_contexts();
            return Err(BrowserError::SessionLost(format!("Browser crashed loading {}", url)));
        }

        let current = self.current.clone().ok_or_else(|| BrowserError::TabOperationFailed("No current context".into()))?;
        let context = self
            .contexts
            .iter_mut()
            .find(|c| c.id == current)
            .ok_or_else(|| BrowserError::TabOperationFailed("Current context is closed".into()))?;
        context.url = url.to_string();
        self.navigations.push(url.to_string());

        Ok(())
    }

    fn find_elements(&mut self, scope: Option<&FakeElement>, locator: &Locator) -> Result<Vec<FakeElement>> {
        let (url, base) = match scope {
            Some(scope) => (scope.url.clone(), scope.path.clone()),
            None => {
                let context = self
                    .current_context()
                    .ok_or_else(|| BrowserError::TabOperationFailed("No current context".into()))?;
                (context.url.clone(), Vec::new())
            }
        };

        let Some(root) = self.pages.get(&url) else {
            return Ok(Vec::new());
        };
        let root = if base.is_empty() { root } else { self.resolve(&FakeElement { url: url.clone(), path: base.clone() })? };

        let mut found = Vec::new();
        let mut path = base;
        Self::collect(root, &mut path, locator, &mut found);

        Ok(found.into_iter().map(|path| FakeElement { url: url.clone(), path }).collect())
    }

    fn wait_for_elements(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<FakeElement>> {
        let found = self.find_elements(None, locator)?;
        if found.is_empty() {
            return Err(BrowserError::timeout(locator.to_string(), timeout));
        }
        Ok(found)
    }

    fn attribute(&mut self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        Ok(self.resolve(element)?.attribute(name).map(str::to_string))
    }

    fn text(&mut self, element: &FakeElement) -> Result<String> {
        Ok(self.resolve(element)?.full_text())
    }

    fn is_visible(&mut self, element: &FakeElement) -> Result<bool> {
        Ok(!self.resolve(element)?.hidden)
    }

    fn click(&mut self, element: &FakeElement) -> Result<()> {
        let node = self.resolve(element)?;
        if node.click_crashes {
            self.drop_all_contexts();
            return Err(BrowserError::SessionLost("Browser crashed on click".into()));
        }
        if node.click_fails {
            return Err(BrowserError::InteractionFailed("Element is not clickable".into()));
        }

        for url in node.opens.clone() {
            self.open_context(&url);
            self.opened.push(url);
        }
        Ok(())
    }

    fn scroll_into_view(&mut self, element: &FakeElement) -> Result<()> {
        self.resolve(element).map(|_| ())
    }

    fn contexts(&mut self) -> Result<Vec<ContextId>> {
        Ok(self.context_ids())
    }

    fn switch_to(&mut self, context: &ContextId) -> Result<()> {
        if !self.contexts.iter().any(|c| &c.id == context) {
            return Err(BrowserError::TabOperationFailed(format!("No context {}", context)));
        }
        self.current = Some(context.clone());
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        let current = self.current.take().ok_or_else(|| BrowserError::TabOperationFailed("No current context".into()))?;
        self.contexts.retain(|c| c.id != current);
        Ok(())
    }

    fn wait_for_context_count(&mut self, count: usize, timeout: Duration) -> Result<()> {
        if self.contexts.len() != count {
            return Err(BrowserError::timeout(format!("{} open contexts", count), timeout));
        }
        Ok(())
    }

    fn quit(&mut self) -> Result<()> {
        self.quit_calls += 1;
        Ok(())
    }
}

/// Builders for archive-shaped pages
pub mod pages {
    use super::FakeNode;

    pub fn archive(links: &[&str]) -> FakeNode {
        FakeNode::new("body").children(
            links
                .iter()
                .map(|href| FakeNode::new("a").attr("href", href).text("reaction data")),
        )
    }

    /// Reaction panel whose "Details" link opens `detail`
    pub fn pane(id: usize, smiles: Option<&str>, detail: Option<&str>) -> FakeNode {
        let mut pane = FakeNode::new("div").attr("id", &format!("reaction-pane-{}", id));
        if let Some(smiles) = smiles {
            pane = pane.child(FakeNode::new("button").attr("data-reaction-smiles", smiles).text("SMILES"));
        }
        let mut details = FakeNode::new("a").attr("href", "#").text("Details");
        if let Some(detail) = detail {
            details = details.opens(detail);
        }
        pane.child(details)
    }

    pub fn reaction_page(panes: impl IntoIterator<Item = FakeNode>) -> FakeNode {
        FakeNode::new("body").children(panes)
    }

    pub fn cell(text: &str) -> FakeNode {
        FakeNode::new("td").text(text)
    }

    pub fn row(cells: &[&str]) -> FakeNode {
        FakeNode::new("tr").children(cells.iter().map(|c| cell(c)))
    }

    /// Four-column row: role, amount, name, profile link
    pub fn profiled_row(role: &str, name: &str, profile: &str) -> FakeNode {
        let link = FakeNode::new("a").attr("href", profile).text("profile").opens(profile);
        FakeNode::new("tr")
            .child(cell(role))
            .child(cell("1.0 eq"))
            .child(cell(name))
            .child(FakeNode::new("td").child(link))
    }

    pub fn table(rows: impl IntoIterator<Item = FakeNode>) -> FakeNode {
        FakeNode::new("table").children(rows)
    }

    pub fn detail(tables: impl IntoIterator<Item = FakeNode>) -> FakeNode {
        FakeNode::new("body").children(tables)
    }

    pub fn profile(smiles: Option<&str>) -> FakeNode {
        let mut rows = vec![row(&["Name", "molecule"])];
        if let Some(smiles) = smiles {
            rows.push(row(&["Smiles", smiles]));
        }
        FakeNode::new("body").child(table(rows))
    }
}
