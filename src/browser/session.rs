use crate::browser::{ContextId, Locator, Session,
                     config::{ConnectionOptions, LaunchOptions}};
use crate::error::{BrowserError, Result};
use headless_chrome::{Browser, Element, Tab, util::Wait};
use serde_json::Value;
use std::{ffi::OsStr, fmt, sync::Arc, time::Duration};

/// Attribute that tags every element handed out by a lookup
const HANDLE_ATTRIBUTE: &str = "data-crd-handle";

// Runs a CSS or XPath query under `scope` (the document when null) and tags each match
// with a stable handle. Returns the handles as a JSON string, or `null` once the scope is gone.
const LOOKUP_JS: &str = r#"
    function(attribute, scopeHandle, kind, query) {
        const scope = scopeHandle === null
            ? document
            : document.querySelector('[' + attribute + '="' + scopeHandle + '"]');
        if (!scope) {
            return JSON.stringify(null);
        }

        const found = [];
        if (kind === 'css') {
            found.push(...scope.querySelectorAll(query));
        } else {
            const snapshot = document.evaluate(query, scope, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            for (let i = 0; i < snapshot.snapshotLength; i++) {
                found.push(snapshot.snapshotItem(i));
            }
        }

        window.__crdNextHandle = window.__crdNextHandle || 1;
        const handles = found
            .filter((node) => node.nodeType === Node.ELEMENT_NODE)
            .map((element) => {
                if (!element.hasAttribute(attribute)) {
                    element.setAttribute(attribute, String(window.__crdNextHandle++));
                }
                return Number(element.getAttribute(attribute));
            });
        return JSON.stringify(handles);
    }
"#;

const IS_VISIBLE_JS: &str = r#"
    function() {
        const style = window.getComputedStyle(this);
        if (style.display === 'none' || style.visibility === 'hidden') {
            return false;
        }
        return this.getClientRects().length > 0;
    }
"#;

// Properties win over attributes so that `href` comes back absolute
const READ_ATTRIBUTE_JS: &str = r#"
    function(name) {
        const value = this[name];
        if (typeof value === 'string') {
            return value;
        }
        return this.getAttribute(name);
    }
"#;

const SCROLL_CENTER_JS: &str = r#"
    function() {
        this.scrollIntoView({block: 'center'});
        return true;
    }
"#;

/// Expression evaluating `locator` inside the element tagged `scope`, or the whole document
fn lookup_script(scope: Option<u64>, locator: &Locator) -> String {
    let (kind, query) = match locator {
        Locator::Css(selector) => ("css", selector.clone()),
        other => ("xpath", other.to_xpath(true).unwrap_or_default()),
    };

    format!(
        "({})({}, {}, {}, {})",
        LOOKUP_JS.trim(),
        Value::from(HANDLE_ATTRIBUTE),
        scope.map_or(Value::Null, Value::from),
        Value::from(kind),
        Value::from(query)
    )
}

/// Decode the JSON string `LOOKUP_JS` hands back
fn parse_handles(value: Option<&Value>, locator: &Locator) -> Result<Vec<u64>> {
    let json = value
        .and_then(Value::as_str)
        .ok_or_else(|| BrowserError::EvaluationFailed(format!("Lookup of {} returned no value", locator)))?;

    let handles: Option<Vec<u64>> = serde_json::from_str(json)
        .map_err(|e| BrowserError::EvaluationFailed(format!("Lookup of {} returned garbage: {}", locator, e)))?;

    handles.ok_or_else(|| BrowserError::ElementNotFound(format!("Scope of {} is no longer attached", locator)))
}

/// Element handle that survives DOM node id churn.
///
/// The element carries a `data-crd-handle` attribute; every operation resolves it again
/// through that attribute instead of holding on to a CDP node id.
#[derive(Clone)]
pub struct ChromeElement {
    tab: Arc<Tab>,
    handle: u64,
}

impl ChromeElement {
    fn selector(&self) -> String {
        format!("[{}=\"{}\"]", HANDLE_ATTRIBUTE, self.handle)
    }

    fn with<T>(&self, f: impl FnOnce(&Element<'_>) -> Result<T>) -> Result<T> {
        let element = self
            .tab
            .find_element(&self.selector())
            .map_err(|e| BrowserError::ElementNotFound(format!("Stale element handle {}: {}", self.handle, e)))?;
        f(&element)
    }
}

impl fmt::Debug for ChromeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromeElement")
            .field("tab", self.tab.get_target_id())
            .field("handle", &self.handle)
            .finish()
    }
}

/// Browser session that manages a Chrome/Chromium instance
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,

    /// Tab the session currently operates on; `None` right after closing one
    current: Option<Arc<Tab>>,

    navigation_timeout: Duration,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Ignore default arguments to prevent detection by anti-bot services
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));
        launch_opts.args.push(OsStr::new("--disable-dev-shm-usage"));

        // A full archive run easily outlasts the default 30 second idle timeout
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));
        launch_opts.sandbox = options.sandbox;

        if let Some(path) = options.chrome_path {
            launch_opts.path = Some(path);
        }

        if let Some(dir) = options.user_data_dir {
            launch_opts.user_data_dir = Some(dir);
        }

        let browser = Browser::new(launch_opts).map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .wait_for_initial_tab()
            .map_err(|e| BrowserError::LaunchFailed(format!("No initial tab: {}", e)))?;

        Ok(Self { browser, current: Some(tab), navigation_timeout: options.navigation_timeout })
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser = Browser::connect(options.ws_url).map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        let mut session = Self { browser, current: None, navigation_timeout: options.navigation_timeout };
        let first = session
            .tabs()?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::ConnectionFailed("Browser has no open tabs".to_string()))?;
        session.current = Some(first);

        Ok(session)
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// All tabs in opening order
    fn tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| BrowserError::SessionLost(format!("Tab list unavailable: {}", e)))?
            .clone();

        Ok(tabs)
    }

    fn tab(&self) -> Result<Arc<Tab>> {
        self.current
            .clone()
            .ok_or_else(|| BrowserError::TabOperationFailed("No current tab selected".to_string()))
    }


    fn lookup(tab: &Arc<Tab>, scope: Option<u64>, locator: &Locator) -> Result<Vec<ChromeElement>> {
        let result = tab
            .evaluate(&lookup_script(scope, locator), false)
            .map_err(|e| BrowserError::EvaluationFailed(format!("Lookup of {} failed: {}", locator, e)))?;

        Ok(parse_handles(result.value.as_ref(), locator)?
            .into_iter()
            .map(|handle| ChromeElement { tab: tab.clone(), handle })
            .collect())
    }
}

impl Session for BrowserSession {
    type Element = ChromeElement;

    fn navigate(&mut self, url: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.set_default_timeout(self.navigation_timeout);
        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| BrowserError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e)))?;

        Ok(())
    }

    fn find_elements(&mut self, scope: Option<&ChromeElement>, locator: &Locator) -> Result<Vec<ChromeElement>> {
        match scope {
            None => Self::lookup(&self.tab()?, None, locator),
            Some(scope) => Self::lookup(&scope.tab, Some(scope.handle), locator),
        }
    }

    fn wait_for_elements(&mut self, locator: &Locator, timeout: Duration) -> Result<Vec<ChromeElement>> {
        let tab = self.tab()?;
        Wait::with_timeout(timeout)
            .until(|| Self::lookup(&tab, None, locator).ok().filter(|found| !found.is_empty()))
            .map_err(|_| BrowserError::timeout(locator.to_string(), timeout))
    }


    fn attribute(&mut self, element: &ChromeElement, name: &str) -> Result<Option<String>> {
        element.with(|element| {
            let result = element
                .call_js_fn(READ_ATTRIBUTE_JS, vec![serde_json::json!(name)], false)
                .map_err(|e| BrowserError::EvaluationFailed(format!("Reading `{}` failed: {}", name, e)))?;

            Ok(result.value.and_then(|value| value.as_str().map(str::to_string)))
        })
    }

    fn text(&mut self, element: &ChromeElement) -> Result<String> {
        element.with(|element| {
            element
                .get_inner_text()
                .map_err(|e| BrowserError::EvaluationFailed(format!("Reading text failed: {}", e)))
        })
    }

    fn is_visible(&mut self, element: &ChromeElement) -> Result<bool> {
        element.with(|element| {
            let result = element
                .call_js_fn(IS_VISIBLE_JS, vec![], false)
                .map_err(|e| BrowserError::EvaluationFailed(format!("Visibility check failed: {}", e)))?;

            Ok(result.value.and_then(|value| value.as_bool()).unwrap_or(false))
        })
    }

    fn click(&mut self, element: &ChromeElement) -> Result<()> {
        element.with(|element| {
            element
                .click()
                .map_err(|e| BrowserError::InteractionFailed(format!("Click failed: {}", e)))?;
            Ok(())
        })
    }

    fn scroll_into_view(&mut self, element: &ChromeElement) -> Result<()> {
        element.with(|element| {
            element
                .call_js_fn(SCROLL_CENTER_JS, vec![], false)
                .map_err(|e| BrowserError::InteractionFailed(format!("Scroll failed: {}", e)))?;
            Ok(())
        })
    }

    fn contexts(&mut self) -> Result<Vec<ContextId>> {
        Ok(self
            .tabs()?
            .iter()
            .map(|tab| ContextId(tab.get_target_id().to_string()))
            .collect())
    }

    fn switch_to(&mut self, context: &ContextId) -> Result<()> {
        let tab = self
            .tabs()?
            .into_iter()
            .find(|tab| tab.get_target_id().as_str() == context.0)
            .ok_or_else(|| BrowserError::TabOperationFailed(format!("No tab with id {}", context)))?;

        tab.activate()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to activate tab {}: {}", context, e)))?;
        self.current = Some(tab);

        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        let tab = self.tab()?;
        let id = tab.get_target_id().to_string();

        tab.close(false)
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to close tab {}: {}", id, e)))?;
        self.current = None;

        // The tab list is updated asynchronously once Chrome confirms the target is gone
        let gone = Wait::with_timeout(Duration::from_secs(5)).until(|| {
            let tabs = self.tabs().ok()?;
            (!tabs.iter().any(|tab| tab.get_target_id().as_str() == id)).then_some(())
        });
        if gone.is_err() {
            log::debug!("Tab {} still listed after close", id);
        }

        Ok(())
    }

    fn wait_for_context_count(&mut self, count: usize, timeout: Duration) -> Result<()> {
        Wait::with_timeout(timeout)
            .until(|| {
                let open = self.tabs().ok()?.len();
                (open == count).then_some(())
            })
            .map_err(|_| BrowserError::timeout(format!("{} open tabs", count), timeout))
    }


    fn quit(&mut self) -> Result<()> {
        // headless_chrome has no explicit shutdown; the process goes away with `Browser`.
        // Closing every tab makes the shutdown visible right away.
        for tab in self.tabs()? {
            if let Err(e) = tab.close(false) {
                log::debug!("Failed to close tab {} on quit: {}", tab.get_target_id(), e);
            }
        }
        self.current = None;

        Ok(())
    }
}
