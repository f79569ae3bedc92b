//! Browser driver seam.
//!
//! [`BrowserDriver`] is the capability set the testers consume: navigation,
//! page introspection, console logs, window and tab management, element
//! lookup/interaction and screenshots. Real browsers plug in through
//! `ChromiumDriver` (feature `browser`); tests use the scripted [`MockDriver`].

use crate::result::{TestError, TestResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Script evaluated to read the document readiness
pub const READY_STATE_SCRIPT: &str = "document.readyState";

/// Element query, by id or by XPath expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Locator {
    /// Element id attribute
    Id(String),
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),
}

impl Locator {
    /// Locate by id
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Locate by XPath
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::XPath(expr) => write!(f, "xpath={expr}"),
        }
    }
}

/// Interaction state of a located element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Rendered and visible
    pub displayed: bool,
    /// Not disabled
    pub enabled: bool,
}

impl ElementState {
    /// Visible and enabled
    pub const INTERACTIVE: Self = Self {
        displayed: true,
        enabled: true,
    };

    /// Present in the DOM but not rendered
    pub const HIDDEN: Self = Self {
        displayed: false,
        enabled: true,
    };

    /// Visible but disabled
    pub const DISABLED: Self = Self {
        displayed: true,
        enabled: false,
    };

    /// Visible and enabled
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.displayed && self.enabled
    }
}

/// Console message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose/debug output
    Debug,
    /// `console.log`/`console.info`
    Info,
    /// `console.warn`
    Warning,
    /// `console.error` and uncaught exceptions
    Severe,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Severe => "SEVERE",
        };
        f.write_str(name)
    }
}

/// One console message captured from the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
}

impl LogEntry {
    /// Create a log entry
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Create a severe entry
    #[must_use]
    pub fn severe(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Severe, message)
    }

    /// Whether this is a severe entry
    #[must_use]
    pub fn is_severe(&self) -> bool {
        self.level == LogLevel::Severe
    }
}

/// Abstract browser automation driver
///
/// # Implementations
///
/// - `ChromiumDriver` - CDP via chromiumoxide (feature `browser`)
/// - [`MockDriver`] - scripted, for unit testing
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to URL; returns once the navigation has been committed
    async fn navigate(&mut self, url: &str) -> TestResult<()>;

    /// Current URL after any redirects
    async fn current_url(&self) -> TestResult<String>;

    /// Document title
    async fn title(&self) -> TestResult<String>;

    /// Evaluate a JavaScript expression in page context
    async fn execute_script(&self, script: &str) -> TestResult<Value>;

    /// Serialization of the live DOM
    async fn page_source(&self) -> TestResult<String>;

    /// Console messages since the last call; reading drains the buffer
    async fn take_console_logs(&mut self) -> TestResult<Vec<LogEntry>>;

    /// Outer window size (width, height)
    async fn window_size(&self) -> TestResult<(u32, u32)>;

    /// Resize the window
    async fn set_window_size(&mut self, width: u32, height: u32) -> TestResult<()>;

    /// Handles of every open tab, in opening order
    async fn window_handles(&self) -> TestResult<Vec<String>>;

    /// Focus a tab by handle
    async fn switch_to_window(&mut self, handle: &str) -> TestResult<()>;

    /// Look an element up; `None` when it is not in the DOM
    async fn find_element(&self, locator: &Locator) -> TestResult<Option<ElementState>>;

    /// Click an element
    async fn click(&mut self, locator: &Locator) -> TestResult<()>;

    /// Type text into an element
    async fn send_keys(&mut self, locator: &Locator, text: &str) -> TestResult<()>;

    /// Read an attribute (or DOM property) of an element
    async fn attribute(&self, locator: &Locator, name: &str) -> TestResult<Option<String>>;

    /// Capture the viewport as PNG bytes
    async fn screenshot(&self) -> TestResult<Vec<u8>>;

    /// End the session
    async fn quit(&mut self) -> TestResult<()>;
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

/// A scripted page served by [`MockDriver`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockPage {
    /// Document title
    pub title: String,
    /// Live DOM serialization
    pub html: String,
    /// Final URL when navigation redirects
    pub redirect_to: Option<String>,
    /// Console messages emitted while loading
    pub console: Vec<LogEntry>,
    /// Report `loading` forever
    pub never_ready: bool,
    /// Elements present after loading
    pub elements: HashMap<Locator, MockElement>,
}

impl MockPage {
    /// Create a page
    #[must_use]
    pub fn new(title: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            html: html.into(),
            ..Self::default()
        }
    }

    /// Redirect navigation to another URL
    #[must_use]
    pub fn redirecting_to(mut self, url: impl Into<String>) -> Self {
        self.redirect_to = Some(url.into());
        self
    }

    /// Emit a console message on load
    #[must_use]
    pub fn with_console(mut self, entry: LogEntry) -> Self {
        self.console.push(entry);
        self
    }

    /// Never reach `document.readyState == "complete"`
    #[must_use]
    pub const fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// Add an element
    #[must_use]
    pub fn with_element(mut self, locator: Locator, element: MockElement) -> Self {
        self.elements.insert(locator, element);
        self
    }
}

/// A scripted element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Visibility and enabled state
    pub state: ElementState,
    /// Attributes readable through [`BrowserDriver::attribute`]
    pub attributes: HashMap<String, String>,
    /// Clicks that fail before one succeeds
    pub failing_clicks: u32,
    /// Clicks received
    pub clicks: u32,
}

impl MockElement {
    /// Create an element in the given state
    #[must_use]
    pub fn new(state: ElementState) -> Self {
        Self {
            state,
            attributes: HashMap::new(),
            failing_clicks: 0,
            clicks: 0,
        }
    }

    /// Visible, enabled element
    #[must_use]
    pub fn interactive() -> Self {
        Self::new(ElementState::INTERACTIVE)
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Fail the first `count` clicks
    #[must_use]
    pub const fn with_failing_clicks(mut self, count: u32) -> Self {
        self.failing_clicks = count;
        self
    }
}

/// Mock driver for unit testing
#[derive(Debug)]
pub struct MockDriver {
    /// Pages keyed by URL
    pub pages: HashMap<String, MockPage>,
    /// URLs whose navigation fails outright
    pub unreachable: Vec<String>,
    /// Current URL
    pub current_url: String,
    /// Elements of the current page
    pub elements: HashMap<Locator, MockElement>,
    /// Console buffer not yet drained
    pub pending_logs: Vec<LogEntry>,
    /// Open tab handles
    pub tabs: Vec<String>,
    /// Focused tab index
    pub active_tab: usize,
    /// Window size
    pub window: (u32, u32),
    /// Screenshot bytes
    pub screenshot_data: Option<Vec<u8>>,
    /// Results of custom scripts
    pub script_results: HashMap<String, Value>,
    /// Call history for verification
    pub call_history: Vec<String>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            pages: HashMap::new(),
            unreachable: Vec::new(),
            current_url: "about:blank".to_string(),
            elements: HashMap::new(),
            pending_logs: Vec::new(),
            tabs: vec!["tab-0".to_string()],
            active_tab: 0,
            window: (1280, 720),
            screenshot_data: None,
            script_results: HashMap::new(),
            call_history: Vec::new(),
        }
    }
}

impl MockDriver {
    /// Create new mock driver with one blank tab
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a page at `url`
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, page: MockPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Make navigation to `url` fail
    #[must_use]
    pub fn with_unreachable(mut self, url: impl Into<String>) -> Self {
        self.unreachable.push(url.into());
        self
    }

    /// Set the screenshot returned by every capture
    #[must_use]
    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot_data = Some(png);
        self
    }

    /// Answer a script with a fixed value
    #[must_use]
    pub fn with_script_result(mut self, script: impl Into<String>, value: Value) -> Self {
        self.script_results.insert(script.into(), value);
        self
    }

    /// Add an element to the current page
    pub fn add_element(&mut self, locator: Locator, element: MockElement) {
        self.elements.insert(locator, element);
    }

    /// Open another tab, returning its handle
    pub fn open_tab(&mut self) -> String {
        let handle = format!("tab-{}", self.tabs.len());
        self.tabs.push(handle.clone());
        handle
    }

    /// Replace the screenshot
    pub fn set_screenshot(&mut self, png: Vec<u8>) {
        self.screenshot_data = Some(png);
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    /// Clicks received by an element of the current page
    #[must_use]
    pub fn clicks(&self, locator: &Locator) -> u32 {
        self.elements.get(locator).map_or(0, |e| e.clicks)
    }

    fn current_page(&self) -> Option<&MockPage> {
        self.pages.get(&self.current_url)
    }

    fn element_mut(&mut self, locator: &Locator) -> TestResult<&mut MockElement> {
        self.elements
            .get_mut(locator)
            .ok_or_else(|| TestError::driver(format!("no such element: {locator}")))
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> TestResult<()> {
        self.call_history.push(format!("navigate:{url}"));
        if self.unreachable.iter().any(|u| u == url) {
            return Err(TestError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }

        let mut target = url.to_string();
        if let Some(next) = self.pages.get(url).and_then(|p| p.redirect_to.clone()) {
            target = next;
        }
        self.current_url = target;
        let page = self.current_page().cloned().unwrap_or_default();
        self.elements = page.elements;
        self.pending_logs.extend(page.console);
        Ok(())
    }

    async fn current_url(&self) -> TestResult<String> {
        Ok(self.current_url.clone())
    }

    async fn title(&self) -> TestResult<String> {
        Ok(self.current_page().map(|p| p.title.clone()).unwrap_or_default())
    }

    async fn execute_script(&self, script: &str) -> TestResult<Value> {
        if script == READY_STATE_SCRIPT {
            let loading = self.current_page().is_some_and(|p| p.never_ready);
            return Ok(Value::String(
                if loading { "loading" } else { "complete" }.to_string(),
            ));
        }
        Ok(self.script_results.get(script).cloned().unwrap_or(Value::Null))
    }

    async fn page_source(&self) -> TestResult<String> {
        Ok(self.current_page().map(|p| p.html.clone()).unwrap_or_default())
    }

    async fn take_console_logs(&mut self) -> TestResult<Vec<LogEntry>> {
        Ok(std::mem::take(&mut self.pending_logs))
    }

    async fn window_size(&self) -> TestResult<(u32, u32)> {
        Ok(self.window)
    }

    async fn set_window_size(&mut self, width: u32, height: u32) -> TestResult<()> {
        self.call_history.push(format!("set_window_size:{width}x{height}"));
        self.window = (width, height);
        Ok(())
    }

    async fn window_handles(&self) -> TestResult<Vec<String>> {
        Ok(self.tabs.clone())
    }

    async fn switch_to_window(&mut self, handle: &str) -> TestResult<()> {
        self.call_history.push(format!("switch_to_window:{handle}"));
        self.active_tab = self
            .tabs
            .iter()
            .position(|t| t == handle)
            .ok_or_else(|| TestError::driver(format!("no such window: {handle}")))?;
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> TestResult<Option<ElementState>> {
        Ok(self.elements.get(locator).map(|e| e.state))
    }

    async fn click(&mut self, locator: &Locator) -> TestResult<()> {
        self.call_history.push(format!("click:{locator}"));
        let element = self.element_mut(locator)?;
        element.clicks += 1;
        if element.failing_clicks > 0 {
            element.failing_clicks -= 1;
            return Err(TestError::driver(format!(
                "element click intercepted: {locator}"
            )));
        }
        Ok(())
    }

    async fn send_keys(&mut self, locator: &Locator, text: &str) -> TestResult<()> {
        self.call_history.push(format!("send_keys:{locator}:{text}"));
        let element = self.element_mut(locator)?;
        let value = element.attributes.entry("value".to_string()).or_default();
        value.push_str(text);
        Ok(())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> TestResult<Option<String>> {
        let element = self
            .elements
            .get(locator)
            .ok_or_else(|| TestError::driver(format!("no such element: {locator}")))?;
        Ok(element.attributes.get(name).cloned())
    }

    async fn screenshot(&self) -> TestResult<Vec<u8>> {
        self.screenshot_data
            .clone()
            .ok_or_else(|| TestError::Screenshot {
                message: "No mock screenshot set".to_string(),
            })
    }

    async fn quit(&mut self) -> TestResult<()> {
        self.call_history.push("quit".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod locator_tests {
        use super::*;

        #[test]
        fn test_display_names_query() {
            assert_eq!(Locator::id("submit").to_string(), "id=submit");
            assert_eq!(Locator::xpath("//a[1]").to_string(), "xpath=//a[1]");
        }

        #[test]
        fn test_serde_shape() {
            let id: Locator = serde_json::from_str(r#"{"id": "btn"}"#).unwrap();
            let xpath: Locator = serde_json::from_str(r#"{"xpath": "//p"}"#).unwrap();
            assert_eq!(id, Locator::id("btn"));
            assert_eq!(xpath, Locator::xpath("//p"));
        }

        #[test]
        fn test_element_state() {
            assert!(ElementState::INTERACTIVE.is_clickable());
            assert!(!ElementState::HIDDEN.is_clickable());
            assert!(!ElementState::DISABLED.is_clickable());
        }
    }

    mod mock_driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_scripted_results() {
            let driver = MockDriver::new().with_script_result("window.appVersion", serde_json::json!("2.1"));
            assert_eq!(driver.execute_script("window.appVersion").await.unwrap(), "2.1");
            assert_eq!(driver.execute_script("window.other").await.unwrap(), Value::Null);
        }

        #[tokio::test]
        async fn test_navigate_follows_redirect_and_queues_logs() {
            let mut driver = MockDriver::new()
                .with_page("a.html", MockPage::default().redirecting_to("b.html"))
                .with_page(
                    "b.html",
                    MockPage::new("B", "<html>b</html>").with_console(LogEntry::severe("boom")),
                );
            driver.navigate("a.html").await.unwrap();
            assert_eq!(driver.current_url().await.unwrap(), "b.html");
            assert_eq!(driver.title().await.unwrap(), "B");
            assert!(driver.was_called("navigate:a.html"));

            let logs = driver.take_console_logs().await.unwrap();
            assert_eq!(logs, [LogEntry::severe("boom")]);
            assert!(driver.take_console_logs().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_unreachable_url() {
            let mut driver = MockDriver::new().with_unreachable("http://down/");
            let err = driver.navigate("http://down/").await.unwrap_err();
            assert!(matches!(err, TestError::Navigation { .. }));
        }

        #[tokio::test]
        async fn test_ready_state() {
            let mut driver = MockDriver::new().with_page("slow", MockPage::default().never_ready());
            assert_eq!(driver.execute_script(READY_STATE_SCRIPT).await.unwrap(), "complete");
            driver.navigate("slow").await.unwrap();
            assert_eq!(driver.execute_script(READY_STATE_SCRIPT).await.unwrap(), "loading");
        }

        #[tokio::test]
        async fn test_click_failures_then_success() {
            let button = Locator::id("go");
            let mut driver = MockDriver::new();
            driver.add_element(button.clone(), MockElement::interactive().with_failing_clicks(1));
            assert!(driver.click(&button).await.is_err());
            assert!(driver.click(&button).await.is_ok());
            assert_eq!(driver.clicks(&button), 2);
        }

        #[tokio::test]
        async fn test_send_keys_appends_to_value() {
            let field = Locator::id("name");
            let mut driver = MockDriver::new();
            driver.add_element(field.clone(), MockElement::interactive());
            driver.send_keys(&field, "ab").await.unwrap();
            driver.send_keys(&field, "c").await.unwrap();
            assert_eq!(driver.attribute(&field, "value").await.unwrap().as_deref(), Some("abc"));
        }

        #[tokio::test]
        async fn test_tabs_and_window() {
            let mut driver = MockDriver::new();
            let second = driver.open_tab();
            assert_eq!(driver.window_handles().await.unwrap().len(), 2);
            driver.switch_to_window(&second).await.unwrap();
            assert_eq!(driver.active_tab, 1);
            assert!(driver.switch_to_window("nope").await.is_err());

            driver.set_window_size(800, 600).await.unwrap();
            assert_eq!(driver.window_size().await.unwrap(), (800, 600));
        }

        #[tokio::test]
        async fn test_screenshot_requires_data() {
            let mut driver = MockDriver::new();
            assert!(driver.screenshot().await.is_err());
            driver.set_screenshot(vec![1, 2, 3]);
            assert_eq!(driver.screenshot().await.unwrap(), [1, 2, 3]);
        }
    }
}
