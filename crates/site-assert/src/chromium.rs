//! Chromium backend over the Chrome `DevTools` Protocol.
//!
//! Console messages and uncaught exceptions are collected by listener tasks
//! into a shared buffer that [`BrowserDriver::take_console_logs`] drains.

use crate::driver::{BrowserDriver, ElementState, Locator, LogEntry, LogLevel};
use crate::result::{TestError, TestResult};
use crate::session::BrowserSettings;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::{SetDownloadBehaviorBehavior, SetDownloadBehaviorParams};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::cdp::js_protocol::runtime::{ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

type ConsoleBuffer = Arc<Mutex<Vec<LogEntry>>>;

/// Viewport size, the dimension a device-metrics override sets
const WINDOW_SIZE_SCRIPT: &str = "[window.innerWidth, window.innerHeight]";

/// Console listener tasks per target id; each target is listened to once
#[derive(Debug, Default)]
struct ListenerRegistry {
    tasks: HashMap<String, Vec<JoinHandle<()>>>,
}

impl ListenerRegistry {
    fn contains(&self, target: &str) -> bool {
        self.tasks.contains_key(target)
    }

    fn insert(&mut self, target: impl Into<String>, handles: Vec<JoinHandle<()>>) {
        if let Some(previous) = self.tasks.insert(target.into(), handles) {
            previous.iter().for_each(JoinHandle::abort);
        }
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn abort_all(&mut self) {
        for (_, handles) in self.tasks.drain() {
            handles.iter().for_each(JoinHandle::abort);
        }
    }
}

fn driver_error(e: impl std::fmt::Display) -> TestError {
    TestError::driver(e.to_string())
}

/// Console API call type → severity
#[must_use]
pub fn console_level(kind: &ConsoleApiCalledType) -> LogLevel {
    match kind {
        ConsoleApiCalledType::Error | ConsoleApiCalledType::Assert => LogLevel::Severe,
        ConsoleApiCalledType::Warning => LogLevel::Warning,
        ConsoleApiCalledType::Debug => LogLevel::Debug,
        _ => LogLevel::Info,
    }
}

/// JavaScript reporting `{displayed, enabled}` for a locator, or `null`
fn element_state_script(locator: &Locator) -> String {
    let lookup = element_lookup_script(locator);
    format!(
        "(() => {{ const el = {lookup}; if (!el) return null; \
         const style = window.getComputedStyle(el); \
         const displayed = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length) \
           && style.visibility !== 'hidden' && style.display !== 'none'; \
         return {{ displayed, enabled: !el.disabled }}; }})()"
    )
}

fn element_lookup_script(locator: &Locator) -> String {
    match locator {
        Locator::Id(id) => format!("document.getElementById({})", Value::from(id.as_str())),
        Locator::XPath(expr) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            Value::from(expr.as_str())
        ),
    }
}

/// Chromium session driven through chromiumoxide
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: CdpBrowser,
    page: Page,
    console: ConsoleBuffer,
    listeners: ListenerRegistry,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch a browser with the given settings
    ///
    /// # Errors
    ///
    /// Returns [`TestError::DriverNotFound`] when the driver check fails and a
    /// driver error when the browser cannot be launched
    pub async fn launch(settings: &BrowserSettings) -> TestResult<Self> {
        settings.run_driver_check().await?;

        let mut builder = CdpConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .args(settings.browser_args());
        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = settings.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|e| TestError::DriverNotFound {
            command: "chromium".to_string(),
            message: e,
        })?;

        let (browser, mut handler) = CdpBrowser::launch(config).await.map_err(driver_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(driver_error)?;
        if let Some(ref dir) = settings.download_dir {
            let params = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::Allow)
                .download_path(dir.to_string_lossy().into_owned())
                .build()
                .map_err(TestError::driver)?;
            browser.execute(params).await.map_err(driver_error)?;
        }

        let mut driver = Self {
            browser,
            page,
            console: ConsoleBuffer::default(),
            listeners: ListenerRegistry::default(),
            handler,
        };
        driver.ensure_listening().await?;
        info!(headless = settings.headless, "chromium launched");
        Ok(driver)
    }

    /// Attach console listeners to the active page unless already attached
    async fn ensure_listening(&mut self) -> TestResult<()> {
        let target = self.page.target_id().inner().clone();
        if self.listeners.contains(&target) {
            return Ok(());
        }
        let handles = listen_console(&self.page, &self.console).await?;
        self.listeners.insert(target, handles);
        debug!(targets = self.listeners.len(), "console listeners attached");
        Ok(())
    }

    async fn element(&self, locator: &Locator) -> TestResult<Element> {
        let found = match locator {
            Locator::Id(id) => {
                let selector = format!("[id={}]", Value::from(id.as_str()));
                self.page.find_element(selector).await
            }
            Locator::XPath(expr) => self.page.find_xpath(expr.as_str()).await,
        };
        found.map_err(|e| TestError::driver(format!("no such element {locator}: {e}")))
    }
}

async fn listen_console(page: &Page, buffer: &ConsoleBuffer) -> TestResult<Vec<JoinHandle<()>>> {
    let mut calls = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(driver_error)?;
    let sink = Arc::clone(buffer);
    let call_task = tokio::spawn(async move {
        while let Some(event) = calls.next().await {
            let message = event
                .args
                .iter()
                .map(|arg| match (&arg.value, &arg.description) {
                    (Some(Value::String(s)), _) => s.clone(),
                    (Some(v), _) => v.to_string(),
                    (None, Some(d)) => d.clone(),
                    (None, None) => String::new(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            if let Ok(mut logs) = sink.lock() {
                logs.push(LogEntry::new(console_level(&event.r#type), message));
            }
        }
    });

    let mut exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(driver_error)?;
    let sink = Arc::clone(buffer);
    let exception_task = tokio::spawn(async move {
        while let Some(event) = exceptions.next().await {
            let details = &event.exception_details;
            let message = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            if let Ok(mut logs) = sink.lock() {
                logs.push(LogEntry::severe(message));
            }
        }
    });
    Ok(vec![call_task, exception_task])
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> TestResult<()> {
        debug!(url, "cdp navigate");
        self.page
            .goto(url)
            .await
            .map_err(|e| TestError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> TestResult<String> {
        Ok(self.page.url().await.map_err(driver_error)?.unwrap_or_default())
    }

    async fn title(&self) -> TestResult<String> {
        Ok(self.page.get_title().await.map_err(driver_error)?.unwrap_or_default())
    }

    async fn execute_script(&self, script: &str) -> TestResult<Value> {
        let result = self.page.evaluate(script).await.map_err(driver_error)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn page_source(&self) -> TestResult<String> {
        self.page.content().await.map_err(driver_error)
    }

    async fn take_console_logs(&mut self) -> TestResult<Vec<LogEntry>> {
        let mut logs = self
            .console
            .lock()
            .map_err(|_| TestError::driver("console buffer poisoned"))?;
        Ok(std::mem::take(&mut *logs))
    }

    async fn window_size(&self) -> TestResult<(u32, u32)> {
        let size = self
            .execute_script(WINDOW_SIZE_SCRIPT)
            .await?;
        let dim = |i: usize| {
            size.get(i)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| TestError::driver(format!("unexpected window size: {size}")))
        };
        Ok((dim(0)?, dim(1)?))
    }

    async fn set_window_size(&mut self, width: u32, height: u32) -> TestResult<()> {
        let params = SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.page.execute(params).await.map_err(driver_error)?;
        Ok(())
    }

    async fn window_handles(&self) -> TestResult<Vec<String>> {
        let pages = self.browser.pages().await.map_err(driver_error)?;
        Ok(pages.iter().map(|p| p.target_id().inner().clone()).collect())
    }

    async fn switch_to_window(&mut self, handle: &str) -> TestResult<()> {
        let pages = self.browser.pages().await.map_err(driver_error)?;
        let page = pages
            .into_iter()
            .find(|p| p.target_id().inner() == handle)
            .ok_or_else(|| TestError::driver(format!("no such window: {handle}")))?;
        page.bring_to_front().await.map_err(driver_error)?;
        self.page = page;
        self.ensure_listening().await
    }

    async fn find_element(&self, locator: &Locator) -> TestResult<Option<ElementState>> {
        let state = self.execute_script(&element_state_script(locator)).await?;
        if state.is_null() {
            return Ok(None);
        }
        serde_json::from_value(state).map(Some).map_err(driver_error)
    }

    async fn click(&mut self, locator: &Locator) -> TestResult<()> {
        self.element(locator).await?.click().await.map_err(driver_error)?;
        Ok(())
    }

    async fn send_keys(&mut self, locator: &Locator, text: &str) -> TestResult<()> {
        let element = self.element(locator).await?;
        element.focus().await.map_err(driver_error)?;
        element.type_str(text).await.map_err(driver_error)?;
        Ok(())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> TestResult<Option<String>> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return null; \
             const v = el.getAttribute({name}); \
             return v !== null ? v : (el[{name}] === undefined || el[{name}] === null ? null : String(el[{name}])); }})()",
            element_lookup_script(locator),
            name = Value::from(name)
        );
        Ok(self.execute_script(&script).await?.as_str().map(str::to_string))
    }

    async fn screenshot(&self) -> TestResult<Vec<u8>> {
        use base64::Engine;

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self.page.execute(params).await.map_err(|e| TestError::Screenshot {
            message: e.to_string(),
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| TestError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn quit(&mut self) -> TestResult<()> {
        self.listeners.abort_all();
        self.browser.close().await.map_err(driver_error)?;
        self.handler.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_levels() {
        assert_eq!(console_level(&ConsoleApiCalledType::Error), LogLevel::Severe);
        assert_eq!(console_level(&ConsoleApiCalledType::Warning), LogLevel::Warning);
        assert_eq!(console_level(&ConsoleApiCalledType::Log), LogLevel::Info);
    }

    #[test]
    fn test_lookup_scripts_quote_queries() {
        let id = element_lookup_script(&Locator::id("a\"b"));
        assert_eq!(id, r#"document.getElementById("a\"b")"#);
        let xpath = element_lookup_script(&Locator::xpath("//a[@x='1']"));
        assert!(xpath.starts_with(r#"document.evaluate("//a[@x='1']""#));
        assert!(element_state_script(&Locator::id("x")).contains("displayed"));
    }

    #[test]
    fn test_window_size_reads_viewport() {
        assert!(WINDOW_SIZE_SCRIPT.contains("innerWidth"));
        assert!(!WINDOW_SIZE_SCRIPT.contains("outer"));
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_listener_registry_attaches_once_per_target() {
        let mut registry = ListenerRegistry::default();
        let first = tokio::spawn(std::future::pending::<()>());
        let first_abort = first.abort_handle();
        registry.insert("tab-0", vec![first]);
        assert!(registry.contains("tab-0"));
        assert!(!registry.contains("tab-1"));

        registry.insert("tab-0", vec![tokio::spawn(std::future::pending::<()>())]);
        settle().await;
        assert!(first_abort.is_finished());
        assert_eq!(registry.len(), 1);

        let second = tokio::spawn(std::future::pending::<()>());
        let second_abort = second.abort_handle();
        registry.insert("tab-1", vec![second]);
        registry.abort_all();
        settle().await;
        assert!(second_abort.is_finished());
        assert_eq!(registry.len(), 0);
    }
}
