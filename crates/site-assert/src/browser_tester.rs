//! Browser-state assertion orchestrator.
//!
//! Two phases per page: [`BrowserTester::load_url`] navigates, waits for the
//! document to be ready and replaces the console log window;
//! [`BrowserTester::assert_browser_state`] evaluates every present field of a
//! [`BrowserStateSpec`] against one snapshot of the page and aggregates the
//! failures. Batches walk their entries strictly in order on the shared session.

use crate::assertion::soft::AssertionFailures;
use crate::assertion::text::{self, Fragments};
use crate::config::TesterConfig;
use crate::driver::{BrowserDriver, LogEntry, READY_STATE_SCRIPT};
use crate::entry::{reject_duplicates, BrowserStateSpec, IgnoreConsoleErrors, LoadEntry, RedirectEntry};
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::result::{TestError, TestResult};
use crate::wait::{poll_until, WaitOptions};
use crate::wildcards::WildcardTable;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

/// What a page load produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLoad {
    /// Document title
    pub title: String,
    /// Live DOM serialization after the document became ready
    pub html: String,
    /// URL after any redirects
    pub final_url: String,
}

/// Drives one browser session and asserts on its state
#[derive(Debug)]
pub struct BrowserTester<D: BrowserDriver, T: HttpTransport = ReqwestTransport> {
    pub(crate) driver: D,
    transport: T,
    pub(crate) config: TesterConfig,
    wildcards: WildcardTable,
    log_buffer: Vec<LogEntry>,
    last_load: Option<PageLoad>,
}

impl<D: BrowserDriver> BrowserTester<D, ReqwestTransport> {
    /// Create a tester that fetches original sources with `reqwest`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or the
    /// HTTP client cannot be built
    pub fn with_driver(driver: D, config: TesterConfig) -> TestResult<Self> {
        let transport = ReqwestTransport::new(config.http_timeout(), config.accept_invalid_certs)
            .map_err(|e| TestError::configuration(e.message))?;
        Self::new(driver, transport, config)
    }
}

impl<D: BrowserDriver, T: HttpTransport> BrowserTester<D, T> {
    /// Create a tester over a driver and an HTTP transport
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid
    pub fn new(driver: D, transport: T, config: TesterConfig) -> TestResult<Self> {
        config.validate()?;
        let wildcards = config.wildcards.clone();
        Ok(Self {
            driver,
            transport,
            config,
            wildcards,
            log_buffer: Vec::new(),
            last_load: None,
        })
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable driver, for operations the tester does not wrap
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &TesterConfig {
        &self.config
    }

    /// Switch between raising and returning aggregated failures
    pub fn set_exceptions_enabled(&mut self, enabled: bool) {
        self.config.exceptions_enabled = enabled;
    }

    /// Add a console error substring ignored on every page
    pub fn ignore_console_error(&mut self, substring: impl Into<String>) {
        self.config.ignore_console_errors.push(substring.into());
    }

    /// Current wildcard table
    #[must_use]
    pub const fn wildcards(&self) -> &WildcardTable {
        &self.wildcards
    }

    /// Mutable wildcard table, for changes between operations
    pub fn wildcards_mut(&mut self) -> &mut WildcardTable {
        &mut self.wildcards
    }

    /// Result of the most recent page load
    #[must_use]
    pub const fn last_load(&self) -> Option<&PageLoad> {
        self.last_load.as_ref()
    }

    /// Console messages captured by the most recent page load
    #[must_use]
    pub fn console_logs(&self) -> &[LogEntry] {
        &self.log_buffer
    }

    pub(crate) fn finish(&self, failures: AssertionFailures) -> TestResult<Vec<String>> {
        failures.finish(self.config.exceptions_enabled)
    }

    // =========================================================================
    // PHASE 1: NAVIGATE
    // =========================================================================

    /// Navigate to `url` (wildcards applied) and wait for the document to be ready.
    ///
    /// The console log window is replaced, not appended to.
    ///
    /// # Errors
    ///
    /// Returns navigation, driver or timeout errors
    pub async fn load_url(&mut self, url: &str) -> TestResult<PageLoad> {
        let url = self.wildcards.substitute(url);
        self.load(&url).await
    }

    async fn load(&mut self, url: &str) -> TestResult<PageLoad> {
        info!(url, "loading page");
        self.driver.navigate(url).await?;

        let driver = &self.driver;
        let options = WaitOptions::for_page_load(&self.config);
        poll_until(&options, &format!("{url} to finish loading"), move || async move {
            let state = driver.execute_script(READY_STATE_SCRIPT).await?;
            Ok(state == Value::from("complete"))
        })
        .await?;

        self.log_buffer = self.driver.take_console_logs().await?;
        let load = PageLoad {
            title: self.driver.title().await?,
            html: self.driver.page_source().await?,
            final_url: self.driver.current_url().await?,
        };
        debug!(
            url,
            final_url = %load.final_url,
            console_entries = self.log_buffer.len(),
            "page ready"
        );
        self.last_load = Some(load.clone());
        Ok(load)
    }

    // =========================================================================
    // PHASE 2: ASSERT
    // =========================================================================

    /// Check the current session against `spec`.
    ///
    /// Every present field is evaluated even when earlier ones fail.
    ///
    /// # Errors
    ///
    /// Configuration errors for an invalid spec, transport errors when the
    /// original source cannot be fetched, and, with exceptions enabled, the
    /// aggregated assertion failures.
    pub async fn assert_browser_state(&mut self, spec: &BrowserStateSpec) -> TestResult<Vec<String>> {
        spec.validate()?;
        let spec = spec.with_wildcards(&self.wildcards);
        let failures = self.check_state(&spec).await?;
        self.finish(failures)
    }

    /// Like [`Self::assert_browser_state`] for a declarative record; the key
    /// set is validated before any check runs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unrecognised key
    pub async fn assert_browser_state_value(&mut self, spec: &Value) -> TestResult<Vec<String>> {
        let spec = BrowserStateSpec::from_value(spec)?;
        self.assert_browser_state(&spec).await
    }

    async fn check_state(&self, spec: &BrowserStateSpec) -> TestResult<AssertionFailures> {
        let mut failures = AssertionFailures::new();

        let current_url = self.driver.current_url().await?;
        let title = self.driver.title().await?;
        let needs_loaded_html = spec.loaded_html_starts_with.is_some()
            || spec.loaded_html_ends_with.is_some()
            || spec.loaded_html_contains.is_some()
            || spec.loaded_html_not_contains.is_some()
            || spec.loaded_html_reg_exp.is_some();
        let loaded_html = if needs_loaded_html {
            self.driver.page_source().await?
        } else {
            String::new()
        };
        let open_tabs = match spec.tabs_count {
            Some(_) => self.driver.window_handles().await?.len(),
            None => 0,
        };
        let source_html = if spec.needs_source_html() {
            self.fetch_source(&current_url).await?
        } else {
            String::new()
        };

        if let Some(url) = &spec.url {
            text::contains_all(&mut failures, "current url", &current_url, &Fragments::from(url.as_str()), true, None);
        }
        if let Some(expected) = &spec.title_contains {
            text::contains_all(&mut failures, "title", &title, &Fragments::from(expected.as_str()), true, None);
        }

        self.check_console(spec.ignore_console_errors.as_ref(), &mut failures);

        check_html(
            &mut failures,
            "source html",
            &source_html,
            HtmlChecks {
                starts_with: spec.source_html_starts_with.as_deref(),
                ends_with: spec.source_html_ends_with.as_deref(),
                contains: spec.source_html_contains.as_ref(),
                not_contains: spec.source_html_not_contains.as_ref(),
                reg_exp: spec.source_html_reg_exp.as_deref(),
            },
        )?;
        check_html(
            &mut failures,
            "loaded html",
            &loaded_html,
            HtmlChecks {
                starts_with: spec.loaded_html_starts_with.as_deref(),
                ends_with: spec.loaded_html_ends_with.as_deref(),
                contains: spec.loaded_html_contains.as_ref(),
                not_contains: spec.loaded_html_not_contains.as_ref(),
                reg_exp: spec.loaded_html_reg_exp.as_deref(),
            },
        )?;

        if let Some(expected) = spec.tabs_count {
            failures.check(open_tabs == expected, || {
                format!("expected {expected} open tabs but found {open_tabs}")
            });
        }

        Ok(failures)
    }

    fn check_console(&self, policy: Option<&IgnoreConsoleErrors>, failures: &mut AssertionFailures) {
        if policy == Some(&IgnoreConsoleErrors::All(true)) {
            return;
        }
        let call_level: &[String] = match policy {
            Some(IgnoreConsoleErrors::Containing(list)) => list,
            _ => &[],
        };
        let excuses: Vec<&str> = self
            .config
            .ignore_console_errors
            .iter()
            .chain(call_level)
            .map(String::as_str)
            .collect();

        for entry in self.log_buffer.iter().filter(|e| e.is_severe()) {
            let excused = excuses.iter().any(|x| entry.message.contains(x));
            failures.check(excused, || format!("console error: {}", entry.message));
        }
    }

    /// Original document body: local file first, then an HTTP GET of `url`
    async fn fetch_source(&self, url: &str) -> TestResult<String> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        match tokio::fs::read_to_string(path).await {
            Ok(body) => return Ok(body),
            Err(e) => debug!(url, error = %e, "source is not a local file, fetching over HTTP"),
        }
        let response = self
            .transport
            .send(&HttpRequest::get(url))
            .await
            .map_err(|e| TestError::Transport {
                url: url.to_string(),
                message: e.message,
            })?;
        if !response.is_success() {
            return Err(TestError::Transport {
                url: url.to_string(),
                message: format!("HTTP {}", response.status),
            });
        }
        Ok(response.body)
    }

    // =========================================================================
    // BATCHES
    // =========================================================================

    /// Load every entry in order and check it against its spec.
    ///
    /// The entry URL must still be contained in the final URL.
    ///
    /// # Errors
    ///
    /// Duplicate URLs are rejected before any navigation. Navigation errors
    /// are raised. With exceptions enabled, assertion failures of all entries
    /// are raised together.
    pub async fn assert_urls_load_ok(&mut self, entries: &[LoadEntry]) -> TestResult<Vec<String>> {
        let entries: Vec<LoadEntry> = entries
            .iter()
            .map(|e| LoadEntry {
                url: self.wildcards.substitute(&e.url),
                spec: e.spec.with_wildcards(&self.wildcards),
            })
            .collect();
        reject_duplicates(&entries)?;
        for entry in &entries {
            entry.spec.validate()?;
        }
        info!(count = entries.len(), "asserting urls load ok");

        let mut failures = AssertionFailures::new();
        for entry in &entries {
            self.load(&entry.url).await?;
            let entry_failures = self.check_state(&entry.spec).await?;
            failures.extend_with_context(&entry.url, entry_failures);
        }
        self.finish(failures)
    }

    /// Navigate to each `url` and check it ends up at `to`.
    ///
    /// # Errors
    ///
    /// Duplicate source URLs are rejected before any navigation. With
    /// exceptions enabled, every mismatch is raised together.
    pub async fn assert_urls_redirect(&mut self, entries: &[RedirectEntry]) -> TestResult<Vec<String>> {
        let entries: Vec<RedirectEntry> = entries
            .iter()
            .map(|e| RedirectEntry::new(self.wildcards.substitute(&e.url), self.wildcards.substitute(&e.to)))
            .collect();
        reject_duplicates(&entries)?;
        info!(count = entries.len(), "asserting urls redirect");

        let mut failures = AssertionFailures::new();
        for entry in &entries {
            let load = self.load(&entry.url).await?;
            let arrived = load.final_url.ends_with(&entry.to) || load.final_url.contains(&entry.to);
            failures.check(arrived, || {
                format!(
                    "{} expected to redirect to {} but ended at {}",
                    entry.url, entry.to, load.final_url
                )
            });
        }
        self.finish(failures)
    }

    // =========================================================================
    // WINDOW AND TABS
    // =========================================================================

    /// Resize the browser window
    ///
    /// # Errors
    ///
    /// Returns a driver error if the window cannot be resized
    pub async fn set_window_size(&mut self, width: u32, height: u32) -> TestResult<()> {
        debug!(width, height, "resizing window");
        self.driver.set_window_size(width, height).await
    }

    /// Current window size
    ///
    /// # Errors
    ///
    /// Returns a driver error if the size cannot be read
    pub async fn window_size(&self) -> TestResult<(u32, u32)> {
        self.driver.window_size().await
    }

    /// Number of open tabs
    ///
    /// # Errors
    ///
    /// Returns a driver error if the handles cannot be read
    pub async fn tabs_count(&self) -> TestResult<usize> {
        Ok(self.driver.window_handles().await?.len())
    }

    /// Focus the tab at `index` in opening order
    ///
    /// # Errors
    ///
    /// Returns a driver error for an index past the open tabs
    pub async fn switch_to_tab(&mut self, index: usize) -> TestResult<()> {
        let handles = self.driver.window_handles().await?;
        let handle = handles.get(index).ok_or_else(|| {
            TestError::driver(format!("no tab at index {index} ({} open)", handles.len()))
        })?;
        self.driver.switch_to_window(handle).await
    }

    /// End the browser session
    ///
    /// # Errors
    ///
    /// Returns a driver error if the session cannot be closed
    pub async fn quit(mut self) -> TestResult<()> {
        self.driver.quit().await
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Compare the current viewport with the PNG baseline at `path`.
    ///
    /// A missing baseline is created from the capture and passes.
    ///
    /// # Errors
    ///
    /// Configuration errors for a bad path or region, screenshot and image
    /// errors, and, with exceptions enabled, a size mismatch or too many
    /// differing pixels.
    #[cfg(feature = "media")]
    pub async fn assert_snapshot(
        &self,
        path: impl AsRef<std::path::Path>,
        options: &crate::snapshot::SnapshotOptions,
    ) -> TestResult<Vec<String>> {
        use crate::snapshot::SnapshotComparator;

        let path = path.as_ref();
        SnapshotComparator::validate_path(path)?;
        let png = self.driver.screenshot().await?;
        let outcome = SnapshotComparator::new().compare(path, &png, options)?;

        let mut failures = AssertionFailures::new();
        match outcome.failure_message(path) {
            Some(message) => failures.push(message),
            None => failures.pass(),
        }
        self.finish(failures)
    }
}

struct HtmlChecks<'a> {
    starts_with: Option<&'a str>,
    ends_with: Option<&'a str>,
    contains: Option<&'a Fragments>,
    not_contains: Option<&'a Fragments>,
    reg_exp: Option<&'a str>,
}

fn check_html(failures: &mut AssertionFailures, label: &str, html: &str, checks: HtmlChecks<'_>) -> TestResult<()> {
    if let Some(prefix) = checks.starts_with {
        text::starts_with(failures, label, html, &Fragments::from(prefix), None);
    }
    if let Some(suffix) = checks.ends_with {
        text::ends_with(failures, label, html, &Fragments::from(suffix), None);
    }
    if let Some(fragments) = checks.contains {
        text::contains_all(failures, label, html, fragments, true, None);
    }
    if let Some(fragments) = checks.not_contains {
        text::not_contains_any(failures, label, html, fragments, None);
    }
    if let Some(pattern) = checks.reg_exp {
        let re = Regex::new(pattern)
            .map_err(|e| TestError::configuration(format!("invalid {label} pattern: {e}")))?;
        text::matches_regex(failures, label, html, &re);
    }
    Ok(())
}
