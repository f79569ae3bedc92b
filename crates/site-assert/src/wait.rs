//! Bounded polling.
//!
//! Every suspension point that waits on the browser goes through
//! [`poll_until`], which probes at a fixed interval and fails with a
//! [`TestError::Timeout`] naming what was awaited.

use crate::config::{TesterConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use crate::driver::ElementState;
use crate::result::{TestError, TestResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Element wait options from a tester configuration
    #[must_use]
    pub const fn for_elements(config: &TesterConfig) -> Self {
        Self {
            timeout_ms: config.wait_timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    /// Page readiness options from a tester configuration
    #[must_use]
    pub const fn for_page_load(config: &TesterConfig) -> Self {
        Self {
            timeout_ms: config.page_load_timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// ELEMENT CONDITIONS
// =============================================================================

/// State an element wait is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementCondition {
    /// Present in the DOM
    Exists,
    /// Not present in the DOM
    Absent,
    /// Present and displayed
    Visible,
    /// Absent or not displayed
    Hidden,
    /// Displayed and enabled
    Clickable,
    /// Absent, hidden or disabled
    NotClickable,
}

impl ElementCondition {
    /// Whether a lookup result satisfies this condition
    #[must_use]
    pub fn is_met(self, state: Option<ElementState>) -> bool {
        match self {
            Self::Exists => state.is_some(),
            Self::Absent => state.is_none(),
            Self::Visible => state.is_some_and(|s| s.displayed),
            Self::Hidden => !state.is_some_and(|s| s.displayed),
            Self::Clickable => state.is_some_and(|s| s.is_clickable()),
            Self::NotClickable => !state.is_some_and(|s| s.is_clickable()),
        }
    }
}

impl std::fmt::Display for ElementCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Exists => "to exist",
            Self::Absent => "to be absent",
            Self::Visible => "to be visible",
            Self::Hidden => "to be hidden",
            Self::Clickable => "to be clickable",
            Self::NotClickable => "to be not clickable",
        };
        f.write_str(name)
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Probe until it reports `true`, at least once, within the timeout.
///
/// # Errors
///
/// Returns the probe's own error unchanged, or [`TestError::Timeout`]
/// naming `what` when the deadline passes.
pub async fn poll_until<F, Fut>(options: &WaitOptions, what: &str, mut probe: F) -> TestResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TestResult<bool>>,
{
    let deadline = Instant::now() + options.timeout();
    loop {
        if probe().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            tracing::debug!(what, timeout_ms = options.timeout_ms, "wait timed out");
            return Err(TestError::Timeout {
                what: what.to_string(),
                ms: options.timeout_ms,
            });
        }
        tokio::time::sleep(options.poll_interval()).await;
    }
}
