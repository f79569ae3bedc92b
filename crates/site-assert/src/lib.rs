//! site-assert: assertion helpers for browser and HTTP integration tests
//!
//! Wraps a browser driver and an HTTP client behind assertion-oriented
//! operations so end-to-end suites stay short:
//!
//! - [`HttpTester`]: `assert_urls_fail`, `assert_http_requests`
//! - [`BrowserTester`]: `load_url`, `assert_browser_state`,
//!   `assert_urls_load_ok`, `assert_urls_redirect`, element waits and
//!   interactions, `query_calls`, `assert_snapshot`
//!
//! Every operation aggregates all of its assertion failures. With
//! `exceptions_enabled` (the default) they are raised as one
//! [`TestError::Assertions`]; otherwise they are returned as data.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────────────┐
//! │ Entry / Spec │──►│ BrowserTester    │──►│ BrowserDriver          │
//! │ records      │   │ HttpTester       │   │ (Chromium / MockDriver)│
//! │ (JSON/YAML)  │   │  + text/shape    │   ├────────────────────────┤
//! └──────────────┘   │    primitives    │──►│ HttpTransport          │
//!                    │  + wildcards     │   │ (reqwest / Mock)       │
//!                    └──────────────────┘   └────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use site_assert::prelude::*;
//!
//! # async fn run() -> TestResult<()> {
//! let driver = MockDriver::new().with_page("http://localhost/", MockPage::new("Home", "<html></html>"));
//! let mut tester = BrowserTester::with_driver(driver, TesterConfig::from_env()?)?;
//! tester
//!     .assert_urls_load_ok(&[LoadEntry::new("http://localhost/")
//!         .with_spec(BrowserStateSpec::new().with_title_contains("Home"))])
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod assertion;
#[allow(clippy::missing_errors_doc)]
mod browser_tester;
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc)]
mod chromium;
mod config;
mod driver;
mod entry;
mod http;
mod http_tester;
mod interaction;
pub mod logging;
mod result;
mod session;
#[cfg(feature = "media")]
mod snapshot;
mod wait;
mod wildcards;

pub use assertion::shape::{assert_is_object, assert_keys_subset};
pub use assertion::soft::AssertionFailures;
pub use assertion::text::{FragmentMatch, Fragments, FRAGMENT_PLACEHOLDER};
pub use browser_tester::{BrowserTester, PageLoad};
#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;
pub use config::{TesterConfig, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
pub use driver::{
    BrowserDriver, ElementState, Locator, LogEntry, LogLevel, MockDriver, MockElement, MockPage,
    READY_STATE_SCRIPT,
};
pub use entry::{
    entries_from_json_str, entries_from_value, entries_from_yaml_str, reject_duplicates,
    BrowserStateSpec, EntryRecord, IgnoreConsoleErrors, LoadEntry, RedirectEntry, RequestEntry,
    BROWSER_STATE_KEYS, REDIRECT_ENTRY_KEYS, REQUEST_ENTRY_KEYS,
};
pub use http::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockTransport, ReqwestTransport,
    TransportError,
};
pub use http_tester::{HttpReport, HttpTester};
pub use interaction::QueryCall;
pub use result::{TestError, TestResult};
pub use session::{verify_driver_binary, BrowserSettings};
#[cfg(feature = "media")]
pub use snapshot::{
    diff_images, encode_png, png_dimensions, yiq_delta, IgnoreRegion, PixelDiff,
    SnapshotComparator, SnapshotOptions, SnapshotOutcome, DEFAULT_THRESHOLD,
};
pub use wait::{poll_until, ElementCondition, WaitOptions};
pub use wildcards::WildcardTable;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        AssertionFailures, BrowserDriver, BrowserSettings, BrowserStateSpec, BrowserTester,
        ElementCondition, EntryRecord, Fragments, HttpTester, IgnoreConsoleErrors, LoadEntry,
        Locator, LogEntry, LogLevel, MockDriver, MockPage, MockTransport, PageLoad, QueryCall,
        RedirectEntry, RequestEntry, TestError, TestResult, TesterConfig, WildcardTable,
    };
    #[cfg(feature = "browser")]
    pub use super::ChromiumDriver;
    #[cfg(feature = "media")]
    pub use super::{IgnoreRegion, SnapshotOptions};
}
