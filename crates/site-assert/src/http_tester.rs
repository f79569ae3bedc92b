//! HTTP assertion orchestrator.
//!
//! Walks a list of [`RequestEntry`] values strictly one request at a time and
//! aggregates every failure before raising (or returning) them.

use crate::assertion::soft::AssertionFailures;
use crate::assertion::text;
use crate::config::TesterConfig;
use crate::entry::{reject_duplicates, RequestEntry};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
use crate::result::{TestError, TestResult};
use crate::wildcards::WildcardTable;
use tracing::{debug, info, warn};

/// Outcome of a batch when failures are returned instead of raised
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpReport {
    /// Response body of every entry, in entry order (empty when no response)
    pub responses: Vec<String>,
    /// Every failure message, in encounter order
    pub failures: Vec<String>,
}

impl HttpReport {
    /// Whether every entry passed
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs HTTP request batches against expectations
#[derive(Debug)]
pub struct HttpTester<T: HttpTransport = ReqwestTransport> {
    transport: T,
    config: TesterConfig,
    wildcards: WildcardTable,
}

impl HttpTester<ReqwestTransport> {
    /// Create a tester backed by `reqwest`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built
    pub fn from_config(config: TesterConfig) -> TestResult<Self> {
        let transport = ReqwestTransport::new(config.http_timeout(), config.accept_invalid_certs)
            .map_err(|e| TestError::configuration(e.message))?;
        Ok(Self::new(transport, config))
    }
}

impl<T: HttpTransport> HttpTester<T> {
    /// Create a tester over any transport
    #[must_use]
    pub fn new(transport: T, config: TesterConfig) -> Self {
        let wildcards = config.wildcards.clone();
        Self {
            transport,
            config,
            wildcards,
        }
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

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &TesterConfig {
        &self.config
    }

    /// Switch between raising and returning aggregated failures
    pub fn set_exceptions_enabled(&mut self, enabled: bool) {
        self.config.exceptions_enabled = enabled;
    }

    /// Underlying transport
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn prepare(&self, entries: &[RequestEntry]) -> TestResult<Vec<RequestEntry>> {
        let prepared: Vec<RequestEntry> = entries
            .iter()
            .map(|e| e.with_wildcards(&self.wildcards))
            .collect();
        reject_duplicates(&prepared)?;
        Ok(prepared)
    }

    async fn send(&self, entry: &RequestEntry) -> Result<HttpResponse, TransportError> {
        let request = match &entry.post_parameters {
            Some(params) => HttpRequest::post(&entry.url, params.clone()),
            None => HttpRequest::get(&entry.url),
        };
        debug!(method = %request.method, url = %request.url, "sending request");
        self.transport.send(&request).await
    }

    fn finish(&self, responses: Vec<String>, failures: AssertionFailures) -> TestResult<HttpReport> {
        let failures = failures.finish(self.config.exceptions_enabled)?;
        Ok(HttpReport {
            responses,
            failures,
        })
    }

    /// Every entry is expected to fail (non-2xx or no response at all).
    ///
    /// The error body of each failing response is still checked against the
    /// entry's `responseCode`/`is`/`contains`/... fields.
    ///
    /// # Errors
    ///
    /// Configuration errors (duplicates) are raised before any request. With
    /// exceptions enabled, any failure is raised as one aggregate error.
    pub async fn assert_urls_fail(&self, entries: &[RequestEntry]) -> TestResult<HttpReport> {
        let entries = self.prepare(entries)?;
        info!(count = entries.len(), "asserting urls fail");
        let mut responses = Vec::new();
        let mut failures = AssertionFailures::new();

        for entry in &entries {
            match self.send(entry).await {
                Ok(resp) if resp.is_success() => {
                    failures.push(format!(
                        "URL expected to fail but was {} ok: {}",
                        resp.status, entry.url
                    ));
                    responses.push(resp.body);
                }
                Ok(resp) => {
                    failures.extend(validate_response(entry, Some(resp.status), &resp.body));
                    responses.push(resp.body);
                }
                Err(e) => {
                    debug!(url = %entry.url, error = %e, "request failed as expected");
                    failures.extend(validate_response(entry, None, ""));
                    responses.push(String::new());
                }
            }
        }

        self.finish(responses, failures)
    }

    /// Every entry is expected to succeed and match its expectations.
    ///
    /// Without an explicit `responseCode` a 2xx status is required.
    ///
    /// # Errors
    ///
    /// Configuration errors (duplicates) are raised before any request. With
    /// exceptions enabled, any failure, including transport failures, is
    /// raised as one aggregate error.
    pub async fn assert_http_requests(&self, entries: &[RequestEntry]) -> TestResult<HttpReport> {
        let entries = self.prepare(entries)?;
        info!(count = entries.len(), "asserting http requests");
        let mut responses = Vec::new();
        let mut failures = AssertionFailures::new();

        for entry in &entries {
            match self.send(entry).await {
                Ok(resp) => {
                    if entry.response_code.is_none() && !resp.is_success() {
                        failures.push(format!(
                            "{}: expected success but got {}",
                            entry.url, resp.status
                        ));
                    }
                    failures.extend(validate_response(entry, Some(resp.status), &resp.body));
                    responses.push(resp.body);
                }
                Err(e) => {
                    warn!(url = %entry.url, error = %e, "request failed");
                    failures.push(format!("{}: request failed: {}", entry.url, e.message));
                    responses.push(String::new());
                }
            }
        }

        self.finish(responses, failures)
    }
}

/// Check one response against the entry's optional fields
fn validate_response(entry: &RequestEntry, status: Option<u16>, body: &str) -> AssertionFailures {
    let mut failures = AssertionFailures::new();
    let label = "response body";

    if let Some(expected) = entry.response_code {
        match status {
            Some(actual) => failures.check(actual == expected, || {
                format!("expected response code {expected} but got {actual}")
            }),
            None => failures.push(format!(
                "expected response code {expected} but no response was received"
            )),
        }
    }
    if let Some(expected) = &entry.is {
        text::equals(&mut failures, label, body, expected);
    }
    if let Some(fragments) = &entry.contains {
        text::contains_all(&mut failures, label, body, fragments, true, None);
    }
    if let Some(fragments) = &entry.not_contains {
        text::not_contains_any(&mut failures, label, body, fragments, None);
    }
    if let Some(fragments) = &entry.start_with {
        text::starts_with(&mut failures, label, body, fragments, None);
    }
    if let Some(fragments) = &entry.end_with {
        text::ends_with(&mut failures, label, body, fragments, None);
    }

    let mut attributed = AssertionFailures::new();
    attributed.extend_with_context(&entry.url, failures);
    attributed
}
