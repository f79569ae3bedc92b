//! Tester configuration.
//!
//! Defaults can be overridden from `SITE_ASSERT_*` environment variables or
//! loaded from a YAML file.

use crate::result::{TestError, TestResult};
use crate::wildcards::WildcardTable;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Default timeout for element and browser waits (20 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 20_000;

/// Default polling interval for waits
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default HTTP request timeout
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Configuration shared by the HTTP and browser testers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TesterConfig {
    /// Raise aggregated assertion failures as one error (otherwise return them)
    pub exceptions_enabled: bool,
    /// Timeout for element waits
    pub wait_timeout_ms: u64,
    /// Timeout for the document-ready wait after navigation
    pub page_load_timeout_ms: u64,
    /// Interval between polls of the browser
    pub poll_interval_ms: u64,
    /// Timeout for each HTTP request
    pub http_timeout_ms: u64,
    /// Trust invalid TLS certificates on HTTP requests
    pub accept_invalid_certs: bool,
    /// Attempts for click/send-keys/read-attribute before giving up
    pub interaction_retries: u32,
    /// Console error substrings ignored on every page
    pub ignore_console_errors: Vec<String>,
    /// Initial wildcard table
    pub wildcards: WildcardTable,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            exceptions_enabled: true,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            page_load_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            accept_invalid_certs: false,
            interaction_retries: 3,
            ignore_console_errors: Vec::new(),
            wildcards: WildcardTable::new(),
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> TestResult<Option<T>> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TestError::configuration(format!("Invalid {name}: {raw}"))),
        None => Ok(None),
    }
}

impl TesterConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SITE_ASSERT_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a variable cannot be parsed
    pub fn from_env() -> TestResult<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `SITE_ASSERT_*` name
    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> TestResult<Self> {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "SITE_ASSERT_EXCEPTIONS")? {
            config.exceptions_enabled = v;
        }
        if let Some(v) = parse_var(&lookup, "SITE_ASSERT_WAIT_TIMEOUT_MS")? {
            config.wait_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SITE_ASSERT_PAGE_LOAD_TIMEOUT_MS")? {
            config.page_load_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SITE_ASSERT_POLL_INTERVAL_MS")? {
            config.poll_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SITE_ASSERT_HTTP_TIMEOUT_MS")? {
            config.http_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SITE_ASSERT_ACCEPT_INVALID_CERTS")? {
            config.accept_invalid_certs = v;
        }
        if let Some(v) = parse_var(&lookup, "SITE_ASSERT_INTERACTION_RETRIES")? {
            config.interaction_retries = v;
        }
        if let Some(list) = lookup("SITE_ASSERT_IGNORE_CONSOLE_ERRORS") {
            config.ignore_console_errors = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = lookup("SITE_ASSERT_LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse YAML configuration; missing fields keep their defaults
    ///
    /// # Errors
    ///
    /// Returns an error for invalid YAML or unknown fields
    pub fn from_yaml_str(yaml: &str) -> TestResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load YAML configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> TestResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Reject settings that would make every wait fail or spin
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the bad value
    pub fn validate(&self) -> TestResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(TestError::configuration("poll_interval_ms must be > 0"));
        }
        if self.interaction_retries == 0 {
            return Err(TestError::configuration("interaction_retries must be > 0"));
        }
        Ok(())
    }

    /// Raise or return aggregated failures
    #[must_use]
    pub const fn with_exceptions(mut self, enabled: bool) -> Self {
        self.exceptions_enabled = enabled;
        self
    }

    /// Set the element wait timeout
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait_timeout_ms = timeout_ms;
        self
    }

    /// Set the page load timeout
    #[must_use]
    pub const fn with_page_load_timeout(mut self, timeout_ms: u64) -> Self {
        self.page_load_timeout_ms = timeout_ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Set the HTTP timeout
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout_ms: u64) -> Self {
        self.http_timeout_ms = timeout_ms;
        self
    }

    /// Trust invalid TLS certificates on HTTP requests
    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set interaction attempts
    #[must_use]
    pub const fn with_interaction_retries(mut self, retries: u32) -> Self {
        self.interaction_retries = retries;
        self
    }

    /// Add an instance-wide console error excuse
    #[must_use]
    pub fn with_ignored_console_error(mut self, substring: impl Into<String>) -> Self {
        self.ignore_console_errors.push(substring.into());
        self
    }

    /// Set the initial wildcard table
    #[must_use]
    pub fn with_wildcards(mut self, wildcards: WildcardTable) -> Self {
        self.wildcards = wildcards;
        self
    }

    /// Element wait timeout as Duration
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Page load timeout as Duration
    #[must_use]
    pub const fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    /// Poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// HTTP timeout as Duration
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TesterConfig::default();
        assert!(config.exceptions_enabled);
        assert_eq!(config.wait_timeout_ms, 20_000);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(config.ignore_console_errors.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TesterConfig::new()
            .with_exceptions(false)
            .with_wait_timeout(500)
            .with_poll_interval(10)
            .with_ignored_console_error("favicon.ico")
            .with_wildcards(WildcardTable::new().with("$host", "localhost"));
        assert!(!config.exceptions_enabled);
        assert_eq!(config.wait_timeout(), Duration::from_millis(500));
        assert_eq!(config.ignore_console_errors, ["favicon.ico"]);
        assert_eq!(config.wildcards.get("$host"), Some("localhost"));
    }

    #[test]
    fn test_yaml_partial_keeps_defaults() {
        let yaml = "exceptions_enabled: false\nwildcards:\n  $host: example.org\n";
        let config = TesterConfig::from_yaml_str(yaml).unwrap();
        assert!(!config.exceptions_enabled);
        assert_eq!(config.http_timeout_ms, DEFAULT_HTTP_TIMEOUT_MS);
        assert_eq!(config.wildcards.get("$host"), Some("example.org"));
    }

    #[test]
    fn test_yaml_unknown_field_rejected() {
        assert!(TesterConfig::from_yaml_str("exceptions: false\n").is_err());
    }

    mod env_tests {
        use super::*;
        use std::collections::HashMap;

        fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |name| map.get(name).cloned()
        }

        #[test]
        fn test_unset_keeps_defaults() {
            assert_eq!(TesterConfig::from_vars(vars(&[])).unwrap(), TesterConfig::default());
        }

        #[test]
        fn test_overrides() {
            let config = TesterConfig::from_vars(vars(&[
                ("SITE_ASSERT_EXCEPTIONS", "false"),
                ("SITE_ASSERT_WAIT_TIMEOUT_MS", " 750 "),
                ("SITE_ASSERT_ACCEPT_INVALID_CERTS", "true"),
                ("SITE_ASSERT_IGNORE_CONSOLE_ERRORS", "favicon.ico, ,analytics"),
                ("SITE_ASSERT_LOG_LEVEL", "debug"),
            ]))
            .unwrap();
            assert!(!config.exceptions_enabled);
            assert_eq!(config.wait_timeout_ms, 750);
            assert!(config.accept_invalid_certs);
            assert_eq!(config.ignore_console_errors, ["favicon.ico", "analytics"]);
            assert_eq!(config.log_level, "debug");
            assert_eq!(config.http_timeout_ms, DEFAULT_HTTP_TIMEOUT_MS);
        }

        #[test]
        fn test_unparsable_value_is_configuration_error() {
            let err = TesterConfig::from_vars(vars(&[("SITE_ASSERT_WAIT_TIMEOUT_MS", "abc")])).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("SITE_ASSERT_WAIT_TIMEOUT_MS"));
        }

        #[test]
        fn test_invalid_value_is_configuration_error() {
            let err = TesterConfig::from_vars(vars(&[("SITE_ASSERT_POLL_INTERVAL_MS", "0")])).unwrap_err();
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = TesterConfig::from_yaml_str("poll_interval_ms: 0\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-assert.yaml");
        std::fs::write(&path, "wait_timeout_ms: 1500\n").unwrap();
        let config = TesterConfig::from_file(&path).unwrap();
        assert_eq!(config.wait_timeout_ms, 1500);
    }
}
