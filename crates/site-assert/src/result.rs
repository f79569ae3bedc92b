//! Result and error types for site-assert.

use crate::assertion::soft::AssertionFailures;
use thiserror::Error;

/// Result type for site-assert operations
pub type TestResult<T> = Result<T, TestError>;

/// Errors that can occur while driving a browser or HTTP assertion pass
#[derive(Debug, Error)]
pub enum TestError {
    /// Malformed entries, unknown keys, duplicates, invalid snapshot paths
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Browser driver binary could not be started
    #[error("Browser driver not reachable via `{command}`: {message}")]
    DriverNotFound {
        /// Command that was executed
        command: String,
        /// Captured output or spawn error
        message: String,
    },

    /// Driver-level failure (session, script, element interaction)
    #[error("Browser driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// A wait did not complete in time
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout {
        /// Description of the awaited condition, including the query used
        what: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// HTTP transport failure
    #[error("HTTP request to {url} failed: {message}")]
    Transport {
        /// Requested URL
        url: String,
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Image decoding/encoding error
    #[cfg(feature = "media")]
    #[error("Image processing failed: {message}")]
    Image {
        /// Error message
        message: String,
    },

    /// One or more assertions failed
    #[error("{0}")]
    Assertions(AssertionFailures),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl TestError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Whether this error is an aggregate of assertion failures
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertions(_))
    }

    /// Whether this error was raised before any I/O because the input was malformed
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Individual failure messages when this is an assertion aggregate
    #[must_use]
    pub fn failures(&self) -> &[String] {
        match self {
            Self::Assertions(failures) => failures.messages(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = TestError::configuration("duplicate entry: a.html");
        assert_eq!(err.to_string(), "Configuration error: duplicate entry: a.html");
        assert!(err.is_configuration());
        assert!(!err.is_assertion());
        assert!(err.failures().is_empty());
    }

    #[test]
    fn test_timeout_names_query() {
        let err = TestError::Timeout {
            what: "element id=login to be visible".to_string(),
            ms: 20_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("20000ms"));
        assert!(msg.contains("id=login"));
    }

    #[test]
    fn test_assertions_exposes_failures() {
        let mut failures = AssertionFailures::new();
        failures.push("first");
        failures.push("second");
        let err = TestError::Assertions(failures);
        assert!(err.is_assertion());
        assert_eq!(err.failures(), ["first", "second"]);
        let msg = err.to_string();
        assert!(msg.find("first").unwrap() < msg.find("second").unwrap());
    }
}
