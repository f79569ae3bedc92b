//! Soft assertion collector.
//!
//! Every primitive appends to a shared [`AssertionFailures`] instead of
//! returning early, so one pass reports all failing fragments of all checks.

use crate::result::{TestError, TestResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of human-readable failure messages gathered during one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailures {
    messages: Vec<String>,
    checks: usize,
}

impl AssertionFailures {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn push(&mut self, message: impl Into<String>) {
        self.checks += 1;
        self.messages.push(message.into());
    }

    /// Record that a check ran and passed
    pub fn pass(&mut self) {
        self.checks += 1;
    }

    /// Record a check outcome
    pub fn check(&mut self, passed: bool, message: impl FnOnce() -> String) {
        if passed {
            self.pass();
        } else {
            self.push(message());
        }
    }

    /// Append every failure from another collector, keeping encounter order
    pub fn extend(&mut self, other: Self) {
        self.checks += other.checks;
        self.messages.extend(other.messages);
    }

    /// Append failures with a context prefix (for example the entry URL)
    pub fn extend_with_context(&mut self, context: &str, other: Self) {
        self.checks += other.checks;
        self.messages
            .extend(other.messages.into_iter().map(|m| format!("{context}: {m}")));
    }

    /// Whether no failure was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of recorded failures
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Number of checks evaluated, passing or failing
    #[must_use]
    pub const fn check_count(&self) -> usize {
        self.checks
    }

    /// Failure messages in encounter order
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Consume the collector, returning the messages
    #[must_use]
    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }

    /// `Ok` when nothing failed, otherwise the collector itself as error
    ///
    /// # Errors
    ///
    /// Returns `self` if any failure was recorded
    pub fn verify(self) -> Result<(), Self> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Raise the failures as one aggregate error, or hand them back as data
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Assertions`] when `raise` is set and anything failed
    pub fn finish(self, raise: bool) -> TestResult<Vec<String>> {
        if raise && !self.messages.is_empty() {
            return Err(TestError::Assertions(self));
        }
        Ok(self.messages)
    }
}

impl fmt::Display for AssertionFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} assertion(s) failed:", self.messages.len())?;
        for (i, message) in self.messages.iter().enumerate() {
            writeln!(f, "  {}. {message}", i + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailures {}

impl From<Vec<String>> for AssertionFailures {
    fn from(messages: Vec<String>) -> Self {
        Self {
            checks: messages.len(),
            messages,
        }
    }
}
