//! Element waits and interactions on a [`BrowserTester`].
//!
//! Interactions first wait for their precondition, then retry the driver call
//! up to `interaction_retries` times.

use crate::browser_tester::BrowserTester;
use crate::driver::{BrowserDriver, Locator};
use crate::http::HttpTransport;
use crate::result::{TestError, TestResult};
use crate::wait::{poll_until, ElementCondition, WaitOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One step of a [`BrowserTester::query_calls`] macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum QueryCall {
    /// Click an element once it is clickable
    Click {
        /// Target element
        locator: Locator,
    },
    /// Type into an element once it is clickable
    SendKeys {
        /// Target element
        locator: Locator,
        /// Text to type
        text: String,
    },
    /// Read an attribute once the element exists
    GetAttribute {
        /// Target element
        locator: Locator,
        /// Attribute name
        name: String,
    },
    /// Wait for every element to satisfy a condition
    WaitFor {
        /// Elements to wait on
        locators: Vec<Locator>,
        /// Expected state
        condition: ElementCondition,
    },
    /// Navigate and wait for the document to be ready
    LoadUrl {
        /// Target URL, wildcards allowed
        url: String,
    },
    /// Pause
    Sleep {
        /// Milliseconds
        ms: u64,
    },
}

impl<D: BrowserDriver, T: HttpTransport> BrowserTester<D, T> {
    /// Wait until every locator satisfies `condition`
    ///
    /// # Errors
    ///
    /// Returns a timeout error naming the first locator and condition that
    /// did not hold in time
    pub async fn wait_for_elements(&self, locators: &[Locator], condition: ElementCondition) -> TestResult<()> {
        let options = WaitOptions::for_elements(&self.config);
        for locator in locators {
            let driver = &self.driver;
            poll_until(&options, &format!("{locator} {condition}"), move || async move {
                Ok(condition.is_met(driver.find_element(locator).await?))
            })
            .await?;
        }
        Ok(())
    }

    /// Click an element once it is visible and enabled
    ///
    /// # Errors
    ///
    /// Returns a timeout error if it never becomes clickable, or the last
    /// driver error once retries are exhausted
    pub async fn click(&mut self, locator: &Locator) -> TestResult<()> {
        self.wait_for_elements(std::slice::from_ref(locator), ElementCondition::Clickable)
            .await?;
        let mut last_error = None;
        for attempt in 1..=self.config.interaction_retries {
            match self.driver.click(locator).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(%locator, attempt, error = %e, "click failed");
                    last_error = Some(e);
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
            }
        }
        Err(exhausted(last_error, locator))
    }

    /// Type into an element once it is visible and enabled
    ///
    /// # Errors
    ///
    /// Returns a timeout error if it never becomes interactive, or the last
    /// driver error once retries are exhausted
    pub async fn send_keys(&mut self, locator: &Locator, text: &str) -> TestResult<()> {
        self.wait_for_elements(std::slice::from_ref(locator), ElementCondition::Clickable)
            .await?;
        let text = self.wildcards().substitute(text);
        let mut last_error = None;
        for attempt in 1..=self.config.interaction_retries {
            match self.driver.send_keys(locator, &text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(%locator, attempt, error = %e, "send keys failed");
                    last_error = Some(e);
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
            }
        }
        Err(exhausted(last_error, locator))
    }

    /// Read an attribute once the element exists
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the element never appears, or the last
    /// driver error once retries are exhausted
    pub async fn get_attribute(&self, locator: &Locator, name: &str) -> TestResult<Option<String>> {
        self.wait_for_elements(std::slice::from_ref(locator), ElementCondition::Exists)
            .await?;
        let mut last_error = None;
        for attempt in 1..=self.config.interaction_retries {
            match self.driver.attribute(locator, name).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(%locator, attempt, error = %e, "attribute read failed");
                    last_error = Some(e);
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
            }
        }
        Err(exhausted(last_error, locator))
    }

    /// Run calls strictly in order, stopping at the first failure.
    ///
    /// Returns one value per call: the attribute for `getAttribute`, the
    /// final URL for `loadUrl`, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing call
    pub async fn query_calls(&mut self, calls: &[QueryCall]) -> TestResult<Vec<Option<String>>> {
        let mut results = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            debug!(index, ?call, "query call");
            let result = match call {
                QueryCall::Click { locator } => self.click(locator).await.map(|()| None),
                QueryCall::SendKeys { locator, text } => self.send_keys(locator, text).await.map(|()| None),
                QueryCall::GetAttribute { locator, name } => self.get_attribute(locator, name).await,
                QueryCall::WaitFor { locators, condition } => {
                    self.wait_for_elements(locators, *condition).await.map(|()| None)
                }
                QueryCall::LoadUrl { url } => self.load_url(url).await.map(|load| Some(load.final_url)),
                QueryCall::Sleep { ms } => {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                    Ok(None)
                }
            };
            results.push(result?);
        }
        Ok(results)
    }
}

fn exhausted(last_error: Option<TestError>, locator: &Locator) -> TestError {
    last_error.unwrap_or_else(|| TestError::driver(format!("no attempt made on {locator}")))
}
