//! Errors raised by the wait, resolve and interaction layers.

use std::time::Duration;

use thiserror::Error;

use crate::driver::DriverError;
use crate::locator::Locator;

/// A failure to locate or act on an element.
///
/// Steps in a flow surface this type; the flow orchestrator decides whether it
/// aborts the flow or is recorded as a skipped step.
#[derive(Error, Debug)]
pub enum AutomationError {
    /// A single locator did not satisfy its condition before the timeout.
    #[error("Element {locator} not found after {}ms{}", .elapsed.as_millis(), last_error_suffix(.last_error))]
    ElementNotFound {
        locator: Locator,
        elapsed: Duration,
        /// The last transient driver error seen while polling, if any.
        last_error: Option<String>,
    },

    /// Every alternative of a locator chain timed out.
    #[error("All {} locators exhausted: {}", .attempts.len(), format_attempts(.attempts))]
    LocatorChainExhausted { attempts: Vec<LocatorAttempt> },

    /// The element was resolved but the server rejected the action on it.
    #[error("{action} on {target} rejected: {source}")]
    Interaction {
        action: &'static str,
        target: String,
        #[source]
        source: DriverError,
    },

    /// A verification target resolved but is not rendered.
    #[error("{target} resolved but is not displayed")]
    NotDisplayed { target: String },

    /// A page-source verification did not find its marker.
    #[error("Page source does not contain '{needle}'")]
    PageSourceMismatch { needle: String },

    /// A non-transient driver error (connection lost, session gone).
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

/// One failed alternative of a locator chain.
#[derive(Debug)]
pub struct LocatorAttempt {
    pub locator: Locator,
    pub error: AutomationError,
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(err) => format!(" (last error: {})", err),
        None => String::new(),
    }
}

fn format_attempts(attempts: &[LocatorAttempt]) -> String {
    if attempts.is_empty() {
        return "no locators given".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("[{}] {}", a.locator, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}
