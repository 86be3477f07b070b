//! Automation driver trait for backend-agnostic UI automation.
//!
//! This module defines the [`AutomationDriver`] trait, the only view the wait,
//! resolve and flow layers have of the remote automation server. The
//! production implementation is [`AppiumDriver`](crate::appium::AppiumDriver),
//! which speaks W3C WebDriver over HTTP; tests substitute an in-memory double.
//!
//! Every method is a single remote command. Drivers never retry and never wait:
//! synchronization belongs to [`wait`](crate::wait).

use async_trait::async_trait;
use thiserror::Error;

use crate::element::ElementHandle;
use crate::locator::Locator;

/// Errors that can occur during automation driver operations.
///
/// This enum unifies transport and protocol errors behind a single type so
/// that callers can tell "the element is not there yet" apart from "the
/// session is gone".
#[derive(Error, Debug)]
pub enum DriverError {
    /// The server reported that no element matched.
    #[error("No such element: {0}")]
    NoSuchElement(String),

    /// The element reference no longer points at a live element.
    #[error("Stale element reference: {0}")]
    StaleElement(String),

    /// A command was rejected for any other reason.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The session id is unknown to the server (deleted or expired).
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The server could not be reached or dropped the connection.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Any other HTTP-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server replied with something that is not the expected JSON.
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl DriverError {
    /// Returns true if the error only means the UI is not in the awaited state
    /// yet, so a poll should keep going.
    ///
    /// Everything else (lost connection, dead session, protocol garbage) is
    /// terminal for the current wait.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::NoSuchElement(_) | DriverError::StaleElement(_))
    }
}

/// Trait for backend-agnostic mobile UI automation.
///
/// Implementors provide the primitive remote commands. All methods are async
/// and must not block the runtime; they are awaited one at a time because the
/// automation protocol accepts a single command per session.
///
/// # Required Methods
///
/// Implementors must provide: [`find_elements`](AutomationDriver::find_elements),
/// [`is_displayed`](AutomationDriver::is_displayed),
/// [`is_enabled`](AutomationDriver::is_enabled),
/// [`click`](AutomationDriver::click),
/// [`send_keys`](AutomationDriver::send_keys),
/// and [`page_source`](AutomationDriver::page_source).
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Find every element matching the locator on the current screen.
    ///
    /// An empty vector means "nothing matches right now"; it is not an error.
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError>;

    /// Find the first element matching the locator.
    ///
    /// The default implementation calls [`find_elements`](Self::find_elements)
    /// and takes the first result.
    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.find_elements(locator).await?.into_iter().next())
    }

    /// Whether the element is currently rendered on screen.
    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// Whether the element currently accepts input.
    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// Tap/click the element.
    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Send literal text to the element.
    ///
    /// # Arguments
    ///
    /// * `element` - The element to type into
    /// * `text` - The text to send, without any transformation
    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    /// Get the page source of the current screen.
    async fn page_source(&self) -> Result<String, DriverError>;

    /// Bring an installed application to the foreground.
    ///
    /// Not all backends support this. The default implementation returns
    /// an error.
    async fn activate_app(&self, _app_id: &str) -> Result<(), DriverError> {
        Err(DriverError::CommandFailed(
            "activate_app not supported by this backend".to_string(),
        ))
    }
}
