//! Element resolution over locator chains with ordered fallback.
//!
//! [`LocatorResolver`] walks a [`LocatorChain`] front to back, giving each
//! alternative the full [`WaitPolicy`] through [`poll_until`]. The first
//! alternative that satisfies the [`Condition`] wins and the rest are never
//! queried. Fallbacks trade latency for robustness: a chain whose first guess
//! is wrong costs one full timeout before the second guess is tried.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::driver::{AutomationDriver, DriverError};
use crate::element::ElementHandle;
use crate::error::{AutomationError, LocatorAttempt};
use crate::locator::{Locator, LocatorChain};
use crate::wait::{poll_until, Condition, WaitPolicy};

/// An element found through a locator chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The matched element.
    pub element: ElementHandle,
    /// The alternative that matched.
    pub locator: Locator,
    /// Position of that alternative in the chain (0-based).
    pub index: usize,
    /// Total time spent, including timed-out earlier alternatives.
    pub elapsed: Duration,
}

/// Resolves locators against a borrowed driver.
pub struct LocatorResolver<'d> {
    driver: &'d dyn AutomationDriver,
}

impl<'d> LocatorResolver<'d> {
    pub fn new(driver: &'d dyn AutomationDriver) -> Self {
        Self { driver }
    }

    /// Resolves the first alternative of `chain` that satisfies `condition`.
    ///
    /// # Errors
    ///
    /// - A one-element chain fails with that locator's own error
    ///   (usually [`AutomationError::ElementNotFound`]).
    /// - A longer chain whose alternatives all time out fails with
    ///   [`AutomationError::LocatorChainExhausted`], listing each attempt.
    /// - An empty chain fails immediately with an empty
    ///   [`AutomationError::LocatorChainExhausted`].
    /// - A non-transient driver error aborts the chain at once.
    pub async fn resolve(
        &self,
        chain: &LocatorChain,
        condition: Condition,
        policy: &WaitPolicy,
    ) -> Result<Resolved, AutomationError> {
        let start = Instant::now();

        if let [only] = chain.locators() {
            let element = self.resolve_one(only, condition, policy).await?;
            return Ok(Resolved {
                element,
                locator: only.clone(),
                index: 0,
                elapsed: start.elapsed(),
            });
        }

        let mut attempts = Vec::with_capacity(chain.len());
        for (index, locator) in chain.locators().iter().enumerate() {
            match self.resolve_one(locator, condition, policy).await {
                Ok(element) => {
                    if index > 0 {
                        info!(%locator, index, "resolved via fallback locator");
                    }
                    return Ok(Resolved {
                        element,
                        locator: locator.clone(),
                        index,
                        elapsed: start.elapsed(),
                    });
                }
                Err(err @ AutomationError::ElementNotFound { .. }) => {
                    debug!(%locator, index, error = %err, "locator alternative exhausted");
                    attempts.push(LocatorAttempt {
                        locator: locator.clone(),
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Err(AutomationError::LocatorChainExhausted { attempts })
    }

    /// Polls a single locator until it satisfies `condition`.
    pub async fn resolve_one(
        &self,
        locator: &Locator,
        condition: Condition,
        policy: &WaitPolicy,
    ) -> Result<ElementHandle, AutomationError> {
        let driver = self.driver;
        poll_until(locator, policy, || probe(driver, locator, condition)).await
    }
}

/// One look at the current screen.
///
/// Mirrors the usual explicit-wait conditions: presence takes the first match;
/// interactable additionally requires that first match to be displayed and
/// enabled.
async fn probe(
    driver: &dyn AutomationDriver,
    locator: &Locator,
    condition: Condition,
) -> Result<Option<ElementHandle>, DriverError> {
    let Some(element) = driver.find_element(locator).await? else {
        return Ok(None);
    };
    match condition {
        Condition::Presence => Ok(Some(element)),
        Condition::Interactable => {
            if driver.is_displayed(&element).await? && driver.is_enabled(&element).await? {
                Ok(Some(element))
            } else {
                Ok(None)
            }
        }
    }
}
