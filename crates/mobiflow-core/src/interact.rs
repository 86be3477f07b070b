//! Wait-then-act primitives.
//!
//! Each primitive resolves its target with a fixed [`Condition`] and then
//! issues exactly one remote command. None of them retries: if the element goes
//! stale between resolution and the action, the rejection is surfaced as
//! [`AutomationError::Interaction`] so real UI timing bugs stay visible.

use tracing::debug;

use crate::driver::AutomationDriver;
use crate::element::ElementHandle;
use crate::error::AutomationError;
use crate::locator::LocatorChain;
use crate::resolver::LocatorResolver;
use crate::wait::{Condition, WaitPolicy};

/// Interaction primitives over a borrowed driver.
pub struct Interactor<'d> {
    driver: &'d dyn AutomationDriver,
    resolver: LocatorResolver<'d>,
}

impl<'d> Interactor<'d> {
    pub fn new(driver: &'d dyn AutomationDriver) -> Self {
        Self {
            driver,
            resolver: LocatorResolver::new(driver),
        }
    }

    /// The resolver backing these primitives.
    pub fn resolver(&self) -> &LocatorResolver<'d> {
        &self.resolver
    }

    /// Waits until the target is interactable, then clicks it.
    pub async fn wait_and_click(
        &self,
        target: &LocatorChain,
        policy: &WaitPolicy,
    ) -> Result<(), AutomationError> {
        let resolved = self.resolver.resolve(target, Condition::Interactable, policy).await?;
        debug!(locator = %resolved.locator, element = %resolved.element, "click");
        self.driver
            .click(&resolved.element)
            .await
            .map_err(|source| AutomationError::Interaction {
                action: "click",
                target: resolved.locator.to_string(),
                source,
            })
    }

    /// Waits until the target is present, then sends `text` verbatim.
    pub async fn wait_and_type(
        &self,
        target: &LocatorChain,
        text: &str,
        policy: &WaitPolicy,
    ) -> Result<(), AutomationError> {
        let resolved = self.resolver.resolve(target, Condition::Presence, policy).await?;
        debug!(locator = %resolved.locator, element = %resolved.element, chars = text.chars().count(), "type");
        self.driver
            .send_keys(&resolved.element, text)
            .await
            .map_err(|source| AutomationError::Interaction {
                action: "type",
                target: resolved.locator.to_string(),
                source,
            })
    }

    /// Waits until the target is present and returns it for inspection.
    pub async fn wait_for_element(
        &self,
        target: &LocatorChain,
        policy: &WaitPolicy,
    ) -> Result<ElementHandle, AutomationError> {
        let resolved = self.resolver.resolve(target, Condition::Presence, policy).await?;
        Ok(resolved.element)
    }

    /// Brings an installed app to the foreground.
    pub async fn activate_app(&self, app_id: &str) -> Result<(), AutomationError> {
        debug!(app_id, "activate app");
        self.driver
            .activate_app(app_id)
            .await
            .map_err(|source| AutomationError::Interaction {
                action: "activate",
                target: app_id.to_string(),
                source,
            })
    }

    /// Single query of whether `element` is rendered.
    pub async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        Ok(self.driver.is_displayed(element).await?)
    }

    /// Single read of the current screen's UI hierarchy.
    pub async fn page_source(&self) -> Result<String, AutomationError> {
        Ok(self.driver.page_source().await?)
    }
}
