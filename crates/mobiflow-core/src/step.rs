//! Steps: the units a [`Flow`](crate::flow::Flow) is made of.
//!
//! A step is pure data: an action, its target, whether its failure is fatal,
//! an optional wait override, and an optional settle phase afterwards.
//!
//! # Step Types
//!
//! - **UI Interaction**: [`StepAction::Click`], [`StepAction::TypeText`]
//! - **Waiting**: [`StepAction::WaitFor`]
//! - **App Management**: [`StepAction::ActivateApp`]
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mobiflow_core::locator::Locator;
//! use mobiflow_core::step::{Settle, Step, Toughness};
//!
//! let dismiss = Step::click("dismiss system dialog", Locator::id("android:id/button1"))
//!     .optional();
//! let advance = Step::click("advance", Locator::nth_of_class("android.view.View", 6))
//!     .settle(Settle::Fixed(Duration::from_secs(2)));
//!
//! assert_eq!(dismiss.toughness, Toughness::Optional);
//! assert_eq!(advance.toughness, Toughness::Mandatory);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::locator::LocatorChain;
use crate::wait::WaitPolicy;

/// Whether a step's failure aborts the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toughness {
    /// Failure aborts the flow.
    Mandatory,
    /// Failure is recorded as a skip and the flow continues.
    Optional,
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Wait until the target is interactable, then click it.
    Click { target: LocatorChain },

    /// Wait until the target is present, then send text to it.
    TypeText {
        target: LocatorChain,
        /// Sent verbatim.
        text: String,
    },

    /// Wait until the target is present.
    WaitFor { target: LocatorChain },

    /// Bring an installed app to the foreground.
    ActivateApp {
        /// Android package name or iOS bundle id.
        app_id: String,
    },
}

impl StepAction {
    /// Returns a short, static name for this action suitable for tracing
    /// span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Click { .. } => "click",
            StepAction::TypeText { .. } => "type_text",
            StepAction::WaitFor { .. } => "wait_for",
            StepAction::ActivateApp { .. } => "activate_app",
        }
    }

    /// The element this action waits for, if it has one.
    pub fn target(&self) -> Option<&LocatorChain> {
        match self {
            StepAction::Click { target }
            | StepAction::TypeText { target, .. }
            | StepAction::WaitFor { target } => Some(target),
            StepAction::ActivateApp { .. } => None,
        }
    }
}

/// How the flow lets the UI transition after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Poll for the next step's target to become present, for at most `max`.
    ///
    /// Timing out is not a failure: the next step's own wait still applies.
    /// When the next step has no target this degrades to `Fixed(max)`.
    UntilNextTargetPresent { max: Duration },

    /// Unconditional pause.
    ///
    /// Only for transitions with no observable signal, e.g. when the next
    /// target already matches an element on the outgoing screen. This is a
    /// known source of flakiness and is logged as such every time it runs.
    Fixed(Duration),
}

/// One unit of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Human-readable name used in logs and results.
    pub name: String,
    pub action: StepAction,
    pub toughness: Toughness,
    /// Overrides the flow's default wait policy.
    pub policy: Option<WaitPolicy>,
    /// Runs after the action completes.
    pub settle: Option<Settle>,
}

impl Step {
    /// A mandatory step with no override and no settle phase.
    pub fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            action,
            toughness: Toughness::Mandatory,
            policy: None,
            settle: None,
        }
    }

    pub fn click(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, StepAction::Click { target: target.into() })
    }

    pub fn type_text(
        name: impl Into<String>,
        target: impl Into<LocatorChain>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            StepAction::TypeText {
                target: target.into(),
                text: text.into(),
            },
        )
    }

    pub fn wait_for(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, StepAction::WaitFor { target: target.into() })
    }

    pub fn activate_app(name: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self::new(name, StepAction::ActivateApp { app_id: app_id.into() })
    }

    /// Marks the step as tolerant of failure.
    pub fn optional(mut self) -> Self {
        self.toughness = Toughness::Optional;
        self
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn settle(mut self, settle: Settle) -> Self {
        self.settle = Some(settle);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.toughness == Toughness::Optional
    }
}
