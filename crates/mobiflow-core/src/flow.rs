//! Flow orchestration: run an ordered list of steps and reduce the journey to
//! one [`FlowResult`].
//!
//! A run moves through `NotStarted → Running → (Succeeded | Failed)`:
//!
//! - an optional step that fails is recorded as skipped and the run continues;
//! - a mandatory step that fails ends the run, recording its index and cause;
//! - after every step that completes or is skipped, its settle phase runs;
//! - if no mandatory step failed, the final [`Verification`] re-resolves its
//!   target from scratch and must pass too.
//!
//! The runner never returns an error. Every failure ends up in the result.
//!
//! # Example
//!
//! ```no_run
//! use mobiflow_core::driver::AutomationDriver;
//! use mobiflow_core::flow::{Flow, FlowRunner, Verification};
//! use mobiflow_core::locator::Locator;
//! use mobiflow_core::step::Step;
//!
//! # async fn example(driver: &dyn AutomationDriver) {
//! let flow = Flow::new("open settings")
//!     .step(Step::activate_app("launch", "com.android.settings"))
//!     .verify(Verification::displayed("settings root", Locator::id("android:id/title")));
//!
//! let result = FlowRunner::new(driver).run(flow).await;
//! if result.success {
//!     println!("done in {}ms", result.elapsed.as_millis());
//! }
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::time::Instant;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::driver::AutomationDriver;
use crate::error::AutomationError;
use crate::interact::Interactor;
use crate::locator::LocatorChain;
use crate::step::{Settle, Step, StepAction, Toughness};
use crate::wait::{Condition, WaitPolicy};

/// A final check evaluated once after all steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The target must resolve (presence) and then report itself displayed.
    Displayed {
        description: String,
        target: LocatorChain,
        /// Overrides the flow's default wait policy.
        policy: Option<WaitPolicy>,
    },
    /// The current page source must contain `needle`. Evaluated once.
    PageSourceContains { description: String, needle: String },
}

impl Verification {
    pub fn displayed(description: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Verification::Displayed {
            description: description.into(),
            target: target.into(),
            policy: None,
        }
    }

    pub fn page_source_contains(description: impl Into<String>, needle: impl Into<String>) -> Self {
        Verification::PageSourceContains {
            description: description.into(),
            needle: needle.into(),
        }
    }

    /// Sets the wait policy of a [`Verification::Displayed`]; no-op otherwise.
    pub fn with_policy(mut self, new_policy: WaitPolicy) -> Self {
        if let Verification::Displayed { policy, .. } = &mut self {
            *policy = Some(new_policy);
        }
        self
    }

    pub fn description(&self) -> &str {
        match self {
            Verification::Displayed { description, .. }
            | Verification::PageSourceContains { description, .. } => description,
        }
    }
}

/// An ordered user journey.
///
/// A flow is built fresh for each execution and consumed by
/// [`FlowRunner::run`].
#[derive(Debug)]
pub struct Flow {
    pub name: String,
    pub steps: Vec<Step>,
    /// Wait policy for steps that do not override it.
    pub policy: WaitPolicy,
    pub verification: Option<Verification>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            policy: WaitPolicy::default(),
            verification: None,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn verify(mut self, verification: Verification) -> Self {
        self.verification = Some(verification);
        self
    }
}

/// Lifecycle of one flow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    /// An optional step failed; the reason is kept for the report.
    Skipped(String),
    /// A mandatory step failed and ended the flow.
    Failed(String),
}

/// Record of one executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Position in the flow (0-based).
    pub index: usize,
    pub name: String,
    pub action: &'static str,
    pub toughness: Toughness,
    pub outcome: StepOutcome,
    /// When the step started.
    pub timestamp: DateTime<Utc>,
    /// Action time, excluding the settle phase.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

/// Where a failed flow stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailedAt {
    /// A mandatory step, by 0-based index.
    Step { index: usize, name: String },
    /// The final verification.
    Verification { description: String },
}

impl fmt::Display for FailedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedAt::Step { index, name } => write!(f, "step {} '{}'", index, name),
            FailedAt::Verification { description } => write!(f, "verification '{}'", description),
        }
    }
}

/// Why a flow failed.
#[derive(Debug, Serialize)]
pub struct FlowFailure {
    pub at: FailedAt,
    #[serde(serialize_with = "serialize_display")]
    pub cause: AutomationError,
}

/// The single outcome of one flow execution.
#[derive(Debug, Serialize)]
pub struct FlowResult {
    /// Unique identifier for this execution.
    pub run_id: Uuid,
    pub flow: String,
    /// Terminal state: `Succeeded` or `Failed`.
    pub state: FlowState,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    /// Wall-clock time from entering `Running` to the terminal state.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub steps: Vec<StepRecord>,
    pub failure: Option<FlowFailure>,
}

impl FlowResult {
    /// Index of the mandatory step that failed, if a step (not the
    /// verification) ended the flow.
    pub fn failing_index(&self) -> Option<usize> {
        match self.failure.as_ref().map(|f| &f.at) {
            Some(FailedAt::Step { index, .. }) => Some(*index),
            _ => None,
        }
    }

    /// Whether the step at `index` was attempted at all.
    pub fn attempted(&self, index: usize) -> bool {
        self.steps.iter().any(|r| r.index == index)
    }

    /// Indices of optional steps that were skipped.
    pub fn skipped(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Skipped(_)))
            .map(|r| r.index)
            .collect()
    }
}

/// Executes flows against a borrowed driver.
///
/// The runner holds no state between runs; each call to [`run`](Self::run)
/// consumes its flow and borrows the driver only for that execution.
pub struct FlowRunner<'d> {
    interactor: Interactor<'d>,
}

impl<'d> FlowRunner<'d> {
    pub fn new(driver: &'d dyn AutomationDriver) -> Self {
        Self {
            interactor: Interactor::new(driver),
        }
    }

    /// Runs `flow` to completion and reports its outcome.
    pub async fn run(&self, flow: Flow) -> FlowResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("flow", name = %flow.name, %run_id);
        async {
            let mut state = FlowState::NotStarted;
            let started_at = Utc::now();
            let start = Instant::now();
            transition(&mut state, FlowState::Running);

            let mut records = Vec::with_capacity(flow.steps.len());
            let mut failure = None;

            for (index, step) in flow.steps.iter().enumerate() {
                let policy = step.policy.unwrap_or(flow.policy);
                let timestamp = Utc::now();
                let step_start = Instant::now();
                let result = self
                    .execute(step, &policy)
                    .instrument(debug_span!("step", index, name = %step.name, action = step.action.name()))
                    .await;
                let elapsed = step_start.elapsed();

                let outcome = match result {
                    Ok(()) => {
                        debug!(index, elapsed_ms = elapsed.as_millis() as u64, "step completed");
                        StepOutcome::Completed
                    }
                    Err(err) if step.toughness == Toughness::Optional => {
                        info!(index, step = %step.name, error = %err, "optional step skipped");
                        StepOutcome::Skipped(err.to_string())
                    }
                    Err(err) => {
                        warn!(index, step = %step.name, error = %err, "mandatory step failed");
                        records.push(StepRecord {
                            index,
                            name: step.name.clone(),
                            action: step.action.name(),
                            toughness: step.toughness,
                            outcome: StepOutcome::Failed(err.to_string()),
                            timestamp,
                            elapsed,
                        });
                        failure = Some(FlowFailure {
                            at: FailedAt::Step {
                                index,
                                name: step.name.clone(),
                            },
                            cause: err,
                        });
                        break;
                    }
                };

                records.push(StepRecord {
                    index,
                    name: step.name.clone(),
                    action: step.action.name(),
                    toughness: step.toughness,
                    outcome,
                    timestamp,
                    elapsed,
                });

                if let Some(settle) = step.settle {
                    self.settle(settle, flow.steps.get(index + 1)).await;
                }
            }

            if failure.is_none() {
                if let Some(verification) = &flow.verification {
                    if let Err(err) = self.verify(verification, &flow.policy).await {
                        warn!(verification = verification.description(), error = %err, "verification failed");
                        failure = Some(FlowFailure {
                            at: FailedAt::Verification {
                                description: verification.description().to_string(),
                            },
                            cause: err,
                        });
                    }
                }
            }

            let success = failure.is_none();
            transition(
                &mut state,
                if success { FlowState::Succeeded } else { FlowState::Failed },
            );
            let elapsed = start.elapsed();
            info!(success, elapsed_ms = elapsed.as_millis() as u64, "flow finished");

            FlowResult {
                run_id,
                flow: flow.name.clone(),
                state,
                success,
                started_at,
                elapsed,
                steps: records,
                failure,
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, step: &Step, policy: &WaitPolicy) -> Result<(), AutomationError> {
        match &step.action {
            StepAction::Click { target } => self.interactor.wait_and_click(target, policy).await,
            StepAction::TypeText { target, text } => {
                self.interactor.wait_and_type(target, text, policy).await
            }
            StepAction::WaitFor { target } => {
                self.interactor.wait_for_element(target, policy).await.map(|_| ())
            }
            StepAction::ActivateApp { app_id } => self.interactor.activate_app(app_id).await,
        }
    }

    /// Lets the UI transition. Never fails.
    async fn settle(&self, settle: Settle, next: Option<&Step>) {
        match settle {
            Settle::UntilNextTargetPresent { max } => {
                let Some(target) = next.and_then(|s| s.action.target()) else {
                    warn!(pause_ms = max.as_millis() as u64, "no next target to settle on, pausing");
                    tokio::time::sleep(max).await;
                    return;
                };
                let bounded = tokio::time::timeout(
                    max,
                    self.interactor
                        .resolver()
                        .resolve(target, Condition::Presence, &WaitPolicy::new(max)),
                )
                .await;
                match bounded {
                    Ok(Ok(resolved)) => {
                        debug!(locator = %resolved.locator, elapsed_ms = resolved.elapsed.as_millis() as u64, "settled")
                    }
                    Ok(Err(err)) => debug!(error = %err, "next target not present after settle"),
                    Err(_) => debug!(max_ms = max.as_millis() as u64, "settle bound reached"),
                }
            }
            Settle::Fixed(pause) => {
                warn!(pause_ms = pause.as_millis() as u64, "fixed settle delay (known flakiness source)");
                tokio::time::sleep(pause).await;
            }
        }
    }

    /// Re-resolves the verification target; never trusts an earlier handle.
    async fn verify(&self, verification: &Verification, default: &WaitPolicy) -> Result<(), AutomationError> {
        match verification {
            Verification::Displayed { target, policy, .. } => {
                let policy = policy.unwrap_or(*default);
                let resolved = self
                    .interactor
                    .resolver()
                    .resolve(target, Condition::Presence, &policy)
                    .await?;
                if self.interactor.is_displayed(&resolved.element).await? {
                    Ok(())
                } else {
                    Err(AutomationError::NotDisplayed {
                        target: resolved.locator.to_string(),
                    })
                }
            }
            Verification::PageSourceContains { needle, .. } => {
                let source = self.interactor.page_source().await?;
                if source.contains(needle.as_str()) {
                    Ok(())
                } else {
                    Err(AutomationError::PageSourceMismatch {
                        needle: needle.clone(),
                    })
                }
            }
        }
    }
}

fn transition(state: &mut FlowState, next: FlowState) {
    info!(from = ?*state, to = ?next, "flow state");
    *state = next;
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
