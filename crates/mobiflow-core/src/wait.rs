//! Bounded-time polling, the single synchronization primitive.
//!
//! [`poll_until`] re-runs a probe against the live server until it yields a
//! value or the [`WaitPolicy`] timeout elapses. It knows nothing about locator
//! strategies or flows; the locator it takes is only carried into the timeout
//! error.
//!
//! Timing is wall-clock since the poll started. The sleep before the last probe
//! is clamped to the remaining budget, so a probe that never succeeds fails at
//! the timeout and never later than one polling interval past it.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::driver::DriverError;
use crate::error::AutomationError;
use crate::locator::Locator;

/// Default explicit wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Pause between probes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What a resolved element must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The element exists in the UI tree.
    Presence,
    /// The element exists, is displayed and is enabled.
    Interactable,
}

/// Timeout plus polling interval for one bounded wait.
///
/// The interval is fixed at [`POLL_INTERVAL`]; only the timeout is chosen by
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    timeout: Duration,
    interval: Duration,
}

impl WaitPolicy {
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: POLL_INTERVAL,
        }
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Repeatedly evaluates `probe` until it returns `Ok(Some(_))` or the policy's
/// timeout elapses.
///
/// Each evaluation is expected to query the remote server afresh.
/// Transient driver errors ([`DriverError::is_transient`]) count as "not yet";
/// any other driver error ends the wait immediately as
/// [`AutomationError::Driver`].
///
/// # Errors
///
/// [`AutomationError::ElementNotFound`] carrying `locator`, the elapsed time and
/// the last transient error, once the timeout is reached.
pub async fn poll_until<T, F, Fut>(
    locator: &Locator,
    policy: &WaitPolicy,
    mut probe: F,
) -> Result<T, AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, DriverError>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_error: Option<String> = None;

    loop {
        attempts += 1;
        match probe().await {
            Ok(Some(found)) => {
                trace!(%locator, attempts, elapsed_ms = start.elapsed().as_millis() as u64, "condition met");
                return Ok(found);
            }
            Ok(None) => {
                trace!(%locator, attempts, "condition not met");
            }
            Err(err) if err.is_transient() => {
                trace!(%locator, attempts, error = %err, "transient error while polling");
                last_error = Some(err.to_string());
            }
            Err(err) => {
                debug!(%locator, attempts, error = %err, "poll aborted");
                return Err(AutomationError::Driver(err));
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout() {
            debug!(%locator, attempts, elapsed_ms = elapsed.as_millis() as u64, "poll timed out");
            return Err(AutomationError::ElementNotFound {
                locator: locator.clone(),
                elapsed,
                last_error,
            });
        }

        let remaining = policy.timeout() - elapsed;
        tokio::time::sleep(remaining.min(policy.interval())).await;
    }
}
