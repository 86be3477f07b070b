//! Remote session lifecycle.
//!
//! [`Session::create`] opens a session on the automation server and hands out
//! a borrowed [`AutomationDriver`]; [`Session::quit`] deletes it. Flows only
//! ever borrow the driver, so a session outlives every flow run on it.
//!
//! # Example
//!
//! ```no_run
//! use mobiflow_core::capabilities::Capabilities;
//! use mobiflow_core::config::AppConfig;
//! use mobiflow_core::journeys::run_login;
//! use mobiflow_core::session::Session;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("config.properties");
//! let caps = Capabilities::from_config(&config)?;
//! let session = Session::create(&config.server_url, &caps).await?;
//!
//! let result = run_login(session.driver(), "8278650784", None, None).await;
//! println!("login succeeded: {}", result.success);
//!
//! session.quit().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use crate::appium::{endpoint_base, parse_response, transport_error, AppiumDriver};
use crate::capabilities::Capabilities;
use crate::driver::{AutomationDriver, DriverError};

/// Timeout for establishing the HTTP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-request timeout. Session creation may install and launch the app, so
/// this is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The session could not be created. Always fatal for a run.
#[derive(Error, Debug)]
pub enum SessionSetupError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("automation server unreachable: {0}")]
    Unreachable(String),

    /// The server answered but refused to create the session.
    #[error("session rejected: {0}")]
    Rejected(String),

    #[error("malformed new-session response: {0}")]
    MalformedResponse(String),

    #[error("unsupported platform '{0}' (expected Android or iOS)")]
    UnsupportedPlatform(String),
}

impl From<DriverError> for SessionSetupError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::ConnectionLost(msg) => SessionSetupError::Unreachable(msg),
            DriverError::Http(e) => SessionSetupError::Unreachable(e.to_string()),
            DriverError::JsonParse(msg) => SessionSetupError::MalformedResponse(msg),
            other => SessionSetupError::Rejected(other.to_string()),
        }
    }
}

/// A live remote session.
pub struct Session {
    driver: AppiumDriver,
}

impl Session {
    /// Creates a session on `server_url` and turns the server-side implicit
    /// wait off.
    ///
    /// Finds must answer at once so the client-side poller alone decides how
    /// long a wait lasts, and a cancelled settle never leaves a find running
    /// on the server. A failure to reset the implicit wait is logged and
    /// ignored.
    pub async fn create(server_url: &str, caps: &Capabilities) -> Result<Self, SessionSetupError> {
        let span = info_span!("session_create", server = server_url, platform = %caps.platform);
        async {
            let server = Url::parse(server_url).map_err(|e| SessionSetupError::InvalidUrl {
                url: server_url.to_string(),
                reason: e.to_string(),
            })?;
            let endpoint = endpoint_base(&server)
                .join("session")
                .map_err(|e| SessionSetupError::InvalidUrl {
                    url: server_url.to_string(),
                    reason: e.to_string(),
                })?;

            let client = Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| SessionSetupError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

            debug!(%endpoint, "creating session");
            let response = client
                .post(endpoint)
                .json(&json!({ "capabilities": caps.to_w3c() }))
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            let text = response.text().await.map_err(transport_error)?;
            let value = parse_response(status, &text)?;

            let session_id = session_id_from(&value, &text).ok_or_else(|| {
                SessionSetupError::MalformedResponse(format!("no sessionId in {}", text.trim()))
            })?;
            info!(session_id = %session_id, "session created");

            let driver = AppiumDriver::new(client, &server, session_id)?;
            if let Err(e) = driver.set_implicit_wait(Duration::ZERO).await {
                warn!(error = %e, "failed to disable implicit wait");
            }
            Ok(Self { driver })
        }
        .instrument(span)
        .await
    }

    /// The driver for this session.
    pub fn driver(&self) -> &dyn AutomationDriver {
        &self.driver
    }

    pub fn session_id(&self) -> &str {
        self.driver.session_id()
    }

    /// Deletes the remote session. Errors are logged, not raised.
    pub async fn quit(self) {
        match self.driver.delete_session().await {
            Ok(()) => info!(session_id = self.driver.session_id(), "session deleted"),
            Err(e) => warn!(session_id = self.driver.session_id(), error = %e, "failed to delete session"),
        }
    }
}

/// W3C servers put the id under `value.sessionId`; older ones at the top level.
fn session_id_from(value: &Value, raw: &str) -> Option<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            serde_json::from_str::<Value>(raw)
                .ok()?
                .get("sessionId")?
                .as_str()
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_prefers_w3c_location() {
        let raw = r#"{"value": {"sessionId": "w3c", "capabilities": {}}, "sessionId": "legacy"}"#;
        let value = json!({"sessionId": "w3c", "capabilities": {}});
        assert_eq!(session_id_from(&value, raw).as_deref(), Some("w3c"));
    }

    #[test]
    fn session_id_falls_back_to_top_level() {
        let raw = r#"{"status": 0, "sessionId": "legacy", "value": {}}"#;
        assert_eq!(session_id_from(&json!({}), raw).as_deref(), Some("legacy"));
        assert_eq!(session_id_from(&json!({}), "{}"), None);
    }

    #[test]
    fn driver_errors_map_to_setup_errors() {
        let err: SessionSetupError = DriverError::ConnectionLost("refused".into()).into();
        assert!(matches!(err, SessionSetupError::Unreachable(_)));

        let err: SessionSetupError = DriverError::CommandFailed("session not created: no device".into()).into();
        assert!(matches!(err, SessionSetupError::Rejected(m) if m.contains("no device")));

        let err: SessionSetupError = DriverError::JsonParse("eof".into()).into();
        assert!(matches!(err, SessionSetupError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_any_request() {
        let caps = Capabilities::from_config(&crate::config::AppConfig::default()).unwrap();
        let result = Session::create("not a url", &caps).await;
        assert!(matches!(result, Err(SessionSetupError::InvalidUrl { .. })));
    }
}
