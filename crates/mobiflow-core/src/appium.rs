//! W3C WebDriver / Appium HTTP backend for [`AutomationDriver`].
//!
//! [`AppiumDriver`] is bound to one remote session. Each trait method is one
//! HTTP request under `/session/{id}/`; responses are unwrapped from their
//! `{"value": ...}` envelope and W3C error codes are mapped onto
//! [`DriverError`] so the poller can tell "not there yet" from "session gone".
//!
//! Sessions are created and deleted by [`Session`](crate::session::Session).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, debug_span, trace, Instrument};
use url::Url;

use crate::driver::{AutomationDriver, DriverError};
use crate::element::ElementHandle;
use crate::locator::Locator;

/// Driver for one live Appium session.
#[derive(Debug, Clone)]
pub struct AppiumDriver {
    client: Client,
    /// `{server}/session/{id}/`, always with a trailing slash.
    session_url: Url,
    session_id: String,
}

impl AppiumDriver {
    /// Binds a driver to an existing session on `server`.
    pub fn new(client: Client, server: &Url, session_id: impl Into<String>) -> Result<Self, DriverError> {
        let session_id = session_id.into();
        let session_url = endpoint_base(server)
            .join(&format!("session/{}/", session_id))
            .map_err(|e| DriverError::CommandFailed(format!("invalid session url: {}", e)))?;
        Ok(Self {
            client,
            session_url,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Sets the server-side implicit wait applied to every find.
    pub async fn set_implicit_wait(&self, wait: Duration) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            "timeouts",
            Some(json!({ "implicit": wait.as_millis() as u64 })),
        )
        .await?;
        Ok(())
    }

    /// Ends the remote session.
    pub async fn delete_session(&self) -> Result<(), DriverError> {
        let mut url = self.session_url.clone();
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Sends one command relative to the session url and returns the
    /// unwrapped `value`.
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = self
            .session_url
            .join(path)
            .map_err(|e| DriverError::CommandFailed(format!("invalid command path '{}': {}", path, e)))?;
        self.send(method, url, body).await
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, DriverError> {
        let span = debug_span!("appium_command", %method, path = url.path());
        async {
            debug!(url = %url, "sending command");
            let mut request = self.client.request(method, url);
            if let Some(body) = &body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(transport_error)?;
            let status = response.status();
            let text = response.text().await.map_err(transport_error)?;
            trace!(%status, body = %text, "response");
            parse_response(status, &text)
        }
        .instrument(span)
        .await
    }

    fn element_path(element: &ElementHandle, tail: &str) -> String {
        format!("element/{}/{}", element.id(), tail)
    }
}

#[async_trait]
impl AutomationDriver for AppiumDriver {
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let value = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": locator.w3c_strategy(), "value": locator.selector() })),
            )
            .await?;
        let items = value
            .as_array()
            .ok_or_else(|| DriverError::JsonParse(format!("expected element array, got {}", value)))?;
        items
            .iter()
            .map(|item| {
                ElementHandle::from_w3c(item)
                    .ok_or_else(|| DriverError::JsonParse(format!("not an element reference: {}", item)))
            })
            .collect()
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let value = self.command(Method::GET, &Self::element_path(element, "displayed"), None).await?;
        as_bool(&value)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let value = self.command(Method::GET, &Self::element_path(element, "enabled"), None).await?;
        as_bool(&value)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.command(Method::POST, &Self::element_path(element, "click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &Self::element_path(element, "value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let value = self.command(Method::GET, "source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::JsonParse(format!("expected page source string, got {}", value)))
    }

    async fn activate_app(&self, app_id: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            "appium/device/activate_app",
            Some(json!({ "appId": app_id, "bundleId": app_id })),
        )
        .await?;
        Ok(())
    }
}

/// Returns `server` with a trailing slash so relative joins append to its path.
pub(crate) fn endpoint_base(server: &Url) -> Url {
    let mut base = server.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

pub(crate) fn transport_error(err: reqwest::Error) -> DriverError {
    if err.is_connect() || err.is_timeout() {
        DriverError::ConnectionLost(err.to_string())
    } else {
        DriverError::Http(err)
    }
}

/// Unwraps the `value` envelope, mapping W3C errors by their `error` code.
pub(crate) fn parse_response(status: StatusCode, text: &str) -> Result<Value, DriverError> {
    let mut body: Value = serde_json::from_str(text).map_err(|e| {
        DriverError::JsonParse(format!("HTTP {}: {} ({})", status.as_u16(), e, text.trim()))
    })?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    let code = value.get("error").and_then(Value::as_str);
    if status.is_success() && code.is_none() {
        return Ok(value);
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Err(match code {
        Some("no such element") => DriverError::NoSuchElement(message),
        Some("stale element reference") => DriverError::StaleElement(message),
        Some("invalid session id") => DriverError::InvalidSession(message),
        Some(code) => DriverError::CommandFailed(format!("{}: {}", code, message)),
        None => DriverError::CommandFailed(format!("HTTP {}: {}", status.as_u16(), text.trim())),
    })
}

fn as_bool(value: &Value) -> Result<bool, DriverError> {
    value
        .as_bool()
        .ok_or_else(|| DriverError::JsonParse(format!("expected boolean, got {}", value)))
}
