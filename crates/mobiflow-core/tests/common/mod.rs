//! Shared test helpers for mobiflow-core integration tests.
//!
//! This module provides a scripted in-memory [`MockDriver`] for exercising the
//! wait, resolve and flow layers, and a mock Appium HTTP server for the
//! session and HTTP driver.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mobiflow_core::driver::{AutomationDriver, DriverError};
use mobiflow_core::element::ElementHandle;
use mobiflow_core::locator::Locator;

// ---------------------------------------------------------------------------
// Scripted in-memory driver
// ---------------------------------------------------------------------------

/// How a mocked element behaves.
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Found from this find call on (1-based); `None` means never.
    appears_on: Option<u32>,
    displayed: bool,
    enabled: bool,
    stale_on_click: bool,
    /// Every find fails with a connection error.
    broken: bool,
}

impl MockElement {
    /// Found on the first query.
    pub fn present() -> Self {
        Self::appears_on(1)
    }

    /// Found from the `n`-th query of its locator on.
    pub fn appears_on(n: u32) -> Self {
        Self {
            appears_on: Some(n),
            displayed: true,
            enabled: true,
            stale_on_click: false,
            broken: false,
        }
    }

    /// Never found.
    pub fn never() -> Self {
        Self {
            appears_on: None,
            ..Self::present()
        }
    }

    /// Every find fails as if the server went away.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::present()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Clicking goes stale, as if the screen changed after resolution.
    pub fn stale_on_click(mut self) -> Self {
        self.stale_on_click = true;
        self
    }
}

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(Locator),
    Click(Locator),
    Type(Locator, String),
    Activate(String),
    PageSource,
}

#[derive(Default)]
struct MockState {
    elements: HashMap<Locator, (String, MockElement)>,
    by_id: HashMap<String, Locator>,
    finds: HashMap<Locator, u32>,
    calls: Vec<Call>,
    page_source: String,
    activate_fails: bool,
}

/// A scripted UI: each locator maps to one element whose behavior is fixed up
/// front. Unknown locators never match. Every call is recorded.
#[derive(Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, locator: Locator, element: MockElement) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = format!("e{}", state.elements.len() + 1);
            state.by_id.insert(id.clone(), locator.clone());
            state.elements.insert(locator, (id, element));
        }
        self
    }

    pub fn with_page_source(self, source: &str) -> Self {
        self.state.lock().unwrap().page_source = source.to_string();
        self
    }

    pub fn failing_activate(self) -> Self {
        self.state.lock().unwrap().activate_fails = true;
        self
    }

    /// Number of find calls issued for `locator`.
    pub fn find_count(&self, locator: &Locator) -> u32 {
        self.state.lock().unwrap().finds.get(locator).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Locators of clicked elements, in order.
    pub fn clicked(&self) -> Vec<Locator> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Click(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Text sent to elements, in order.
    pub fn typed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Type(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn activated(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Activate(app) => Some(app),
                _ => None,
            })
            .collect()
    }

    fn element(&self, handle: &ElementHandle) -> Result<(Locator, MockElement), DriverError> {
        let state = self.state.lock().unwrap();
        let locator = state
            .by_id
            .get(handle.id())
            .cloned()
            .ok_or_else(|| DriverError::StaleElement(handle.to_string()))?;
        let (_, element) = state.elements[&locator].clone();
        Ok((locator, element))
    }
}

#[async_trait]
impl AutomationDriver for MockDriver {
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Find(locator.clone()));
        let count = {
            let n = state.finds.entry(locator.clone()).or_insert(0);
            *n += 1;
            *n
        };
        match state.elements.get(locator) {
            Some((_, el)) if el.broken => Err(DriverError::ConnectionLost("connection reset by peer".into())),
            Some((id, el)) if el.appears_on.is_some_and(|n| count >= n) => Ok(vec![ElementHandle::new(id.clone())]),
            _ => Ok(vec![]),
        }
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self.element(element)?.1.displayed)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self.element(element)?.1.enabled)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let (locator, el) = self.element(element)?;
        self.state.lock().unwrap().calls.push(Call::Click(locator));
        if el.stale_on_click {
            return Err(DriverError::StaleElement(element.to_string()));
        }
        Ok(())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let (locator, _) = self.element(element)?;
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::Type(locator, text.to_string()));
        Ok(())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PageSource);
        Ok(state.page_source.clone())
    }

    async fn activate_app(&self, app_id: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Activate(app_id.to_string()));
        if state.activate_fails {
            return Err(DriverError::CommandFailed(format!("app {} is not installed", app_id)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock Appium HTTP server
// ---------------------------------------------------------------------------

/// One request received by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Value,
}

/// A running mock server.
pub struct MockAppium {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockAppium {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The first recorded request to `path` with `method`.
    pub fn find(&self, method: &str, path: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path == path)
    }
}

/// Start a mock Appium server that answers every request with `handler`.
///
/// Each connection carries one request and is closed after the reply.
pub async fn mock_appium<F>(handler: F) -> MockAppium
where
    F: Fn(&RecordedRequest) -> (u16, Value) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let Some(request) = read_request(&mut stream).await else {
                continue;
            };
            recorded.lock().unwrap().push(request.clone());

            let (status, body) = handler(&request);
            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 {} MOCK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.flush().await;
        }
    });

    MockAppium {
        url: format!("http://{}", addr),
        requests,
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);

    Some(RecordedRequest { method, path, body })
}

/// A W3C error body.
pub fn w3c_error(code: &str, message: &str) -> Value {
    serde_json::json!({ "value": { "error": code, "message": message, "stacktrace": "" } })
}
