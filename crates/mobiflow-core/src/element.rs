//! Element handles returned by the remote automation server.
//!
//! The server never ships element state to the client. A find command returns
//! opaque references, and every later question about the element (is it
//! displayed, is it enabled) is another round-trip keyed by that reference.
//! [`ElementHandle`] is that reference and nothing more.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key under which W3C WebDriver servers return element references.
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Key used by legacy JSON Wire Protocol servers.
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// An opaque reference to an element in the remote UI tree.
///
/// Handles are only meaningful for the session that produced them and may go
/// stale as soon as the screen changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    id: String,
}

impl ElementHandle {
    /// Wraps a raw element reference.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The server-assigned element reference.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Extracts a handle from a W3C element object such as
    /// `{"element-6066-11e4-a52e-4f735466cecf": "42"}`.
    ///
    /// Falls back to the legacy `ELEMENT` key. Returns `None` for anything
    /// else.
    pub fn from_w3c(value: &Value) -> Option<Self> {
        value
            .get(W3C_ELEMENT_KEY)
            .or_else(|| value.get(LEGACY_ELEMENT_KEY))
            .and_then(Value::as_str)
            .map(Self::new)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.id)
    }
}
