//! Locator strategies and ordered locator chains.
//!
//! A [`Locator`] pairs a strategy with a selector string. Strategies are a
//! closed set, and the only place that knows how a strategy is spelled on the
//! wire is [`Locator::w3c_strategy`]. Call sites never build query syntax by
//! hand.
//!
//! A [`LocatorChain`] is an ordered list of guesses for the same element, most
//! specific first. Layouts drift between OS versions and app builds, so a
//! stable resource id is tried before a text query, and a text query before a
//! structural XPath.
//!
//! # Example
//!
//! ```
//! use mobiflow_core::locator::{Locator, LocatorChain};
//!
//! let root = LocatorChain::from(Locator::id("android:id/title"))
//!     .or(Locator::xpath("//*[contains(@text, 'Settings')]"))
//!     .or(Locator::xpath("//android.widget.FrameLayout[@resource-id='android:id/content']"));
//!
//! assert_eq!(root.len(), 3);
//! assert_eq!(root.locators()[0].w3c_strategy(), "id");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A strategy-tagged selector identifying an element on the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "selector", rename_all = "snake_case")]
pub enum Locator {
    /// Resource id, e.g. `com.example:id/login` or `android:id/button1`.
    Id(String),
    /// Accessibility id (content-desc on Android, accessibilityIdentifier on iOS).
    AccessibilityId(String),
    /// Platform widget class, e.g. `android.widget.EditText`.
    ClassName(String),
    /// Android UiAutomator selector expression.
    UiAutomator(String),
    /// XPath over the page source.
    XPath(String),
    /// iOS class chain query.
    ClassChain(String),
}

impl Locator {
    pub fn id(selector: impl Into<String>) -> Self {
        Locator::Id(selector.into())
    }

    pub fn accessibility_id(selector: impl Into<String>) -> Self {
        Locator::AccessibilityId(selector.into())
    }

    pub fn class_name(selector: impl Into<String>) -> Self {
        Locator::ClassName(selector.into())
    }

    pub fn ui_automator(selector: impl Into<String>) -> Self {
        Locator::UiAutomator(selector.into())
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Locator::XPath(selector.into())
    }

    pub fn class_chain(selector: impl Into<String>) -> Self {
        Locator::ClassChain(selector.into())
    }

    /// The `instance`-th element of the given widget class (0-based), as a
    /// UiAutomator query.
    pub fn nth_of_class(class: &str, instance: u32) -> Self {
        Locator::UiAutomator(format!(
            "new UiSelector().className(\"{}\").instance({})",
            class, instance
        ))
    }

    /// The raw selector string.
    pub fn selector(&self) -> &str {
        match self {
            Locator::Id(s)
            | Locator::AccessibilityId(s)
            | Locator::ClassName(s)
            | Locator::UiAutomator(s)
            | Locator::XPath(s)
            | Locator::ClassChain(s) => s,
        }
    }

    /// The `using` value a W3C/Appium server expects for this strategy.
    pub fn w3c_strategy(&self) -> &'static str {
        match self {
            Locator::Id(_) => "id",
            Locator::AccessibilityId(_) => "accessibility id",
            Locator::ClassName(_) => "class name",
            Locator::UiAutomator(_) => "-android uiautomator",
            Locator::XPath(_) => "xpath",
            Locator::ClassChain(_) => "-ios class chain",
        }
    }

    /// Short strategy name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Locator::Id(_) => "id",
            Locator::AccessibilityId(_) => "accessibility_id",
            Locator::ClassName(_) => "class_name",
            Locator::UiAutomator(_) => "ui_automator",
            Locator::XPath(_) => "xpath",
            Locator::ClassChain(_) => "class_chain",
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name(), self.selector())
    }
}

/// An ordered sequence of alternative locators for one element.
///
/// The first locator that resolves wins; later alternatives are only tried
/// after earlier ones time out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorChain {
    locators: Vec<Locator>,
}

impl LocatorChain {
    /// Builds a chain from an ordered list of alternatives.
    pub fn new(locators: Vec<Locator>) -> Self {
        Self { locators }
    }

    /// Appends a less specific fallback.
    pub fn or(mut self, fallback: Locator) -> Self {
        self.locators.push(fallback);
        self
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    /// The most specific alternative, if any.
    pub fn primary(&self) -> Option<&Locator> {
        self.locators.first()
    }
}

impl From<Locator> for LocatorChain {
    fn from(locator: Locator) -> Self {
        Self {
            locators: vec![locator],
        }
    }
}

impl fmt::Display for LocatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.locators.is_empty() {
            return f.write_str("<empty chain>");
        }
        for (i, locator) in self.locators.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", locator)?;
        }
        Ok(())
    }
}
