//! Run configuration loaded from a Java-style properties file.
//!
//! The file is optional. Every key has a default and a missing file, a missing
//! key or an unparsable value all fall back to it, so loading never fails.
//!
//! # Example
//!
//! ```no_run
//! use mobiflow_core::config::AppConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = AppConfig::load("config.properties");
//! println!("server: {}", config.server_url);
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::wait::WaitPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "config.properties";

/// Effective configuration for one run.
///
/// Loaded once and passed by reference; nothing in the crate reads
/// configuration from a global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    /// `appium.server.url`
    pub server_url: String,
    /// `platform.name`
    pub platform_name: String,
    /// `automation.name`
    pub automation_name: String,
    /// `device.name`
    pub device_name: String,
    /// `app.path`
    pub app_path: String,
    /// `app.package`
    pub app_package: String,
    /// `app.activity`
    pub app_activity: String,
    /// `bundle.id` (iOS)
    pub bundle_id: String,
    /// `implicit.wait`, seconds. Reported only: sessions always run with the
    /// server-side implicit wait at zero.
    pub implicit_wait: u64,
    /// `explicit.wait`, seconds
    pub explicit_wait: u64,
    /// `auto.grant.permissions`
    pub auto_grant_permissions: bool,
    /// `no.reset`
    pub no_reset: bool,
    /// `new.command.timeout`, seconds
    pub new_command_timeout: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4723".to_string(),
            platform_name: "Android".to_string(),
            automation_name: "UiAutomator2".to_string(),
            device_name: "emulator-5554".to_string(),
            app_path: "/Users/abhinav/Downloads/appAndroid.apk".to_string(),
            app_package: "indwin.c3.shareapp.test".to_string(),
            app_activity: "com.slice.android.main.SingleActivity".to_string(),
            bundle_id: "com.apple.Preferences".to_string(),
            implicit_wait: 10,
            explicit_wait: 15,
            auto_grant_permissions: false,
            no_reset: false,
            new_command_timeout: 3600,
        }
    }
}

impl AppConfig {
    /// Load config from a properties file.
    ///
    /// Returns [`Default`] values for anything the file does not provide,
    /// including when the file does not exist or cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "config file not read, using defaults");
                Self::default()
            }
        }
    }

    /// Builds a config from properties text, falling back per key.
    pub fn parse(text: &str) -> Self {
        let props = parse_properties(text);
        let defaults = Self::default();
        let string = |key: &str, default: String| props.get(key).cloned().unwrap_or(default);

        Self {
            server_url: string("appium.server.url", defaults.server_url),
            platform_name: string("platform.name", defaults.platform_name),
            automation_name: string("automation.name", defaults.automation_name),
            device_name: string("device.name", defaults.device_name),
            app_path: string("app.path", defaults.app_path),
            app_package: string("app.package", defaults.app_package),
            app_activity: string("app.activity", defaults.app_activity),
            bundle_id: string("bundle.id", defaults.bundle_id),
            implicit_wait: int(&props, "implicit.wait", defaults.implicit_wait),
            explicit_wait: int(&props, "explicit.wait", defaults.explicit_wait),
            auto_grant_permissions: boolean(&props, "auto.grant.permissions", defaults.auto_grant_permissions),
            no_reset: boolean(&props, "no.reset", defaults.no_reset),
            new_command_timeout: int(&props, "new.command.timeout", defaults.new_command_timeout),
        }
    }

    /// Default wait policy for flows, from `explicit.wait`.
    pub fn explicit_wait_policy(&self) -> WaitPolicy {
        WaitPolicy::from_secs(self.explicit_wait)
    }
}

fn int(props: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    match props.get(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default, "invalid integer in config, using default");
            default
        }),
    }
}

/// Anything other than a case-insensitive `true` is false.
fn boolean(props: &HashMap<String, String>, key: &str, default: bool) -> bool {
    props
        .get(key)
        .map(|raw| raw.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Parses `key=value`, `key: value` and `key value` lines.
///
/// Lines starting with `#` or `!` are comments. Later keys win. Line
/// continuations and escapes are not supported.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) {
            Some(pos) => {
                let key = &line[..pos];
                let rest = line[pos..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                (key, rest.trim())
            }
            None => (line, ""),
        };
        props.insert(key.to_string(), value.to_string());
    }
    props
}
