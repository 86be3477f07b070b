//! Session creation capabilities and their W3C JSON form.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::AppConfig;
use crate::journeys::{ANDROID_SETTINGS_ACTIVITY, ANDROID_SETTINGS_PACKAGE};
use crate::session::SessionSetupError;

/// Target mobile platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// The `platformName` value servers expect.
    pub fn as_w3c(&self) -> &'static str {
        match self {
            Platform::Android => "Android",
            Platform::Ios => "iOS",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_w3c())
    }
}

impl FromStr for Platform {
    type Err = SessionSetupError;

    /// Parse platform name (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            _ => Err(SessionSetupError::UnsupportedPlatform(s.to_string())),
        }
    }
}

/// What to launch once the session is up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum AppTarget {
    Android {
        /// Installed from this path when set.
        app_path: Option<String>,
        package: String,
        activity: String,
    },
    Ios {
        bundle_id: String,
    },
}

/// The session creation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub platform: Platform,
    pub automation_engine: String,
    pub device_id: String,
    pub target: AppTarget,
    pub auto_grant_permissions: bool,
    pub no_reset: bool,
    /// Seconds of idle time before the server ends the session.
    pub new_command_timeout: u64,
}

impl Capabilities {
    /// Builds capabilities from the loaded configuration.
    ///
    /// # Errors
    ///
    /// [`SessionSetupError::UnsupportedPlatform`] if `platform.name` is
    /// neither Android nor iOS.
    pub fn from_config(config: &AppConfig) -> Result<Self, SessionSetupError> {
        let platform: Platform = config.platform_name.parse()?;
        let target = match platform {
            Platform::Android => AppTarget::Android {
                app_path: Some(config.app_path.clone()).filter(|p| !p.is_empty()),
                package: config.app_package.clone(),
                activity: config.app_activity.clone(),
            },
            Platform::Ios => AppTarget::Ios {
                bundle_id: config.bundle_id.clone(),
            },
        };
        Ok(Self {
            platform,
            automation_engine: config.automation_name.clone(),
            device_id: config.device_name.clone(),
            target,
            auto_grant_permissions: config.auto_grant_permissions,
            no_reset: config.no_reset,
            new_command_timeout: config.new_command_timeout,
        })
    }

    /// Targets the preinstalled Android Settings app instead of the app under
    /// test. Nothing is installed and app state is kept.
    pub fn for_android_settings(mut self) -> Self {
        self.target = AppTarget::Android {
            app_path: None,
            package: ANDROID_SETTINGS_PACKAGE.to_string(),
            activity: ANDROID_SETTINGS_ACTIVITY.to_string(),
        };
        self.no_reset = true;
        self.auto_grant_permissions = true;
        self
    }

    /// The `capabilities` body of a new-session request.
    pub fn to_w3c(&self) -> Value {
        let mut always = Map::new();
        always.insert("platformName".into(), json!(self.platform.as_w3c()));
        always.insert("appium:automationName".into(), json!(self.automation_engine));
        always.insert("appium:deviceName".into(), json!(self.device_id));
        match &self.target {
            AppTarget::Android {
                app_path,
                package,
                activity,
            } => {
                if let Some(path) = app_path {
                    always.insert("appium:app".into(), json!(path));
                }
                always.insert("appium:appPackage".into(), json!(package));
                always.insert("appium:appActivity".into(), json!(activity));
            }
            AppTarget::Ios { bundle_id } => {
                always.insert("appium:bundleId".into(), json!(bundle_id));
            }
        }
        always.insert("appium:autoGrantPermissions".into(), json!(self.auto_grant_permissions));
        always.insert("appium:noReset".into(), json!(self.no_reset));
        always.insert("appium:newCommandTimeout".into(), json!(self.new_command_timeout));
        always.insert("appium:ensureWebviewsHavePages".into(), json!(true));
        always.insert("appium:nativeWebScreenshot".into(), json!(true));
        always.insert("appium:connectHardwareKeyboard".into(), json!(true));

        json!({
            "alwaysMatch": always,
            "firstMatch": [{}],
        })
    }
}
