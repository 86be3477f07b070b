//! Built-in user journeys expressed as [`Flow`] data.
//!
//! Nothing here talks to a driver except the [`run_login`] convenience entry
//! point; every journey is an ordinary flow run by [`FlowRunner`].

use std::time::Duration;

use crate::capabilities::Platform;
use crate::driver::AutomationDriver;
use crate::flow::{Flow, FlowResult, FlowRunner, Verification};
use crate::locator::{Locator, LocatorChain};
use crate::step::{Settle, Step};
use crate::wait::WaitPolicy;

pub const DEFAULT_OTP: &str = "0000";
pub const DEFAULT_PIN: &str = "2580";

/// Package of the app under test when the configuration does not say otherwise.
pub const DEFAULT_APP_PACKAGE: &str = "indwin.c3.shareapp.test";

pub const ANDROID_SETTINGS_PACKAGE: &str = "com.android.settings";
pub const ANDROID_SETTINGS_ACTIVITY: &str = "com.android.settings.Settings";
pub const IOS_SETTINGS_BUNDLE: &str = "com.apple.Preferences";

const SYSTEM_OK_BUTTON: &str = "android:id/button1";
const PERMISSION_ALLOW_BUTTON: &str = "com.android.permissioncontroller:id/permission_allow_button";
const PRIMARY_BUTTON: &str = "primaryButton";
const CANCEL_BUTTON: &str = "Cancel";
const TEXT_INPUT_CLASS: &str = "android.widget.EditText";
const PIN_INPUT_FIELD: &str = "mpin_id_pin_input_field";
const MENU_BUTTON: &str = "menu_button";
const LOGOUT_BUTTON: &str = "logout_button";

/// Pause after the continue tap; the OTP field shares its class with the phone
/// field, so there is nothing new to wait for.
const SCREEN_CHANGE_PAUSE: Duration = Duration::from_secs(2);

/// Settings screens can be slow to draw on cold emulators.
const SETTINGS_POLICY: WaitPolicy = WaitPolicy::from_secs(20);

/// Phone number plus the one-time code and PIN typed during login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub phone: String,
    pub otp: String,
    pub pin: String,
}

impl LoginCredentials {
    /// Credentials with the test-environment OTP and PIN.
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            otp: DEFAULT_OTP.to_string(),
            pin: DEFAULT_PIN.to_string(),
        }
    }

    pub fn with_otp(mut self, otp: Option<&str>) -> Self {
        if let Some(otp) = otp {
            self.otp = otp.to_string();
        }
        self
    }

    pub fn with_pin(mut self, pin: Option<&str>) -> Self {
        if let Some(pin) = pin {
            self.pin = pin.to_string();
        }
        self
    }
}

fn permission_allow() -> Locator {
    Locator::id(PERMISSION_ALLOW_BUTTON)
}

fn text_input() -> Locator {
    Locator::class_name(TEXT_INPUT_CLASS)
}

/// The avatar on the home screen, shown only after a successful login.
pub fn home_avatar() -> Locator {
    Locator::nth_of_class("android.widget.ImageView", 1)
}

/// Full login from app launch to the home screen.
///
/// Step indices (0-based) are stable and show up in failure reports:
///
/// | # | step | |
/// |---|---|---|
/// | 0 | dismiss system dialog | optional |
/// | 1 | start login | |
/// | 2 | primary button | |
/// | 3, 4 | allow permission | |
/// | 5 | cancel dialog | |
/// | 6 | enter phone | |
/// | 7 | tap phone field | optional |
/// | 8 | continue | fixed settle |
/// | 9 | enter OTP | settles on the PIN field |
/// | 10 | enter PIN | |
/// | 11 | allow permission | |
pub fn login_flow(credentials: &LoginCredentials, app_package: &str) -> Flow {
    Flow::new("login")
        .step(Step::click("dismiss system dialog", Locator::id(SYSTEM_OK_BUTTON)).optional())
        .step(Step::click(
            "start login",
            Locator::id(format!("{}:id/dls_button_label", app_package)),
        ))
        .step(Step::click("primary button", Locator::accessibility_id(PRIMARY_BUTTON)))
        .step(Step::click("allow first permission", permission_allow()))
        .step(Step::click("allow second permission", permission_allow()))
        .step(Step::click("cancel dialog", Locator::accessibility_id(CANCEL_BUTTON)))
        .step(Step::type_text("enter phone", text_input(), &credentials.phone))
        .step(Step::click("tap phone field", text_input()).optional())
        .step(
            Step::click("continue", Locator::nth_of_class("android.view.View", 6))
                .settle(Settle::Fixed(SCREEN_CHANGE_PAUSE)),
        )
        .step(
            Step::type_text("enter otp", text_input(), &credentials.otp).settle(
                Settle::UntilNextTargetPresent {
                    max: SCREEN_CHANGE_PAUSE,
                },
            ),
        )
        .step(Step::type_text(
            "enter pin",
            Locator::accessibility_id(PIN_INPUT_FIELD),
            &credentials.pin,
        ))
        .step(Step::click("allow final permission", permission_allow()))
        .verify(Verification::displayed("home avatar", home_avatar()))
}

/// Ordered guesses for the Android Settings root screen, most stable first.
pub fn android_settings_root() -> LocatorChain {
    LocatorChain::from(Locator::id("android:id/title"))
        .or(Locator::xpath(
            "//*[contains(@text, 'Settings') or contains(@text, 'settings')]",
        ))
        .or(Locator::xpath(
            "//android.widget.FrameLayout[@resource-id='android:id/content']",
        ))
}

/// Launches the platform Settings app and checks that its root screen shows.
pub fn settings_launch_flow(platform: Platform) -> Flow {
    match platform {
        Platform::Android => Flow::new("settings")
            .with_policy(SETTINGS_POLICY)
            .step(Step::activate_app("launch settings", ANDROID_SETTINGS_PACKAGE))
            .verify(Verification::displayed("settings root", android_settings_root())),
        Platform::Ios => Flow::new("settings")
            .step(Step::activate_app("launch settings", IOS_SETTINGS_BUNDLE))
            .verify(
                Verification::displayed(
                    "general row",
                    Locator::class_chain("**/XCUIElementTypeStaticText[`label == 'General'`]"),
                )
                .with_policy(SETTINGS_POLICY),
            ),
    }
}

/// Launches Android Settings and checks once that its package shows up in the
/// page source.
pub fn settings_source_check() -> Flow {
    Flow::new("settings source")
        .step(Step::activate_app("launch settings", ANDROID_SETTINGS_PACKAGE))
        .verify(Verification::page_source_contains(
            "settings package in source",
            ANDROID_SETTINGS_PACKAGE,
        ))
}

/// Signs out from the home screen.
pub fn logout_flow() -> Flow {
    Flow::new("logout")
        .step(Step::click("open menu", Locator::accessibility_id(MENU_BUTTON)))
        .step(Step::click("log out", Locator::accessibility_id(LOGOUT_BUTTON)))
}

/// Runs the login journey for the default app package.
///
/// `otp` and `pin` fall back to [`DEFAULT_OTP`] and [`DEFAULT_PIN`].
pub async fn run_login(
    driver: &dyn AutomationDriver,
    phone: &str,
    otp: Option<&str>,
    pin: Option<&str>,
) -> FlowResult {
    let credentials = LoginCredentials::new(phone).with_otp(otp).with_pin(pin);
    FlowRunner::new(driver)
        .run(login_flow(&credentials, DEFAULT_APP_PACKAGE))
        .await
}
