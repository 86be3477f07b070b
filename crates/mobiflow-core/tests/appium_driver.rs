//! Session lifecycle and HTTP driver against a mock Appium server.

mod common;

use common::{mock_appium, w3c_error, RecordedRequest};
use mobiflow_core::capabilities::{Capabilities, Platform};
use mobiflow_core::config::AppConfig;
use mobiflow_core::driver::DriverError;
use mobiflow_core::element::{ElementHandle, W3C_ELEMENT_KEY};
use mobiflow_core::error::AutomationError;
use mobiflow_core::flow::FlowRunner;
use mobiflow_core::journeys::settings_launch_flow;
use mobiflow_core::locator::Locator;
use mobiflow_core::resolver::LocatorResolver;
use mobiflow_core::session::{Session, SessionSetupError};
use mobiflow_core::wait::{Condition, WaitPolicy};
use serde_json::{json, Value};

/// A well-behaved server with one session `abc`. Any `id` locator whose
/// selector starts with `present` matches element `el-1`; element `gone` is
/// stale.
fn appium(req: &RecordedRequest) -> (u16, Value) {
    let path = req.path.trim_start_matches("/wd/hub");
    match (req.method.as_str(), path) {
        ("POST", "/session") => (
            200,
            json!({ "value": { "sessionId": "abc", "capabilities": { "platformName": "Android" } } }),
        ),
        ("POST", "/session/abc/elements") => {
            let matches = req.body["using"] == "id"
                && req.body["value"].as_str().is_some_and(|v| v.starts_with("present"));
            if matches {
                (200, json!({ "value": [{ W3C_ELEMENT_KEY: "el-1" }] }))
            } else {
                (200, json!({ "value": [] }))
            }
        }
        ("GET", "/session/abc/element/el-1/displayed") => (200, json!({ "value": true })),
        ("GET", "/session/abc/element/el-1/enabled") => (200, json!({ "value": false })),
        ("POST", "/session/abc/element/gone/click") => {
            (404, w3c_error("stale element reference", "element is not attached"))
        }
        ("GET", "/session/abc/source") => (200, json!({ "value": "<hierarchy rotation=\"0\"/>" })),
        ("POST", _) | ("DELETE", _) if path.starts_with("/session/abc") => (200, json!({ "value": null })),
        _ => (404, w3c_error("unknown command", path)),
    }
}

fn android_caps() -> Capabilities {
    Capabilities::from_config(&AppConfig::default()).unwrap()
}

#[tokio::test]
async fn create_posts_capabilities_then_disables_implicit_wait() {
    let server = mock_appium(appium).await;

    let session = Session::create(&server.url, &android_caps()).await.unwrap();
    assert_eq!(session.session_id(), "abc");

    let create = server.find("POST", "/session").unwrap();
    let always = &create.body["capabilities"]["alwaysMatch"];
    assert_eq!(always["platformName"], "Android");
    assert_eq!(always["appium:automationName"], "UiAutomator2");
    assert_eq!(always["appium:appPackage"], "indwin.c3.shareapp.test");
    assert_eq!(always["appium:nativeWebScreenshot"], true);

    let timeouts = server.find("POST", "/session/abc/timeouts").unwrap();
    assert_eq!(timeouts.body, json!({ "implicit": 0 }));
}

#[tokio::test]
async fn configured_implicit_wait_is_never_sent() {
    let server = mock_appium(appium).await;
    let config = AppConfig::parse("implicit.wait=30");
    assert_eq!(config.implicit_wait, 30);

    let caps = Capabilities::from_config(&config).unwrap();
    Session::create(&server.url, &caps).await.unwrap();

    let timeouts: Vec<Value> = server
        .requests()
        .into_iter()
        .filter(|r| r.path == "/session/abc/timeouts")
        .map(|r| r.body)
        .collect();
    assert_eq!(timeouts, vec![json!({ "implicit": 0 })]);
}

#[tokio::test]
async fn android_settings_session_targets_settings_app() {
    let server = mock_appium(appium).await;
    let caps = android_caps().for_android_settings();

    Session::create(&server.url, &caps).await.unwrap();

    let create = server.find("POST", "/session").unwrap();
    let always = &create.body["capabilities"]["alwaysMatch"];
    assert_eq!(always["appium:appPackage"], "com.android.settings");
    assert_eq!(always["appium:appActivity"], "com.android.settings.Settings");
    assert_eq!(always["appium:noReset"], true);
    assert_eq!(always["appium:autoGrantPermissions"], true);
    assert!(always.get("appium:app").is_none());
}

#[tokio::test]
async fn server_path_prefix_is_kept() {
    let server = mock_appium(appium).await;
    let url = format!("{}/wd/hub", server.url);

    let session = Session::create(&url, &android_caps()).await.unwrap();
    session.quit().await;

    assert!(server.find("POST", "/wd/hub/session").is_some());
    assert!(server.find("DELETE", "/wd/hub/session/abc").is_some());
}

#[tokio::test]
async fn commands_hit_w3c_endpoints() {
    let server = mock_appium(appium).await;
    let session = Session::create(&server.url, &android_caps()).await.unwrap();
    let driver = session.driver();

    let found = driver.find_elements(&Locator::id("present-login")).await.unwrap();
    assert_eq!(found, vec![ElementHandle::new("el-1")]);
    assert!(driver
        .find_element(&Locator::accessibility_id("present"))
        .await
        .unwrap()
        .is_none());

    let el = ElementHandle::new("el-1");
    assert!(driver.is_displayed(&el).await.unwrap());
    assert!(!driver.is_enabled(&el).await.unwrap());
    driver.click(&el).await.unwrap();
    driver.send_keys(&el, "8278650784").await.unwrap();
    driver.activate_app("com.android.settings").await.unwrap();
    assert_eq!(driver.page_source().await.unwrap(), "<hierarchy rotation=\"0\"/>");

    let find = server.find("POST", "/session/abc/elements").unwrap();
    assert_eq!(find.body, json!({ "using": "id", "value": "present-login" }));
    let typed = server.find("POST", "/session/abc/element/el-1/value").unwrap();
    assert_eq!(typed.body, json!({ "text": "8278650784" }));
    let activate = server.find("POST", "/session/abc/appium/device/activate_app").unwrap();
    assert_eq!(activate.body["appId"], "com.android.settings");
    assert!(server.find("POST", "/session/abc/element/el-1/click").is_some());
}

#[tokio::test]
async fn stale_click_maps_to_stale_element() {
    let server = mock_appium(appium).await;
    let session = Session::create(&server.url, &android_caps()).await.unwrap();

    let err = session.driver().click(&ElementHandle::new("gone")).await.unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, DriverError::StaleElement(ref m) if m == "element is not attached"));
}

#[tokio::test]
async fn invalid_session_aborts_wait() {
    let server = mock_appium(|req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/session") => (200, json!({ "value": { "sessionId": "abc" } })),
        ("POST", "/session/abc/timeouts") => (200, json!({ "value": null })),
        _ => (404, w3c_error("invalid session id", "session abc was terminated")),
    })
    .await;
    let session = Session::create(&server.url, &android_caps()).await.unwrap();

    let err = LocatorResolver::new(session.driver())
        .resolve_one(&Locator::id("anything"), Condition::Presence, &WaitPolicy::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::Driver(DriverError::InvalidSession(_))));
    let finds = server
        .requests()
        .into_iter()
        .filter(|r| r.path.ends_with("/elements"))
        .count();
    assert_eq!(finds, 1);
}

#[tokio::test]
async fn settings_flow_over_http() {
    let server = mock_appium(|req| {
        if req.path == "/session/abc/elements" && req.body["value"] == "android:id/title" {
            return (200, json!({ "value": [{ W3C_ELEMENT_KEY: "el-1" }] }));
        }
        appium(req)
    })
    .await;
    let session = Session::create(&server.url, &android_caps()).await.unwrap();

    let result = FlowRunner::new(session.driver())
        .run(settings_launch_flow(Platform::Android))
        .await;
    session.quit().await;

    assert!(result.success, "failure: {:?}", result.failure);
    assert!(server.find("GET", "/session/abc/element/el-1/displayed").is_some());
    assert!(server.find("DELETE", "/session/abc").is_some());
}

#[tokio::test]
async fn rejected_session_is_setup_error() {
    let server = mock_appium(|_| {
        (500, w3c_error("session not created", "Could not find a connected Android device"))
    })
    .await;

    let err = Session::create(&server.url, &android_caps()).await.err().unwrap();
    assert!(matches!(err, SessionSetupError::Rejected(ref m) if m.contains("connected Android device")));
}

#[tokio::test]
async fn missing_session_id_is_malformed() {
    let server = mock_appium(|_| (200, json!({ "value": { "capabilities": {} } }))).await;

    let err = Session::create(&server.url, &android_caps()).await.err().unwrap();
    assert!(matches!(err, SessionSetupError::MalformedResponse(_)));
}

#[tokio::test]
async fn unreachable_server_is_setup_error() {
    let err = Session::create("http://127.0.0.1:1", &android_caps()).await.err().unwrap();
    assert!(matches!(err, SessionSetupError::Unreachable(_)), "got {err:?}");
}

#[tokio::test]
async fn implicit_wait_failure_is_not_fatal() {
    let server = mock_appium(|req| match req.path.as_str() {
        "/session" => (200, json!({ "value": { "sessionId": "abc" } })),
        _ => (400, w3c_error("invalid argument", "timeouts not supported")),
    })
    .await;

    let session = Session::create(&server.url, &android_caps()).await;
    assert!(session.is_ok());
}
