//! # mobiflow-core
//!
//! Core library for driving mobile apps through an Appium (W3C WebDriver)
//! server.
//!
//! This crate provides the synchronization and flow-orchestration engine:
//! bounded polling of the remote UI tree, locator resolution with ordered
//! fallback, wait-then-act primitives, and a flow runner that reduces a
//! multi-step journey to a single pass/fail result.
//!
//! ## Modules
//!
//! - [`wait`] - Bounded-time condition polling
//! - [`resolver`] - Locator chain resolution with fallback
//! - [`interact`] - Wait-then-click, wait-then-type and friends
//! - [`flow`] - Flow orchestration and results
//! - [`journeys`] - Built-in login, settings and logout flows
//! - [`driver`] - The [`AutomationDriver`](driver::AutomationDriver) trait
//! - [`appium`] - HTTP backend for that trait
//! - [`session`] - Remote session lifecycle
//! - [`config`], [`capabilities`] - Run configuration and session capabilities
//! - [`locator`], [`element`], [`step`], [`error`] - Data model
//!
//! ## Example
//!
//! ```no_run
//! use mobiflow_core::capabilities::{Capabilities, Platform};
//! use mobiflow_core::config::AppConfig;
//! use mobiflow_core::flow::FlowRunner;
//! use mobiflow_core::journeys::settings_launch_flow;
//! use mobiflow_core::session::Session;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("config.properties");
//! let session = Session::create(&config.server_url, &Capabilities::from_config(&config)?).await?;
//!
//! let result = FlowRunner::new(session.driver())
//!     .run(settings_launch_flow(Platform::Android))
//!     .await;
//! println!("{}: {:?} in {}ms", result.flow, result.state, result.elapsed.as_millis());
//!
//! session.quit().await;
//! # Ok(())
//! # }
//! ```

pub mod appium;
pub mod capabilities;
pub mod config;
pub mod driver;
pub mod element;
pub mod error;
pub mod flow;
pub mod interact;
pub mod journeys;
pub mod locator;
pub mod resolver;
pub mod session;
pub mod step;
pub mod wait;
