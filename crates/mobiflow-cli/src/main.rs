//! CLI runner for mobiflow journeys against an Appium server.
//!
//! Each flow command loads the configuration, opens a session, runs one
//! journey, deletes the session and prints the flow result.
//!
//! # Usage
//!
//! ```bash
//! # Log in with the default OTP and PIN
//! mobiflow login --phone 8278650784
//!
//! # Custom OTP and PIN, JSON result
//! mobiflow --format json login --phone 8278650784 --otp 1234 --pin 9999
//!
//! # Check that the platform Settings app launches
//! mobiflow settings
//! mobiflow settings --platform ios
//!
//! # Check that Android Settings owns the page source
//! mobiflow settings --source
//!
//! # Sign out from the home screen
//! mobiflow logout
//!
//! # Show the effective configuration
//! mobiflow --config qa.properties config
//!
//! # Point at another server
//! mobiflow --server http://10.0.0.2:4723 login --phone 8278650784
//! ```
//!
//! Exit codes: 0 success, 1 flow failed, 2 session setup failed, 3 output error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mobiflow_core::capabilities::{Capabilities, Platform};
use mobiflow_core::config::{AppConfig, DEFAULT_CONFIG_FILE};
use mobiflow_core::flow::{Flow, FlowResult, FlowRunner, StepOutcome};
use mobiflow_core::journeys::{
    login_flow, logout_flow, settings_launch_flow, settings_source_check, LoginCredentials,
};
use mobiflow_core::session::{Session, SessionSetupError};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run mobile UI journeys through an Appium server.
#[derive(Parser)]
#[command(name = "mobiflow")]
#[command(about = "Run login and settings journeys against an Appium server")]
#[command(version)]
struct Cli {
    /// Properties file with server and capability settings
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "MOBIFLOW_CONFIG")]
    config: PathBuf,

    /// Override `appium.server.url`
    #[arg(short, long, env = "MOBIFLOW_SERVER")]
    server: Option<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Log progress at info level (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum PlatformArg {
    Android,
    Ios,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Android => Platform::Android,
            PlatformArg::Ios => Platform::Ios,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Log in from app launch to the home screen
    Login {
        /// Phone number to sign in with
        #[arg(short, long)]
        phone: String,
        /// One-time code (default 0000)
        #[arg(long)]
        otp: Option<String>,
        /// PIN (default 2580)
        #[arg(long)]
        pin: Option<String>,
    },

    /// Launch the platform Settings app and check its root screen
    Settings {
        /// Override `platform.name`
        #[arg(short, long)]
        platform: Option<PlatformArg>,
        /// Check the page source for the Settings package instead (Android only)
        #[arg(long)]
        source: bool,
    },

    /// Sign out from the home screen
    Logout,

    /// Print the effective configuration
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    FlowFailed(String),
    Setup(String),
    Output(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::FlowFailed(_) => ExitCode::from(1),
            CliError::Setup(_) => ExitCode::from(2),
            CliError::Output(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::FlowFailed(msg) => write!(f, "Flow failed: {}", msg),
            CliError::Setup(msg) => write!(f, "Session setup failed: {}", msg),
            CliError::Output(msg) => write!(f, "Output error: {}", msg),
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = AppConfig::load(&cli.config);
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }

    let setup = |e: SessionSetupError| CliError::Setup(e.to_string());
    let (caps, flow) = match cli.command {
        Command::Config => return print_config(&config, cli.format),
        Command::Login { phone, otp, pin } => {
            let credentials = LoginCredentials::new(phone)
                .with_otp(otp.as_deref())
                .with_pin(pin.as_deref());
            let flow = login_flow(&credentials, &config.app_package).with_policy(config.explicit_wait_policy());
            (Capabilities::from_config(&config).map_err(setup)?, flow)
        }
        Command::Settings { platform, source } => {
            if let Some(arg) = platform {
                config.platform_name = Platform::from(arg).to_string();
            }
            let caps = Capabilities::from_config(&config).map_err(setup)?;
            match (caps.platform, source) {
                (Platform::Android, false) => (caps.for_android_settings(), settings_launch_flow(Platform::Android)),
                (Platform::Android, true) => (caps.for_android_settings(), settings_source_check()),
                (Platform::Ios, false) => (caps, settings_launch_flow(Platform::Ios)),
                (Platform::Ios, true) => {
                    return Err(CliError::Setup("--source is only supported on Android".to_string()))
                }
            }
        }
        Command::Logout => {
            let flow = logout_flow().with_policy(config.explicit_wait_policy());
            (Capabilities::from_config(&config).map_err(setup)?, flow)
        }
    };

    let result = run_flow(&config.server_url, &caps, flow).await?;
    print_result(&result, cli.format)?;

    match &result.failure {
        None => Ok(()),
        Some(failure) => Err(CliError::FlowFailed(format!("{}: {}", failure.at, failure.cause))),
    }
}

async fn run_flow(server_url: &str, caps: &Capabilities, flow: Flow) -> Result<FlowResult, CliError> {
    let session = Session::create(server_url, caps)
        .await
        .map_err(|e| CliError::Setup(e.to_string()))?;
    info!(session_id = session.session_id(), flow = %flow.name, "running flow");

    let result = FlowRunner::new(session.driver()).run(flow).await;
    session.quit().await;
    Ok(result)
}

fn print_result(result: &FlowResult, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(result).map_err(|e| CliError::Output(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let verdict = if result.success { "PASSED" } else { "FAILED" };
            println!("{} {} ({})", result.flow, verdict, result.run_id);
            for step in &result.steps {
                let outcome = match &step.outcome {
                    StepOutcome::Completed => "ok".to_string(),
                    StepOutcome::Skipped(reason) => format!("skipped: {}", reason),
                    StepOutcome::Failed(reason) => format!("FAILED: {}", reason),
                };
                println!(
                    "  [{:>2}] {:<24} {:>6}ms  {}",
                    step.index,
                    step.name,
                    step.elapsed.as_millis(),
                    outcome
                );
            }
            if let Some(failure) = &result.failure {
                println!("failed at {}: {}", failure.at, failure.cause);
            }
            println!("elapsed: {} ms", result.elapsed.as_millis());
        }
    }
    Ok(())
}

fn print_config(config: &AppConfig, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(config).map_err(|e| CliError::Output(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let rows: [(&str, String); 13] = [
                ("appium.server.url", config.server_url.clone()),
                ("platform.name", config.platform_name.clone()),
                ("automation.name", config.automation_name.clone()),
                ("device.name", config.device_name.clone()),
                ("app.path", config.app_path.clone()),
                ("app.package", config.app_package.clone()),
                ("app.activity", config.app_activity.clone()),
                ("bundle.id", config.bundle_id.clone()),
                ("implicit.wait", config.implicit_wait.to_string()),
                ("explicit.wait", config.explicit_wait.to_string()),
                ("auto.grant.permissions", config.auto_grant_permissions.to_string()),
                ("no.reset", config.no_reset.to_string()),
                ("new.command.timeout", config.new_command_timeout.to_string()),
            ];
            for (key, value) in rows {
                println!("{}={}", key, value);
            }
        }
    }
    Ok(())
}
