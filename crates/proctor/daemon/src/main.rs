//! Proctor Daemon - Runs one monitored exam session
//!
//! The daemon:
//! - acquires the camera, microphone and lockdown
//! - runs face, object and audio detection on their cadences
//! - asks for the proctor passphrase when the warning limit is reached or the
//!   session is ended with Ctrl+C
//! - prints the session report as JSON when the session ends

use clap::Parser;
use proctor_daemon::{build_supervisor, DaemonError, DaemonResult, ProctorConfig};
use proctor_session::PolicyProfile;
use proctor_supervisor::SessionController;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Proctor Daemon CLI
#[derive(Parser)]
#[command(name = "proctord")]
#[command(about = "Proctor Daemon - Monitored exam session", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PROCTOR_CONFIG")]
    config: Option<String>,

    /// Policy profile (strict, standard, practice)
    #[arg(short, long, env = "PROCTOR_PROFILE")]
    profile: Option<String>,

    /// Warnings before termination is requested
    #[arg(long)]
    max_violations: Option<u32>,

    /// Minimum seconds between counted warnings
    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Simulate losing the camera after this many frames
    #[arg(long)]
    camera_fail_after: Option<u64>,

    /// Seed for the simulated devices and models
    #[arg(long)]
    seed: Option<u64>,

    /// Violation journal path
    #[arg(long, env = "PROCTOR_JOURNAL")]
    journal: Option<String>,

    /// Log lockdown commands instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, env = "PROCTOR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "PROCTOR_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // Load configuration
    let mut config = ProctorConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(profile) = &cli.profile {
        let profile = profile
            .parse::<PolicyProfile>()
            .map_err(|e| DaemonError::Config(format!("{}", e)))?;
        config.set_profile(profile);
    }
    if let Some(max) = cli.max_violations {
        config.session.policy.max_violations = max;
    }
    if let Some(secs) = cli.cooldown_secs {
        config.session.policy.cooldown_secs = secs;
    }
    if let Some(frames) = cli.camera_fail_after {
        config.simulation.camera_fail_after = Some(frames);
    }
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(path) = cli.journal {
        config.journal.path = path.into();
    }
    if cli.dry_run {
        config.processes.dry_run = true;
    }

    let supervisor = build_supervisor(&config)?;

    // Print startup banner
    println!(
        r#"
  Proctor - Exam Session Monitor
  Version: {}
  Session: {}
  Warnings allowed: {} (cooldown {}s)
"#,
        env!("CARGO_PKG_VERSION"),
        supervisor.session_id(),
        config.session.policy.max_violations,
        config.session.policy.cooldown_secs,
    );

    let handle = supervisor.start().await?;
    tokio::spawn(forward_interrupts(handle.controller()));

    let report = handle.wait().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Turn Ctrl+C into termination requests until the session ends.
async fn forward_interrupts(controller: SessionController) {
    while !controller.phase().is_terminal() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received Ctrl+C, requesting termination");
        controller.request_termination().await;
    }
}
