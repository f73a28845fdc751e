//! Sensor shell - interactive supervisor for MQTT sensor agents
//!
//! Starts agents on request, tracks them in a fixed-size registry and
//! appends every status change they report to an audit log.
//!
//! # Usage
//!
//! ```text
//! sshell                         # defaults: ./log.txt, 5 clients
//! sshell --capacity 8            # larger registry
//! sshell --config shell.toml     # settings from a TOML file
//! ```
//!
//! Press Ctrl+C for the menu. SIGTERM shuts the shell down after every
//! agent has reported its disconnect.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sshell::{
    AuditLog, ClientRegistry, ConfigOverrides, Console, ControlLoop, ShellConfig, ShellSignals,
    StatusChannel, SystemLauncher,
};

// ============================================================================
// CLI Arguments
// ============================================================================

/// Sensor shell - supervise MQTT sensor agents
#[derive(Parser, Debug)]
#[command(name = "sshell", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Agent executable to spawn
    #[arg(long)]
    agent: Option<PathBuf>,

    /// Audit log to append status changes to
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Diagnostics log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Maximum number of concurrent agents
    #[arg(long)]
    capacity: Option<usize>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            agent_program: self.agent.clone(),
            audit_log: self.audit_log.clone(),
            diagnostics_log: self.log_file.clone(),
            capacity: self.capacity,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Opens the diagnostics log. Stdout belongs to the console, so tracing
/// goes to a file or nowhere.
fn create_log_file(path: &Path) -> Option<fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Warning: Failed to create log directory {dir:?}: {e}");
            return None;
        }
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {path:?}: {e}");
            None
        }
    }
}

fn init_tracing(path: &Path) -> Result<()> {
    match create_log_file(path) {
        Some(file) => {
            let filter = EnvFilter::from_default_env()
                .add_directive("sshell=info".parse()?)
                .add_directive("sshell_core=info".parse()?)
                .add_directive("sshell_protocol=info".parse()?);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("off"))
                .init();
        }
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ShellConfig::load(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;

    init_tracing(&config.diagnostics_log)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        agent = %config.agent_program.display(),
        audit_log = %config.audit_log.display(),
        capacity = config.capacity,
        "Sensor shell starting"
    );

    let channel = StatusChannel::open().context("Failed to create status channel")?;
    let signals = ShellSignals::install().context("Failed to install signal handlers")?;
    let audit = AuditLog::open(&config.audit_log).context("Failed to open audit log")?;
    let registry = ClientRegistry::new(config.capacity).context("Invalid registry capacity")?;
    let console = Console::new(BufReader::new(tokio::io::stdin()), io::stdout());
    let launcher = SystemLauncher::new(config.agent_program.clone());

    let mut control = ControlLoop::new(registry, channel, launcher, console, audit, signals)
        .context("Failed to start control loop")?;

    println!("sensor shell ready, press Ctrl+C for the menu");

    if let Err(e) = control.run().await {
        error!(error = %e, "Sensor shell aborted");
        return Err(e).context("Shell session aborted");
    }

    info!("Sensor shell stopped");
    Ok(())
}
