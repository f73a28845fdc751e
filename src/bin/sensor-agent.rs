//! Sensor agent - one MQTT subscription reporting to the sensor shell
//!
//! Started by `sshell`, never by hand. The supervisor passes the agent's id,
//! the inherited status channel descriptor, the broker address and the topic.
//!
//! # Usage
//!
//! ```text
//! sensor-agent <client-id> <channel-handle> <broker-ip> <topic> [--port 1883]
//! ```
//!
//! SIGUSR1 asks the agent to unsubscribe and disconnect. SIGINT is ignored
//! so a Ctrl+C at the shell's console only reaches the shell.

use std::io;
use std::process::{self, ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use sensor_agent::{AgentArgs, AgentError, AgentExit, BrokerSession};
use sshell_protocol::StatusWriter;

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sensor_agent=warn".parse()?))
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
    Ok(())
}

/// Cancels `stop` on SIGUSR1 and drains SIGINT.
fn listen_for_signals(stop: CancellationToken) -> io::Result<()> {
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        if usr1.recv().await.is_some() {
            info!("Received SIGUSR1");
            stop.cancel();
        }
    });
    tokio::spawn(async move {
        while interrupt.recv().await.is_some() {
            debug!("SIGINT ignored");
        }
    });
    Ok(())
}

fn run(args: AgentArgs) -> Result<AgentExit> {
    let writer = StatusWriter::from_handle(args.channel_handle)
        .map_err(AgentError::from)
        .context("Failed to adopt status channel")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AgentError::Setup)
        .context("Failed to build runtime")?;

    runtime.block_on(async move {
        let stop = CancellationToken::new();
        listen_for_signals(stop.clone())
            .map_err(AgentError::Setup)
            .context("Failed to install signal handlers")?;

        let mut session = BrokerSession::new(args, process::id(), writer)?;
        let exit = session.run(stop).await?;
        Ok(exit)
    })
}

fn main() -> ExitCode {
    let args = AgentArgs::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }

    info!(
        client = args.client_id,
        pid = process::id(),
        broker = %args.broker_ip,
        topic = %args.topic,
        "Sensor agent starting"
    );

    match run(args) {
        Ok(exit) => {
            info!(?exit, "Sensor agent stopped");
            ExitCode::from(exit.code())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Sensor agent failed");
            ExitCode::from(AgentExit::Failure.code())
        }
    }
}
