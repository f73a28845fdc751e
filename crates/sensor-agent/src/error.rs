//! Agent error types.

use std::io;

use sshell_core::DomainError;
use sshell_protocol::ProtocolError;
use thiserror::Error;

/// Errors that end an agent with exit code 1.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Broker address or topic rejected before connecting.
    #[error("invalid arguments: {0}")]
    InvalidArgs(#[from] DomainError),

    /// The status channel could not be adopted or written.
    #[error("status channel failed: {0}")]
    Channel(#[from] ProtocolError),

    /// Signal handlers or the runtime could not be set up.
    #[error("agent setup failed: {0}")]
    Setup(#[source] io::Error),
}
