//! Top-level supervisor errors.
//!
//! Everything that reaches this type stops the control loop. Recoverable
//! conditions (a full registry, a failed spawn, an undecodable record) are
//! reported to the operator where they happen and never become a
//! `ShellError`.

use std::io;

use thiserror::Error;

use crate::audit::AuditError;
use crate::channel::ChannelError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Operator console input or output failed.
    #[error("console I/O failed: {0}")]
    Console(#[from] io::Error),
}

pub type ShellResult<T> = Result<T, ShellError>;
