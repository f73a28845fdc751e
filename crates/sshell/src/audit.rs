//! Append-only audit log of client lifecycle events.
//!
//! One line per status record, bracketed by session start and end lines.
//! The log is opened once and never rotated. Unlike diagnostics, losing an
//! audit line is not tolerated: every write failure is returned to the
//! caller as [`AuditError`].

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sshell_core::ClientStatus;
use sshell_protocol::StatusRecord;
use thiserror::Error;

/// Session line timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%F %T";

/// Errors from the audit log. All of them are fatal to the supervisor.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to open audit log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write audit log: {0}")]
    Write(#[from] io::Error),
}

/// Renders the audit line for one status record, without a newline.
pub fn describe(record: &StatusRecord) -> String {
    let who = format!("client {}({})", record.id(), record.pid());
    match record.status() {
        ClientStatus::Initial => format!("{who} initialized"),
        ClientStatus::CreateSuccess => format!("{who} created"),
        ClientStatus::CreateFailure => format!("{who} unable to be created"),
        ClientStatus::ConnSuccess => format!("{who} connected to {}", record.ip()),
        ClientStatus::ConnFailure => format!("{who} unable to connect to {}", record.ip()),
        ClientStatus::SubSuccess => format!("{who} subscribed to topic {}", record.topic()),
        ClientStatus::SubFailure => {
            format!("{who} unable to subscribe to topic {}", record.topic())
        }
        ClientStatus::ConnLost => format!("{who} lost connection to {}", record.ip()),
        ClientStatus::DisconnectSuccess => format!("{who} disconnected"),
        ClientStatus::DataReady => format!("{who} data received: {}", record.data_lossy()),
        ClientStatus::DataMissing => format!("{who} is not receiving any data"),
    }
}

/// The audit sink.
#[derive(Debug)]
pub struct AuditLog<W = File> {
    sink: W,
}

impl AuditLog<File> {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(file))
    }
}

impl<W: Write> AuditLog<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn session_started(&mut self) -> Result<(), AuditError> {
        self.session_started_at(Local::now())
    }

    /// Writes the session start line, preceded by a blank separator line.
    pub fn session_started_at(&mut self, at: DateTime<Local>) -> Result<(), AuditError> {
        self.write_line(&format!("\nshell session started {}", at.format(TIMESTAMP_FORMAT)))
    }

    pub fn session_ended(&mut self) -> Result<(), AuditError> {
        self.session_ended_at(Local::now())
    }

    pub fn session_ended_at(&mut self, at: DateTime<Local>) -> Result<(), AuditError> {
        self.write_line(&format!("shell session ended {}", at.format(TIMESTAMP_FORMAT)))
    }

    /// Marks a session that stopped on a fatal error.
    pub fn session_aborted(&mut self, reason: &str) -> Result<(), AuditError> {
        self.write_line(&format!(
            "shell session aborted {}: {reason}",
            Local::now().format(TIMESTAMP_FORMAT)
        ))
    }

    /// Appends the line for `record` and returns it for echoing.
    pub fn record(&mut self, record: &StatusRecord) -> Result<String, AuditError> {
        let line = describe(record);
        self.write_line(&line)?;
        Ok(line)
    }

    fn write_line(&mut self, line: &str) -> Result<(), AuditError> {
        writeln!(self.sink, "{line}")?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
