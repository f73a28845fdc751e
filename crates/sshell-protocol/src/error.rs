//! Protocol errors.

use std::io;

use sshell_core::DomainError;
use thiserror::Error;

/// Errors raised while building, encoding, decoding or sending records.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A buffer did not hold exactly one record.
    #[error("record must be {expected} bytes, got {actual}")]
    WrongSize { expected: usize, actual: usize },

    /// The status field carried an unknown code.
    #[error("invalid status field: {0}")]
    Status(#[from] DomainError),

    /// A text field does not fit its fixed width.
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A process id does not fit the signed wire field.
    #[error("pid {0} does not fit the wire format")]
    PidOutOfRange(u32),

    /// A decoded record carried a negative pid.
    #[error("negative pid {0} in record")]
    NegativePid(i32),

    /// The inherited channel handle is not an open descriptor.
    #[error("channel handle {0} is not an open descriptor")]
    BadHandle(i32),

    /// Writing to the channel failed.
    #[error("failed to write status record: {0}")]
    Io(#[from] io::Error),
}
