//! Agent-side sender for status records.

use std::fs::File;
use std::io::Write;
use std::os::fd::{FromRawFd, RawFd};

use crate::error::ProtocolError;
use crate::record::StatusRecord;

/// Writes whole status records to the shared channel.
///
/// Each record is handed to the kernel in a single `write`; records are
/// small enough (see [`crate::PIPE_BUF_MIN`]) that the pipe never splits
/// or interleaves them with other writers.
#[derive(Debug)]
pub struct StatusWriter<W = File> {
    inner: W,
}

impl StatusWriter<File> {
    /// Adopts the channel descriptor inherited from the supervisor.
    ///
    /// # Errors
    ///
    /// `ProtocolError::BadHandle` if `handle` is not an open descriptor.
    pub fn from_handle(handle: RawFd) -> Result<Self, ProtocolError> {
        if handle < 0 {
            return Err(ProtocolError::BadHandle(handle));
        }
        // SAFETY: F_GETFD only reads descriptor flags.
        let flags = unsafe { libc::fcntl(handle, libc::F_GETFD) };
        if flags == -1 {
            return Err(ProtocolError::BadHandle(handle));
        }
        // SAFETY: the descriptor is open and was passed to this process to be
        // owned as its status channel; nothing else in the process uses it.
        let file = unsafe { File::from_raw_fd(handle) };
        Ok(Self::new(file))
    }
}

impl<W: Write> StatusWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Sends one record.
    pub fn send(&mut self, record: &StatusRecord) -> Result<(), ProtocolError> {
        self.inner.write_all(&record.encode())?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use sshell_core::{ClientId, ClientStatus};

    use super::*;
    use crate::record::RECORD_SIZE;

    #[test]
    fn test_send_writes_whole_records() {
        let mut writer = StatusWriter::new(Vec::new());
        let mut record =
            StatusRecord::new(ClientId::new(1), 99, 4, "127.0.0.1", "a/b").unwrap();

        writer.send(&record).unwrap();
        record.set_status(ClientStatus::CreateSuccess);
        writer.send(&record).unwrap();

        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 2 * RECORD_SIZE);
        let second = StatusRecord::decode(&bytes[RECORD_SIZE..]).unwrap();
        assert_eq!(second.status(), ClientStatus::CreateSuccess);
    }

    #[test]
    fn test_from_handle_rejects_closed_descriptor() {
        assert!(matches!(
            StatusWriter::from_handle(-1),
            Err(ProtocolError::BadHandle(-1))
        ));
        // Far above any descriptor a test process has open.
        assert!(matches!(
            StatusWriter::from_handle(987_654),
            Err(ProtocolError::BadHandle(987_654))
        ));
    }
}
