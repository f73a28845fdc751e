//! The shared status channel.
//!
//! A single OS pipe carries [`StatusRecord`]s from every agent to the
//! supervisor. The write end is left inheritable so each spawned agent gets
//! a copy (its descriptor number travels as the agent's `channelHandle`
//! argument); the read end is close-on-exec and registered with the tokio
//! reactor, and only the control loop reads from it.
//!
//! Records are read one fixed-size chunk at a time. A short read is not
//! reassembled: it means the framing is lost, and is reported as a fatal
//! [`ChannelError::ShortRecord`].

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use sshell_protocol::{ProtocolError, StatusRecord, StatusWriter, RECORD_SIZE};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tracing::{debug, trace};

/// Errors raised by the status channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The pipe could not be created or registered.
    #[error("failed to set up status channel: {0}")]
    Setup(#[source] io::Error),

    /// Zero bytes read: every write end is closed.
    #[error("status channel closed: no writers left")]
    Closed,

    /// A read failed with something other than an interruption.
    #[error("status channel read failed: {0}")]
    Io(#[source] io::Error),

    /// Fewer bytes than one record arrived in a single read.
    #[error("short status record: got {got} of {RECORD_SIZE} bytes")]
    ShortRecord {
        /// Bytes actually read
        got: usize,
    },

    /// A whole record arrived but its contents are invalid.
    #[error("invalid status record: {0}")]
    Decode(#[source] ProtocolError),
}

impl ChannelError {
    /// Returns true if the supervisor cannot keep reading after this error.
    ///
    /// Only an undecodable whole record leaves the framing intact.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}

/// Supervisor side of the status pipe.
#[derive(Debug)]
pub struct StatusChannel {
    receiver: pipe::Receiver,
    write_end: Option<OwnedFd>,
}

impl StatusChannel {
    /// Creates the pipe.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open() -> Result<Self, ChannelError> {
        let mut fds: [RawFd; 2] = [-1; 2];
        // SAFETY: `fds` has room for the two descriptors pipe() writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(ChannelError::Setup(io::Error::last_os_error()));
        }
        let [read_fd, write_fd] = fds;
        // SAFETY: pipe() succeeded, so both descriptors are open and owned here.
        let (read_end, write_end) =
            unsafe { (OwnedFd::from_raw_fd(read_fd), OwnedFd::from_raw_fd(write_fd)) };

        set_inheritable(&read_end, false).map_err(ChannelError::Setup)?;
        set_inheritable(&write_end, true).map_err(ChannelError::Setup)?;

        let receiver =
            pipe::Receiver::from_file(File::from(read_end)).map_err(ChannelError::Setup)?;

        debug!(write_handle = write_fd, "Status channel opened");
        Ok(Self {
            receiver,
            write_end: Some(write_end),
        })
    }

    /// Descriptor number agents inherit and write to.
    ///
    /// `None` once [`close_write_end`](Self::close_write_end) has been called.
    pub fn write_handle(&self) -> Option<RawFd> {
        self.write_end.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// A writer on a private duplicate of the write end.
    pub fn writer(&self) -> io::Result<StatusWriter<File>> {
        let fd = self
            .write_end
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "write end closed"))?
            .try_clone()?;
        Ok(StatusWriter::new(File::from(fd)))
    }

    /// Drops the supervisor's own copy of the write end.
    ///
    /// After this, [`receive`](Self::receive) reports `Closed` once every
    /// agent holding a copy has exited.
    pub fn close_write_end(&mut self) {
        self.write_end = None;
    }

    /// Waits for and decodes exactly one record.
    ///
    /// Cancel-safe: the only await point is a single read, so dropping the
    /// future before it completes consumes nothing.
    pub async fn receive(&mut self) -> Result<StatusRecord, ChannelError> {
        let mut buf = [0u8; RECORD_SIZE];
        let got = loop {
            match self.receiver.read(&mut buf).await {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    trace!("Status channel read interrupted, retrying");
                }
                Err(e) => return Err(ChannelError::Io(e)),
            }
        };

        match got {
            0 => Err(ChannelError::Closed),
            n if n < RECORD_SIZE => Err(ChannelError::ShortRecord { got: n }),
            _ => StatusRecord::decode(&buf).map_err(ChannelError::Decode),
        }
    }
}

/// Sets or clears close-on-exec.
fn set_inheritable(fd: &OwnedFd, inheritable: bool) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: F_GETFD/F_SETFD only touch the flags of a descriptor we own.
    unsafe {
        let flags = libc::fcntl(raw, libc::F_GETFD);
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        let flags = if inheritable {
            flags & !libc::FD_CLOEXEC
        } else {
            flags | libc::FD_CLOEXEC
        };
        if libc::fcntl(raw, libc::F_SETFD, flags) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloexec(fd: RawFd) -> bool {
        // SAFETY: test-only flag query on an open descriptor.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        flags & libc::FD_CLOEXEC != 0
    }

    #[tokio::test]
    async fn test_write_end_is_inheritable() {
        let channel = StatusChannel::open().unwrap();
        let handle = channel.write_handle().unwrap();
        assert!(!cloexec(handle));
        assert!(cloexec(channel.receiver.as_raw_fd()));
    }

    #[test]
    fn test_only_decode_errors_are_recoverable() {
        assert!(ChannelError::Closed.is_fatal());
        assert!(ChannelError::ShortRecord { got: 3 }.is_fatal());
        assert!(!ChannelError::Decode(ProtocolError::NegativePid(-1)).is_fatal());
    }
}
