//! The fixed-layout status record.

use std::borrow::Cow;

use bytes::{Buf, BufMut};
use sshell_core::{ClientId, ClientStatus};

use crate::error::ProtocolError;

/// Width of the data field.
pub const DATA_LEN: usize = 5;

/// Width of the ip field.
pub const IP_LEN: usize = 15;

/// Width of the topic field.
pub const TOPIC_LEN: usize = 20;

/// Total encoded size of one record.
pub const RECORD_SIZE: usize = 4 + 4 + DATA_LEN + 4 + IP_LEN + TOPIC_LEN + 4 + 4;

/// POSIX minimum for atomic pipe writes (`_POSIX_PIPE_BUF`).
pub const PIPE_BUF_MIN: usize = 512;

// Concurrent writers rely on each record landing in one atomic write.
const _: () = assert!(RECORD_SIZE <= PIPE_BUF_MIN);

const NO_SLOT: i32 = -1;

/// One lifecycle report from an agent.
///
/// Text fields are stored at their fixed wire width, NUL padded. A value
/// that fills the whole width carries no terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    id: ClientId,
    pid: u32,
    data: [u8; DATA_LEN],
    status: ClientStatus,
    ip: [u8; IP_LEN],
    topic: [u8; TOPIC_LEN],
    channel_handle: i32,
    slot: i32,
}

impl StatusRecord {
    /// Creates an `Initial` record with empty data and no slot.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FieldTooLong` if `ip` or `topic` exceeds its width
    /// - `ProtocolError::PidOutOfRange` if `pid` does not fit an `i32`
    pub fn new(
        id: ClientId,
        pid: u32,
        channel_handle: i32,
        ip: &str,
        topic: &str,
    ) -> Result<Self, ProtocolError> {
        if i32::try_from(pid).is_err() {
            return Err(ProtocolError::PidOutOfRange(pid));
        }
        Ok(Self {
            id,
            pid,
            data: [0; DATA_LEN],
            status: ClientStatus::Initial,
            ip: pack("ip", ip)?,
            topic: pack("topic", topic)?,
            channel_handle,
            slot: NO_SLOT,
        })
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    pub fn channel_handle(&self) -> i32 {
        self.channel_handle
    }

    /// Broker address, up to the first NUL.
    pub fn ip(&self) -> Cow<'_, str> {
        unpack(&self.ip)
    }

    /// Subscription topic, up to the first NUL.
    pub fn topic(&self) -> Cow<'_, str> {
        unpack(&self.topic)
    }

    /// Sample bytes, up to the first NUL.
    pub fn data(&self) -> &[u8] {
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(DATA_LEN);
        self.data.get(..end).unwrap_or_default()
    }

    /// Sample as text, lossily decoded.
    pub fn data_lossy(&self) -> Cow<'_, str> {
        unpack(&self.data)
    }

    /// Registry slot, if the supervisor has stamped one.
    pub fn slot(&self) -> Option<usize> {
        usize::try_from(self.slot).ok()
    }

    pub fn set_status(&mut self, status: ClientStatus) {
        self.status = status;
    }

    /// Stores a sample, truncated to [`DATA_LEN`] bytes.
    ///
    /// Returns `true` if the payload had to be truncated.
    pub fn set_data(&mut self, payload: &[u8]) -> bool {
        self.data = [0; DATA_LEN];
        let len = payload.len().min(DATA_LEN);
        for (dst, src) in self.data.iter_mut().zip(payload.iter().take(len)) {
            *dst = *src;
        }
        payload.len() > DATA_LEN
    }

    pub fn set_slot(&mut self, slot: Option<usize>) {
        self.slot = slot
            .and_then(|s| i32::try_from(s).ok())
            .unwrap_or(NO_SLOT);
    }

    /// Encodes the record into its wire form.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        let mut buf = &mut out[..];
        buf.put_i32_le(self.id.get());
        // pid was range-checked on construction and decode
        buf.put_i32_le(i32::try_from(self.pid).unwrap_or(i32::MAX));
        buf.put_slice(&self.data);
        buf.put_i32_le(self.status.code());
        buf.put_slice(&self.ip);
        buf.put_slice(&self.topic);
        buf.put_i32_le(self.channel_handle);
        buf.put_i32_le(self.slot);
        out
    }

    /// Decodes one record from exactly [`RECORD_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::WrongSize` if `bytes` is not one record long
    /// - `ProtocolError::Status` for an unknown status code
    /// - `ProtocolError::NegativePid` for a negative pid
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != RECORD_SIZE {
            return Err(ProtocolError::WrongSize {
                expected: RECORD_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = bytes;
        let id = ClientId::new(buf.get_i32_le());
        let raw_pid = buf.get_i32_le();
        let mut data = [0u8; DATA_LEN];
        buf.copy_to_slice(&mut data);
        let status = ClientStatus::from_code(buf.get_i32_le())?;
        let mut ip = [0u8; IP_LEN];
        buf.copy_to_slice(&mut ip);
        let mut topic = [0u8; TOPIC_LEN];
        buf.copy_to_slice(&mut topic);
        let channel_handle = buf.get_i32_le();
        let slot = buf.get_i32_le();

        let pid = u32::try_from(raw_pid).map_err(|_| ProtocolError::NegativePid(raw_pid))?;

        Ok(Self {
            id,
            pid,
            data,
            status,
            ip,
            topic,
            channel_handle,
            slot,
        })
    }
}

fn pack<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], ProtocolError> {
    let bytes = value.as_bytes();
    if bytes.len() > N {
        return Err(ProtocolError::FieldTooLong {
            field,
            len: bytes.len(),
            max: N,
        });
    }
    let mut out = [0u8; N];
    for (dst, src) in out.iter_mut().zip(bytes) {
        *dst = *src;
    }
    Ok(out)
}

fn unpack(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(bytes.get(..end).unwrap_or_default())
}
