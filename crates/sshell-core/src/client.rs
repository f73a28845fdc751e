//! Client identity and the supervisor's view of a registered agent.

use std::fmt;

use crate::status::ClientStatus;

/// Supervisor-assigned client identifier.
///
/// Ids are handed out in increasing order by the supervisor and are never
/// given to two agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClientId(i32);

impl ClientId {
    /// Creates a client id from its raw value.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw value (the wire representation).
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Returns the id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ClientId {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

/// A registered agent as tracked by the supervisor.
///
/// Created from the agent's first `SubSuccess` report. `slot` is stamped by
/// the registry on insertion and is `None` until then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// Supervisor-assigned id
    pub id: ClientId,

    /// Process id of the owning agent
    pub pid: u32,

    /// Most recent status reported by the agent
    pub last_status: ClientStatus,

    /// Broker address the agent is connected to
    pub ip: String,

    /// Topic the agent is subscribed to
    pub topic: String,

    /// Registry slot holding this record
    pub slot: Option<usize>,
}

impl ClientRecord {
    /// Creates an unslotted record.
    pub fn new(
        id: ClientId,
        pid: u32,
        last_status: ClientStatus,
        ip: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            id,
            pid,
            last_status,
            ip: ip.into(),
            topic: topic.into(),
            slot: None,
        }
    }
}

impl fmt::Display for ClientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client {}({})", self.id, self.pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_next() {
        let id = ClientId::new(3);
        assert_eq!(id.next(), ClientId::new(4));
        assert_eq!(ClientId::new(i32::MAX).next(), ClientId::new(i32::MIN));
    }

    #[test]
    fn test_record_starts_unslotted() {
        let record = ClientRecord::new(
            ClientId::new(1),
            4000,
            ClientStatus::SubSuccess,
            "10.0.0.1",
            "sensors/temp",
        );
        assert_eq!(record.slot, None);
        assert_eq!(record.to_string(), "client 1(4000)");
    }
}
