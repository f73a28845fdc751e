//! Lifecycle status reported by sensor agents.

use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Status an agent reports at each lifecycle transition.
///
/// The discriminants are the wire codes and must not be reordered.
/// Statuses only move forward for a given agent; any failure or
/// lost-connection status means the agent is about to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ClientStatus {
    /// Agent started, nothing reported yet
    #[default]
    Initial = 0,

    /// Broker client instance created
    CreateSuccess = 1,

    /// Broker client instance could not be created
    CreateFailure = 2,

    /// Connected to the broker
    ConnSuccess = 3,

    /// Broker refused or could not be reached
    ConnFailure = 4,

    /// Disconnected on request
    DisconnectSuccess = 5,

    /// Connection dropped after it was established
    ConnLost = 6,

    /// Subscribed to the topic
    SubSuccess = 7,

    /// Subscription rejected
    SubFailure = 8,

    /// A sample arrived on the topic
    DataReady = 9,

    /// A message arrived without payload
    DataMissing = 10,
}

impl ClientStatus {
    /// All statuses in wire-code order.
    pub const ALL: [ClientStatus; 11] = [
        Self::Initial,
        Self::CreateSuccess,
        Self::CreateFailure,
        Self::ConnSuccess,
        Self::ConnFailure,
        Self::DisconnectSuccess,
        Self::ConnLost,
        Self::SubSuccess,
        Self::SubFailure,
        Self::DataReady,
        Self::DataMissing,
    ];

    /// Returns the wire code for this status.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Parses a wire code.
    pub fn from_code(code: i32) -> DomainResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.code() == code)
            .ok_or(DomainError::UnknownStatus { code })
    }

    /// Returns true for statuses after which the agent exits with failure.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::CreateFailure | Self::ConnFailure | Self::SubFailure | Self::ConnLost
        )
    }

    /// Returns true if the agent exits after reporting this status.
    pub fn is_terminal(self) -> bool {
        self.is_failure() || self == Self::DisconnectSuccess
    }

    /// Returns true if this status creates a registry entry.
    pub fn registers(self) -> bool {
        self == Self::SubSuccess
    }

    /// Returns true if this status removes a registry entry.
    pub fn deregisters(self) -> bool {
        matches!(self, Self::DisconnectSuccess | Self::ConnLost)
    }

    /// Short label for listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::CreateSuccess => "created",
            Self::CreateFailure => "create-failed",
            Self::ConnSuccess => "connected",
            Self::ConnFailure => "connect-failed",
            Self::DisconnectSuccess => "disconnected",
            Self::ConnLost => "lost",
            Self::SubSuccess => "subscribed",
            Self::SubFailure => "subscribe-failed",
            Self::DataReady => "data",
            Self::DataMissing => "no-data",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<i32> for ClientStatus {
    type Error = DomainError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}
