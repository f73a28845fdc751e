//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Broker address failed validation
    #[error("Invalid address {value:?}: {reason}")]
    InvalidAddress { value: String, reason: String },

    /// Topic failed validation
    #[error("Invalid topic {value:?}: {reason}")]
    InvalidTopic { value: String, reason: String },

    /// Status code outside the known range
    #[error("Unknown status code: {code}")]
    UnknownStatus { code: i32 },
}

impl DomainError {
    pub(crate) fn address(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn topic(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTopic {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
