//! sshell Core - Shared types for sensor agent supervision
//!
//! This crate provides the domain types shared between the supervisor
//! (`sshell`), the wire protocol (`sshell-protocol`) and the agent
//! (`sensor-agent`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod client;
pub mod error;
pub mod status;
pub mod validate;

// Re-exports for convenience
pub use client::{ClientId, ClientRecord};
pub use error::{DomainError, DomainResult};
pub use status::ClientStatus;
pub use validate::{validate_address, validate_topic, IP_ADDR_MAX_LEN, TOPIC_MAX_LEN};
