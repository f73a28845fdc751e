//! sensor-agent
//!
//! One agent process subscribes to one topic on one MQTT broker and reports
//! each step of its lifecycle to the sensor-shell supervisor over the
//! inherited status channel:
//! - `args` - the command line the supervisor builds
//! - `lifecycle` - the forward-only status state machine
//! - `broker` - the `rumqttc` driver feeding it
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Broker failures become status records, never panics
//! - Only a failed status write aborts the agent early

pub mod args;
pub mod broker;
pub mod error;
pub mod lifecycle;

pub use args::{AgentArgs, DEFAULT_KEEP_ALIVE, DEFAULT_PORT};
pub use broker::BrokerSession;
pub use error::AgentError;
pub use lifecycle::{AgentExit, BrokerEvent, Lifecycle, Next, Outcome};
