//! sensor-shell supervisor
//!
//! This crate provides everything the `sshell` binary runs:
//! - `registry` - fixed-capacity table of subscribed clients
//! - `channel` - the shared pipe agents report status on
//! - `supervisor` - spawning and signalling agent processes
//! - `control` - the event loop tying them together
//! - `audit` - the append-only session log
//! - `console` - the operator menu
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        sshell process                        │
//! │                                                              │
//! │  SIGINT ──▶ mpsc ─┐                                          │
//! │  SIGTERM ─▶ token ┼──▶ ┌──────────────┐ ──▶ ClientRegistry    │
//! │                   │    │ ControlLoop  │ ──▶ AuditLog          │
//! │  StatusChannel ───┘    └──────┬───────┘ ──▶ Console           │
//! │      ▲  (read end)            │                               │
//! │      │                        ▼                               │
//! │      │                ProcessSupervisor                       │
//! └──────┼────────────────────────┼──────────────────────────────┘
//!        │ StatusRecord           │ spawn / SIGUSR1
//!        │ (inherited write end)  ▼
//!   ┌────┴─────────────────────────────┐
//!   │  sensor-agent  sensor-agent  ... │
//!   └──────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Recoverable failures are reported to the operator, fatal ones end the
//!   session with a `ShellError`

pub mod audit;
pub mod channel;
pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod registry;
pub mod signals;
pub mod supervisor;

pub use audit::{AuditError, AuditLog};
pub use channel::{ChannelError, StatusChannel};
pub use config::{ConfigError, ConfigOverrides, ShellConfig};
pub use console::{Console, MenuCommand};
pub use control::{ControlLoop, LoopState};
pub use error::{ShellError, ShellResult};
pub use registry::{ClientRegistry, RegistryError, DEFAULT_CAPACITY, MAX_CAPACITY};
pub use signals::{ShellSignals, SignalSender};
pub use supervisor::{
    AgentInvocation, Launcher, ProcessSupervisor, SpawnedAgent, SupervisorError, SystemLauncher,
    TerminationReport,
};
