//! The supervisor's control loop.
//!
//! The loop owns the registry, the status channel, the process supervisor,
//! the console and the audit log. It is the only place any of them change.
//!
//! # State Machine
//!
//! ```text
//!  ┌─────────┐  menu "terminate" / SIGTERM  ┌─────────────┐  registry empty  ┌─────────┐
//!  │ Running │─────────────────────────────▶│ Terminating │─────────────────▶│ Stopped │
//!  └─────────┘                              └─────────────┘                  └─────────┘
//! ```
//!
//! # One Step
//!
//! Each [`ControlLoop::step`] waits on a single biased `select!`:
//!
//! 1. SIGTERM token (only while `Running`)
//! 2. a menu request (only while `Running`)
//! 3. the next status record
//!
//! Records are applied to the registry strictly in arrival order. Every
//! record produces exactly one audit line, echoed to the console, whether or
//! not it changed the registry.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Recoverable conditions are reported to the operator and the loop goes on
//! - Only `ShellError` ends the loop

use std::io::Write;

use sshell_core::{ClientRecord, ClientStatus};
use sshell_protocol::StatusRecord;
use tokio::io::AsyncBufRead;
use tracing::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::channel::{ChannelError, StatusChannel};
use crate::console::{Console, MenuCommand};
use crate::error::{ShellError, ShellResult};
use crate::registry::ClientRegistry;
use crate::signals::ShellSignals;
use crate::supervisor::{Launcher, ProcessSupervisor};

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Accepting operator requests
    Running,
    /// All clients signalled; waiting for them to report disconnect
    Terminating,
    /// Every client is gone
    Stopped,
}

/// What woke the loop up.
enum Wakeup {
    Terminate,
    Menu,
    Record(Result<StatusRecord, ChannelError>),
}

/// The supervisor's single-threaded event loop.
pub struct ControlLoop<L, R, W, A> {
    registry: ClientRegistry,
    channel: StatusChannel,
    supervisor: ProcessSupervisor<L>,
    console: Console<R, W>,
    audit: AuditLog<A>,
    signals: ShellSignals,
    state: LoopState,
}

impl<L, R, W, A> ControlLoop<L, R, W, A>
where
    L: Launcher,
    R: AsyncBufRead + Unpin,
    W: Write,
    A: Write,
{
    /// Assembles a loop whose agents write to `channel`.
    ///
    /// # Errors
    ///
    /// `ChannelError::Closed` if the channel's write end was already dropped.
    pub fn new(
        registry: ClientRegistry,
        channel: StatusChannel,
        launcher: L,
        console: Console<R, W>,
        audit: AuditLog<A>,
        signals: ShellSignals,
    ) -> Result<Self, ChannelError> {
        let handle = channel.write_handle().ok_or(ChannelError::Closed)?;
        Ok(Self {
            registry,
            channel,
            supervisor: ProcessSupervisor::new(launcher, handle),
            console,
            audit,
            signals,
            state: LoopState::Running,
        })
    }

    /// Runs a whole session.
    ///
    /// Writes the session start line, steps until `Stopped` and writes the
    /// session end line. On a fatal error the remaining clients are signalled
    /// and an aborted line is attempted before the error is returned.
    pub async fn run(&mut self) -> ShellResult<()> {
        self.audit.session_started()?;
        info!(capacity = self.registry.capacity(), "Shell session started");

        loop {
            match self.step().await {
                Ok(LoopState::Stopped) => break,
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Control loop failed");
                    self.abort(&e);
                    return Err(e);
                }
            }
        }

        self.audit.session_ended()?;
        info!("Shell session ended");
        Ok(())
    }

    /// Performs one wait-and-handle cycle and returns the resulting state.
    pub async fn step(&mut self) -> ShellResult<LoopState> {
        if self.settle() == LoopState::Stopped {
            return Ok(LoopState::Stopped);
        }

        let running = self.state == LoopState::Running;
        let wakeup = tokio::select! {
            biased;

            _ = self.signals.terminate.cancelled(), if running => Wakeup::Terminate,
            Some(()) = self.signals.menu.recv(), if running => Wakeup::Menu,
            result = self.channel.receive() => Wakeup::Record(result),
        };

        match wakeup {
            Wakeup::Terminate => {
                info!("Termination requested by signal");
                self.terminate_all()?;
            }
            Wakeup::Menu => self.handle_request().await?,
            Wakeup::Record(Ok(record)) => self.ingest(record)?,
            Wakeup::Record(Err(e)) if !e.is_fatal() => {
                warn!(error = %e, "Discarding status record");
                self.console.say(&format!("warning: {e}"))?;
            }
            Wakeup::Record(Err(e)) => return Err(e.into()),
        }

        Ok(self.settle())
    }

    /// Moves `Terminating` to `Stopped` once the registry has drained.
    fn settle(&mut self) -> LoopState {
        if self.state == LoopState::Terminating && self.registry.is_empty() {
            info!("All clients disconnected");
            self.state = LoopState::Stopped;
        }
        self.state
    }

    /// Shows the menu and carries out the chosen command.
    pub async fn handle_request(&mut self) -> ShellResult<()> {
        let Some(command) = self.console.read_command().await? else {
            debug!("Menu request abandoned");
            return Ok(());
        };
        debug!(?command, "Menu command");

        match command {
            MenuCommand::Terminate => self.terminate_all()?,
            MenuCommand::Connect => self.connect().await?,
            MenuCommand::Disconnect => self.disconnect().await?,
            MenuCommand::List => self.console.show_clients(&self.registry)?,
            MenuCommand::Close => {}
        }
        Ok(())
    }

    async fn connect(&mut self) -> ShellResult<()> {
        if self.registry.is_full() {
            self.console.say("no more room for clients, list is full")?;
            return Ok(());
        }
        let Some(ip) = self.console.prompt_address().await? else {
            return Ok(());
        };
        let Some(topic) = self.console.prompt_topic().await? else {
            return Ok(());
        };

        match self.supervisor.spawn_client(&ip, &topic) {
            Ok(agent) => self
                .console
                .say(&format!("starting client {}({})", agent.id, agent.pid))?,
            Err(e) => self.console.say(&format!("error: {e}"))?,
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> ShellResult<()> {
        if self.registry.is_empty() {
            self.console.say("no connected clients to disconnect")?;
            return Ok(());
        }
        let Some(slot) = self.console.prompt_slot(&self.registry).await? else {
            return Ok(());
        };

        match self.supervisor.terminate_one(&self.registry, slot) {
            Ok(record) => self
                .console
                .say(&format!("sending signal to client {}({})", record.id, record.pid))?,
            Err(e) => self.console.say(&format!("error: {e}"))?,
        }
        Ok(())
    }

    /// Signals every registered client and enters `Terminating`.
    pub fn terminate_all(&mut self) -> ShellResult<()> {
        let report = self.supervisor.terminate_all(&self.registry);
        self.state = LoopState::Terminating;

        for (id, pid) in &report.signalled {
            self.console
                .say(&format!("sending signal to client {id}({pid})"))?;
        }
        for failure in &report.failed {
            self.console.say(&format!("error: {failure}"))?;
        }
        Ok(())
    }

    /// Applies one status record.
    ///
    /// - `SubSuccess` registers the client (or refreshes an existing entry)
    /// - `DisconnectSuccess` and `ConnLost` free the client's slot
    /// - anything else only updates the stored status
    ///
    /// An agent that subscribes while the registry is full cannot be tracked
    /// and is told to leave. One that subscribes after termination began is
    /// registered and signalled at once, so shutdown still drains.
    pub fn ingest(&mut self, mut record: StatusRecord) -> ShellResult<()> {
        let status = record.status();
        let pid = record.pid();
        let mut notice = None;

        if status.registers() {
            notice = self.register(&mut record);
        } else if status.deregisters() {
            match self.registry.remove_by_pid(pid) {
                Some(removed) => debug!(client = %removed.id, pid, ?status, "Client deregistered"),
                None => debug!(pid, ?status, "Untracked client left"),
            }
        } else {
            self.registry.update_status(pid, status);
        }

        let line = self.audit.record(&record)?;
        self.console.say(&line)?;
        if let Some(notice) = notice {
            self.console.say(&notice)?;
        }
        Ok(())
    }

    /// Registers a subscribed client. Returns a message for the operator if
    /// the client had to be turned away.
    fn register(&mut self, record: &mut StatusRecord) -> Option<String> {
        let pid = record.pid();
        if self.registry.update_status(pid, ClientStatus::SubSuccess) {
            debug!(pid, "Client already registered");
            return None;
        }

        let client = ClientRecord::new(
            record.id(),
            pid,
            ClientStatus::SubSuccess,
            record.ip(),
            record.topic(),
        );

        match self.registry.insert(client) {
            Ok(slot) => {
                record.set_slot(Some(slot));
                info!(client = %record.id(), pid, slot, "Client registered");
                if self.state != LoopState::Running {
                    // Subscribed after terminate-all went out; ask it to leave too.
                    let _ = self.supervisor.terminate_pid(pid);
                }
                None
            }
            Err(e) => {
                warn!(client = %record.id(), pid, error = %e, "Client rejected");
                let _ = self.supervisor.terminate_pid(pid);
                Some(format!(
                    "warning: {e}; stopping client {}({pid})",
                    record.id()
                ))
            }
        }
    }

    /// Best-effort cleanup after a fatal error.
    fn abort(&mut self, cause: &ShellError) {
        let _ = self.supervisor.terminate_all(&self.registry);
        self.state = LoopState::Stopped;
        if matches!(cause, ShellError::Audit(_)) {
            return;
        }
        if let Err(e) = self.audit.session_aborted(&cause.to_string()) {
            warn!(error = %e, "Failed to record session abort");
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn supervisor(&self) -> &ProcessSupervisor<L> {
        &self.supervisor
    }

    pub fn console(&self) -> &Console<R, W> {
        &self.console
    }

    pub fn audit(&self) -> &AuditLog<A> {
        &self.audit
    }

    pub fn channel(&self) -> &StatusChannel {
        &self.channel
    }
}
