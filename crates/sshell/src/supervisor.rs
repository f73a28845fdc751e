//! Agent process spawning and termination.
//!
//! The supervisor never waits on its agents. Spawned children are detached
//! (their handle is dropped and tokio reaps them in the background) and
//! termination is a fire-and-forget `SIGUSR1`. Whether an agent is alive is
//! learned only from the status records it sends.

use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use sshell_core::{validate_address, validate_topic, ClientId, ClientRecord, DomainError};
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::ClientRegistry;

/// Errors from spawning or signalling agents. None of them are fatal.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The spawn request carried an invalid address or topic.
    #[error(transparent)]
    InvalidRequest(#[from] DomainError),

    /// The agent process could not be started.
    #[error("failed to spawn client {id}: {source}")]
    Spawn {
        id: ClientId,
        #[source]
        source: io::Error,
    },

    /// The termination signal could not be delivered.
    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// The selected slot holds no client.
    #[error("no client in slot {slot}")]
    EmptySlot { slot: usize },
}

/// Arguments an agent is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub id: ClientId,
    pub channel_handle: RawFd,
    pub ip: String,
    pub topic: String,
}

impl AgentInvocation {
    /// Command line: `-- <clientId> <channelHandle> <brokerIp> <topic>`.
    ///
    /// The `--` keeps a topic such as `-sensors/temp` from being parsed as
    /// an agent option.
    pub fn args(&self) -> [String; 5] {
        [
            "--".to_string(),
            self.id.to_string(),
            self.channel_handle.to_string(),
            self.ip.clone(),
            self.topic.clone(),
        ]
    }
}

/// Starts and signals agent processes.
pub trait Launcher {
    /// Starts a detached agent and returns its pid without waiting on it.
    fn spawn(&mut self, invocation: &AgentInvocation) -> io::Result<u32>;

    /// Asks the agent to disconnect and exit.
    fn signal(&self, pid: u32) -> io::Result<()>;
}

/// Launches the agent executable as a real child process.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    program: PathBuf,
}

impl SystemLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Launcher for SystemLauncher {
    fn spawn(&mut self, invocation: &AgentInvocation) -> io::Result<u32> {
        // Own process group: a console Ctrl-C must only reach the supervisor.
        let child = tokio::process::Command::new(&self.program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .process_group(0)
            .kill_on_drop(false)
            .spawn()?;

        child
            .id()
            .ok_or_else(|| io::Error::other("agent exited before its pid was read"))
    }

    fn signal(&self, pid: u32) -> io::Result<()> {
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        if pid <= 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to signal a process group",
            ));
        }
        // SAFETY: kill() has no memory-safety preconditions.
        if unsafe { libc::kill(pid, libc::SIGUSR1) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// A successfully started agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedAgent {
    pub id: ClientId,
    pub pid: u32,
}

/// Outcome of a terminate-all request.
#[derive(Debug, Default)]
pub struct TerminationReport {
    /// Clients the signal was delivered to
    pub signalled: Vec<(ClientId, u32)>,
    /// Delivery failures
    pub failed: Vec<SupervisorError>,
}

/// Spawns agents with consecutive ids and sends them termination signals.
#[derive(Debug)]
pub struct ProcessSupervisor<L = SystemLauncher> {
    launcher: L,
    channel_handle: RawFd,
    next_id: ClientId,
    shutting_down: bool,
}

impl<L: Launcher> ProcessSupervisor<L> {
    /// Creates a supervisor handing `channel_handle` to every agent.
    pub fn new(launcher: L, channel_handle: RawFd) -> Self {
        Self {
            launcher,
            channel_handle,
            next_id: ClientId::default(),
            shutting_down: false,
        }
    }

    /// Starts a new agent for `ip`/`topic`.
    ///
    /// The agent is not registered here; it becomes a registry entry only
    /// once it reports `SubSuccess`. If the launch fails, the id is kept for
    /// the next attempt since no agent ever saw it.
    pub fn spawn_client(&mut self, ip: &str, topic: &str) -> Result<SpawnedAgent, SupervisorError> {
        validate_address(ip)?;
        validate_topic(topic)?;

        let invocation = AgentInvocation {
            id: self.next_id,
            channel_handle: self.channel_handle,
            ip: ip.to_string(),
            topic: topic.to_string(),
        };

        match self.launcher.spawn(&invocation) {
            Ok(pid) => {
                self.next_id = self.next_id.next();
                info!(client = %invocation.id, pid, ip, topic, "Agent spawned");
                Ok(SpawnedAgent {
                    id: invocation.id,
                    pid,
                })
            }
            Err(source) => {
                warn!(client = %invocation.id, error = %source, "Agent spawn failed");
                Err(SupervisorError::Spawn {
                    id: invocation.id,
                    source,
                })
            }
        }
    }

    /// Signals every registered client and enters shutdown.
    ///
    /// Returns immediately; each entry leaves the registry only when its
    /// agent reports a disconnect.
    pub fn terminate_all(&mut self, registry: &ClientRegistry) -> TerminationReport {
        self.shutting_down = true;
        let mut report = TerminationReport::default();

        for (_, record) in registry.list() {
            match self.terminate_pid(record.pid) {
                Ok(()) => report.signalled.push((record.id, record.pid)),
                Err(e) => report.failed.push(e),
            }
        }

        info!(
            signalled = report.signalled.len(),
            failed = report.failed.len(),
            "Termination requested for all clients"
        );
        report
    }

    /// Signals the client in `slot`.
    pub fn terminate_one(
        &self,
        registry: &ClientRegistry,
        slot: usize,
    ) -> Result<ClientRecord, SupervisorError> {
        let record = registry
            .get(slot)
            .ok_or(SupervisorError::EmptySlot { slot })?;
        self.terminate_pid(record.pid)?;
        Ok(record.clone())
    }

    /// Signals a single process.
    pub fn terminate_pid(&self, pid: u32) -> Result<(), SupervisorError> {
        self.launcher.signal(pid).map_err(|source| {
            warn!(pid, error = %source, "Failed to deliver termination signal");
            SupervisorError::Signal { pid, source }
        })?;
        info!(pid, "Termination signal sent");
        Ok(())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// The id the next spawned agent will get.
    pub fn next_id(&self) -> ClientId {
        self.next_id
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }
}

#[cfg(test)]
mod tests {
    use sshell_core::ClientStatus;

    use super::*;

    #[derive(Default)]
    struct StubLauncher {
        next_pid: u32,
        fail_spawn: bool,
        spawned: Vec<AgentInvocation>,
        signalled: std::cell::RefCell<Vec<u32>>,
    }

    impl Launcher for StubLauncher {
        fn spawn(&mut self, invocation: &AgentInvocation) -> io::Result<u32> {
            if self.fail_spawn {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
            }
            self.spawned.push(invocation.clone());
            self.next_pid += 1;
            Ok(1000 + self.next_pid)
        }

        fn signal(&self, pid: u32) -> io::Result<()> {
            if pid == 666 {
                return Err(io::Error::from_raw_os_error(libc::ESRCH));
            }
            self.signalled.borrow_mut().push(pid);
            Ok(())
        }
    }

    fn registered(pids: &[u32]) -> ClientRegistry {
        let mut registry = ClientRegistry::default();
        for (i, pid) in pids.iter().enumerate() {
            let record = ClientRecord::new(
                ClientId::new(i as i32),
                *pid,
                ClientStatus::SubSuccess,
                "10.0.0.1",
                "t",
            );
            registry.insert(record).unwrap();
        }
        registry
    }

    #[test]
    fn test_invocation_args() {
        let invocation = AgentInvocation {
            id: ClientId::new(3),
            channel_handle: 5,
            ip: "192.168.1.10".into(),
            topic: "sensors/temp".into(),
        };
        assert_eq!(
            invocation.args(),
            ["--", "3", "5", "192.168.1.10", "sensors/temp"]
        );
    }

    #[test]
    fn test_invocation_args_end_options_before_topic() {
        let invocation = AgentInvocation {
            id: ClientId::new(0),
            channel_handle: 4,
            ip: "10.0.0.1".into(),
            topic: "--help".into(),
        };
        let args = invocation.args();
        let separator = args.iter().position(|a| a == "--");
        let topic = args.iter().rposition(|a| a == "--help");
        assert_eq!(separator, Some(0));
        assert_eq!(topic, Some(4));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut supervisor = ProcessSupervisor::new(StubLauncher::default(), 9);
        let a = supervisor.spawn_client("10.0.0.1", "a").unwrap();
        let b = supervisor.spawn_client("10.0.0.1", "b").unwrap();
        assert_eq!(a.id, ClientId::new(0));
        assert_eq!(b.id, ClientId::new(1));
        assert_eq!(supervisor.launcher().spawned[1].channel_handle, 9);
    }

    #[test]
    fn test_failed_spawn_keeps_id() {
        let launcher = StubLauncher {
            fail_spawn: true,
            ..Default::default()
        };
        let mut supervisor = ProcessSupervisor::new(launcher, 9);
        let err = supervisor.spawn_client("10.0.0.1", "a").unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { id, .. } if id == ClientId::new(0)));
        assert_eq!(supervisor.next_id(), ClientId::new(0));
    }

    #[test]
    fn test_spawn_rejects_invalid_request() {
        let mut supervisor = ProcessSupervisor::new(StubLauncher::default(), 9);
        assert!(matches!(
            supervisor.spawn_client("1.1.1", "a"),
            Err(SupervisorError::InvalidRequest(_))
        ));
        assert!(supervisor.launcher().spawned.is_empty());
    }

    #[test]
    fn test_terminate_all_signals_every_client() {
        let registry = registered(&[10, 666, 12]);
        let mut supervisor = ProcessSupervisor::new(StubLauncher::default(), 9);

        let report = supervisor.terminate_all(&registry);

        assert!(supervisor.is_shutting_down());
        assert_eq!(*supervisor.launcher().signalled.borrow(), vec![10, 12]);
        assert_eq!(report.signalled.len(), 2);
        assert_eq!(report.failed.len(), 1);
        // terminate_all never touches the registry
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_terminate_one() {
        let registry = registered(&[10, 11]);
        let supervisor = ProcessSupervisor::new(StubLauncher::default(), 9);

        let record = supervisor.terminate_one(&registry, 1).unwrap();
        assert_eq!(record.pid, 11);
        assert!(matches!(
            supervisor.terminate_one(&registry, 4),
            Err(SupervisorError::EmptySlot { slot: 4 })
        ));
        assert_eq!(*supervisor.launcher().signalled.borrow(), vec![11]);
    }
}
