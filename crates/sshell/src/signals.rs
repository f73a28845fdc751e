//! Process signal plumbing for the supervisor.
//!
//! Signal handlers do nothing but notify: SIGINT queues a menu request on an
//! `mpsc` channel and SIGTERM cancels a [`CancellationToken`]. The control
//! loop awaits both in the same `select!` as the status channel, so a
//! signal arriving while it waits for a record is never missed.

use std::io;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Menu requests arriving while one is still pending are coalesced.
const MENU_QUEUE: usize = 1;

/// Receiving side, owned by the control loop.
#[derive(Debug)]
pub struct ShellSignals {
    /// One message per operator menu request
    pub menu: mpsc::Receiver<()>,
    /// Cancelled when a graceful shutdown is requested from outside
    pub terminate: CancellationToken,
}

/// Sending side, held by the signal listeners (or by tests).
#[derive(Debug, Clone)]
pub struct SignalSender {
    menu: mpsc::Sender<()>,
    terminate: CancellationToken,
}

impl SignalSender {
    /// Queues a menu request unless one is already pending.
    pub fn request_menu(&self) {
        if self.menu.try_send(()).is_err() {
            debug!("Menu request already pending");
        }
    }

    pub fn request_termination(&self) {
        self.terminate.cancel();
    }
}

impl ShellSignals {
    /// Creates a connected sender/receiver pair without touching OS signals.
    pub fn pair() -> (SignalSender, ShellSignals) {
        let (menu_tx, menu_rx) = mpsc::channel(MENU_QUEUE);
        let terminate = CancellationToken::new();
        (
            SignalSender {
                menu: menu_tx,
                terminate: terminate.clone(),
            },
            ShellSignals {
                menu: menu_rx,
                terminate,
            },
        )
    }

    /// Installs SIGINT and SIGTERM listeners.
    ///
    /// Must be called from within a tokio runtime. Installing the SIGINT
    /// listener replaces the default terminate-on-Ctrl-C behaviour for the
    /// rest of the process lifetime.
    pub fn install() -> io::Result<Self> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let (sender, signals) = Self::pair();

        let menu_sender = sender.clone();
        tokio::spawn(async move {
            while interrupt.recv().await.is_some() {
                debug!("SIGINT received");
                menu_sender.request_menu();
            }
        });

        tokio::spawn(async move {
            if terminate.recv().await.is_some() {
                info!("SIGTERM received, shutting down");
                sender.request_termination();
            }
        });

        Ok(signals)
    }
}
