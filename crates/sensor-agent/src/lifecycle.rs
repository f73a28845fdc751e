//! The agent's lifecycle as a pure state machine.
//!
//! Broker traffic is reduced to [`BrokerEvent`]s; each event yields at most
//! one status record to report and a [`Next`] instruction for the driver.
//! Keeping this free of I/O lets every transition be tested without a
//! broker.
//!
//! ```text
//!  Starting ─created─▶ Created ─connack ok─▶ Connected ─suback ok─▶ Subscribed
//!     │                   │                     │                      │ ▲
//!  create failed     refused/error        rejected/error            message
//!     ▼                   ▼                     ▼                      │ │
//!  Finished ◀───────────────────── any terminal status ◀──────────────┘─┘
//! ```
//!
//! Phases only move forward. Once a terminal status has been produced the
//! machine is `Finished` and ignores everything.

use sshell_core::ClientStatus;
use sshell_protocol::StatusRecord;
use tracing::debug;

/// Broker-side happenings the agent reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Connection acknowledgement; `accepted` is false for a refusal
    ConnAck { accepted: bool },
    /// Subscription acknowledgement
    SubAck { granted: bool },
    /// The subscribe request could not be queued
    SubscribeFailed,
    /// A message on the subscribed topic
    Message { payload: Vec<u8> },
    /// Our own disconnect went out
    DisconnectSent,
    /// The connection failed or dropped
    ConnectionError,
}

/// How the agent process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentExit {
    /// Disconnected on request
    Success,
    /// Stopped by a failure status
    Failure,
}

impl AgentExit {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

/// What the driver should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Continue,
    /// Issue the subscribe request
    Subscribe,
    Exit(AgentExit),
}

/// Result of feeding one input to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Record to send to the supervisor, if the status changed
    pub report: Option<StatusRecord>,
    pub next: Next,
}

impl Outcome {
    fn ignored() -> Self {
        Self {
            report: None,
            next: Next::Continue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Starting,
    Created,
    Connected,
    Subscribed,
    Finished,
}

/// Tracks one agent from creation to exit.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: Phase,
    record: StatusRecord,
}

impl Lifecycle {
    /// Starts from the agent's identity record.
    pub fn new(record: StatusRecord) -> Self {
        Self {
            phase: Phase::Starting,
            record,
        }
    }

    /// The broker client instance exists.
    pub fn created(&mut self) -> Outcome {
        if self.phase != Phase::Starting {
            return Outcome::ignored();
        }
        self.advance(Phase::Created, ClientStatus::CreateSuccess, Next::Continue)
    }

    /// The broker client instance could not be made.
    pub fn create_failed(&mut self) -> Outcome {
        if self.phase != Phase::Starting {
            return Outcome::ignored();
        }
        self.finish(ClientStatus::CreateFailure, AgentExit::Failure)
    }

    /// Applies one broker event.
    pub fn on_event(&mut self, event: BrokerEvent) -> Outcome {
        use BrokerEvent as E;
        use Phase as P;

        match (self.phase, event) {
            (P::Finished | P::Starting, _) => Outcome::ignored(),

            (_, E::DisconnectSent) => {
                self.finish(ClientStatus::DisconnectSuccess, AgentExit::Success)
            }

            (P::Created, E::ConnAck { accepted: true }) => {
                self.advance(P::Connected, ClientStatus::ConnSuccess, Next::Subscribe)
            }
            (P::Created, E::ConnAck { accepted: false } | E::ConnectionError) => {
                self.finish(ClientStatus::ConnFailure, AgentExit::Failure)
            }

            (P::Connected, E::SubAck { granted: true }) => {
                self.advance(P::Subscribed, ClientStatus::SubSuccess, Next::Continue)
            }
            (P::Connected, E::SubAck { granted: false } | E::SubscribeFailed) => {
                self.finish(ClientStatus::SubFailure, AgentExit::Failure)
            }

            (P::Connected | P::Subscribed, E::ConnectionError) => {
                self.finish(ClientStatus::ConnLost, AgentExit::Failure)
            }

            (P::Subscribed, E::Message { payload }) => {
                let status = if payload.is_empty() {
                    ClientStatus::DataMissing
                } else {
                    if self.record.set_data(&payload) {
                        debug!(len = payload.len(), "Payload truncated");
                    }
                    ClientStatus::DataReady
                };
                self.report(status, Next::Continue)
            }

            (phase, event) => {
                debug!(?phase, ?event, "Event ignored");
                Outcome::ignored()
            }
        }
    }

    /// True once the broker accepted the connection and before exit.
    pub fn is_connected(&self) -> bool {
        matches!(self.phase, Phase::Connected | Phase::Subscribed)
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// The last status reported.
    pub fn status(&self) -> ClientStatus {
        self.record.status()
    }

    fn advance(&mut self, phase: Phase, status: ClientStatus, next: Next) -> Outcome {
        self.phase = phase;
        self.report(status, next)
    }

    fn finish(&mut self, status: ClientStatus, exit: AgentExit) -> Outcome {
        self.phase = Phase::Finished;
        self.report(status, Next::Exit(exit))
    }

    fn report(&mut self, status: ClientStatus, next: Next) -> Outcome {
        self.record.set_status(status);
        Outcome {
            report: Some(self.record.clone()),
            next,
        }
    }
}

#[cfg(test)]
mod tests {
    use sshell_core::ClientId;

    use super::*;

    fn lifecycle() -> Lifecycle {
        let record =
            StatusRecord::new(ClientId::new(4), 777, 9, "10.0.0.1", "sensors/temp").unwrap();
        Lifecycle::new(record)
    }

    fn status(outcome: &Outcome) -> Option<ClientStatus> {
        outcome.report.as_ref().map(StatusRecord::status)
    }

    fn subscribed() -> Lifecycle {
        let mut lc = lifecycle();
        lc.created();
        lc.on_event(BrokerEvent::ConnAck { accepted: true });
        lc.on_event(BrokerEvent::SubAck { granted: true });
        lc
    }

    #[test]
    fn test_happy_path() {
        let mut lc = lifecycle();

        let out = lc.created();
        assert_eq!(status(&out), Some(ClientStatus::CreateSuccess));
        assert_eq!(out.next, Next::Continue);

        let out = lc.on_event(BrokerEvent::ConnAck { accepted: true });
        assert_eq!(status(&out), Some(ClientStatus::ConnSuccess));
        assert_eq!(out.next, Next::Subscribe);

        let out = lc.on_event(BrokerEvent::SubAck { granted: true });
        assert_eq!(status(&out), Some(ClientStatus::SubSuccess));
        assert!(lc.is_connected());

        let out = lc.on_event(BrokerEvent::DisconnectSent);
        assert_eq!(status(&out), Some(ClientStatus::DisconnectSuccess));
        assert_eq!(out.next, Next::Exit(AgentExit::Success));
        assert!(lc.is_finished());
    }

    #[test]
    fn test_reports_carry_identity() {
        let mut lc = lifecycle();
        let report = lc.created().report.unwrap();
        assert_eq!(report.id(), ClientId::new(4));
        assert_eq!(report.pid(), 777);
        assert_eq!(report.channel_handle(), 9);
        assert_eq!(report.topic(), "sensors/temp");
    }

    #[test]
    fn test_create_failure() {
        let mut lc = lifecycle();
        let out = lc.create_failed();
        assert_eq!(status(&out), Some(ClientStatus::CreateFailure));
        assert_eq!(out.next, Next::Exit(AgentExit::Failure));
        assert_eq!(lc.created(), Outcome::ignored());
    }

    #[test]
    fn test_connection_refused() {
        let mut lc = lifecycle();
        lc.created();
        let out = lc.on_event(BrokerEvent::ConnAck { accepted: false });
        assert_eq!(status(&out), Some(ClientStatus::ConnFailure));
        assert_eq!(out.next, Next::Exit(AgentExit::Failure));
    }

    #[test]
    fn test_unreachable_broker() {
        let mut lc = lifecycle();
        lc.created();
        let out = lc.on_event(BrokerEvent::ConnectionError);
        assert_eq!(status(&out), Some(ClientStatus::ConnFailure));
    }

    #[test]
    fn test_subscription_rejected() {
        let mut lc = lifecycle();
        lc.created();
        lc.on_event(BrokerEvent::ConnAck { accepted: true });
        let out = lc.on_event(BrokerEvent::SubAck { granted: false });
        assert_eq!(status(&out), Some(ClientStatus::SubFailure));
        assert_eq!(out.next, Next::Exit(AgentExit::Failure));
    }

    #[test]
    fn test_messages() {
        let mut lc = subscribed();

        let out = lc.on_event(BrokerEvent::Message {
            payload: b"21.5C and more".to_vec(),
        });
        let report = out.report.unwrap();
        assert_eq!(report.status(), ClientStatus::DataReady);
        assert_eq!(report.data(), b"21.5C");

        let out = lc.on_event(BrokerEvent::Message { payload: vec![] });
        assert_eq!(status(&out), Some(ClientStatus::DataMissing));
        assert_eq!(out.next, Next::Continue);
    }

    #[test]
    fn test_connection_lost_after_subscribe() {
        let mut lc = subscribed();
        let out = lc.on_event(BrokerEvent::ConnectionError);
        assert_eq!(status(&out), Some(ClientStatus::ConnLost));
        assert_eq!(out.next, Next::Exit(AgentExit::Failure));
    }

    #[test]
    fn test_nothing_after_terminal_status() {
        let mut lc = subscribed();
        lc.on_event(BrokerEvent::ConnectionError);

        for event in [
            BrokerEvent::ConnAck { accepted: true },
            BrokerEvent::Message { payload: b"x".to_vec() },
            BrokerEvent::DisconnectSent,
        ] {
            assert_eq!(lc.on_event(event), Outcome::ignored());
        }
        assert_eq!(lc.status(), ClientStatus::ConnLost);
    }

    #[test]
    fn test_statuses_never_go_back() {
        let mut lc = subscribed();
        assert_eq!(
            lc.on_event(BrokerEvent::ConnAck { accepted: true }),
            Outcome::ignored()
        );
        assert_eq!(lc.status(), ClientStatus::SubSuccess);
    }

    #[test]
    fn test_events_before_creation_ignored() {
        let mut lc = lifecycle();
        assert_eq!(
            lc.on_event(BrokerEvent::ConnAck { accepted: true }),
            Outcome::ignored()
        );
    }
}
