//! Drives a broker connection through the agent lifecycle.
//!
//! A single loop polls the `rumqttc` event loop and the stop token. Broker
//! traffic is translated into [`BrokerEvent`]s for the [`Lifecycle`], and
//! every resulting status record is written to the supervisor's channel
//! before the loop goes on. A stop request (SIGUSR1) unsubscribes and
//! disconnects from inside this loop, never from the signal handler.

use std::io::Write;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use sshell_protocol::{StatusRecord, StatusWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::args::AgentArgs;
use crate::error::AgentError;
use crate::lifecycle::{AgentExit, BrokerEvent, Lifecycle, Next, Outcome};

/// Requests queued towards the broker client.
const REQUEST_CAPACITY: usize = 10;

/// One agent run against one broker.
pub struct BrokerSession<W: Write> {
    args: AgentArgs,
    pid: u32,
    lifecycle: Lifecycle,
    writer: StatusWriter<W>,
}

impl<W: Write> BrokerSession<W> {
    /// Prepares a session reporting as `pid` through `writer`.
    pub fn new(args: AgentArgs, pid: u32, writer: StatusWriter<W>) -> Result<Self, AgentError> {
        // Invalid ip/topic still need a record to carry CreateFailure.
        let handle = args.channel_handle;
        let identity = StatusRecord::new(args.id(), pid, handle, &args.broker_ip, &args.topic)
            .or_else(|_| StatusRecord::new(args.id(), pid, handle, "", ""))?;
        Ok(Self {
            args,
            pid,
            lifecycle: Lifecycle::new(identity),
            writer,
        })
    }

    /// Runs until the lifecycle ends.
    ///
    /// # Errors
    ///
    /// Only a failed status write is an error; broker failures are reported
    /// as statuses and end with `AgentExit::Failure`.
    pub async fn run(&mut self, stop: CancellationToken) -> Result<AgentExit, AgentError> {
        if let Err(e) = self.args.validate() {
            warn!(error = %e, "Refusing to create broker client");
            let outcome = self.lifecycle.create_failed();
            return self.apply(outcome, None).map(|exit| exit.unwrap_or(AgentExit::Failure));
        }

        let (client, mut eventloop) =
            AsyncClient::new(self.args.mqtt_options(self.pid), REQUEST_CAPACITY);
        let outcome = self.lifecycle.created();
        if let Some(exit) = self.apply(outcome, Some(&client))? {
            return Ok(exit);
        }
        info!(
            broker = %self.args.broker_ip,
            port = self.args.port,
            topic = %self.args.topic,
            "Connecting"
        );

        let mut stopping = false;
        loop {
            let event = tokio::select! {
                biased;

                _ = stop.cancelled(), if !stopping => {
                    stopping = true;
                    info!("Stop requested");
                    self.disconnect(&client)
                }
                polled = eventloop.poll() => translate(polled),
            };

            if let Some(event) = event {
                let outcome = self.lifecycle.on_event(event);
                if let Some(exit) = self.apply(outcome, Some(&client))? {
                    return Ok(exit);
                }
            }
        }
    }

    /// Starts a graceful disconnect.
    ///
    /// Returns an event to apply right away when there is no broker
    /// connection to close.
    fn disconnect(&self, client: &AsyncClient) -> Option<BrokerEvent> {
        if !self.lifecycle.is_connected() {
            return Some(BrokerEvent::DisconnectSent);
        }
        if let Err(e) = client.try_unsubscribe(&self.args.topic) {
            debug!(error = %e, "Unsubscribe not queued");
        }
        match client.try_disconnect() {
            Ok(()) => None,
            Err(e) => {
                debug!(error = %e, "Disconnect not queued");
                Some(BrokerEvent::DisconnectSent)
            }
        }
    }

    /// Reports the outcome's record and acts on its instruction.
    fn apply(
        &mut self,
        outcome: Outcome,
        client: Option<&AsyncClient>,
    ) -> Result<Option<AgentExit>, AgentError> {
        if let Some(report) = &outcome.report {
            self.writer.send(report)?;
            debug!(status = ?report.status(), "Status reported");
        }

        match outcome.next {
            Next::Continue => Ok(None),
            Next::Exit(exit) => Ok(Some(exit)),
            Next::Subscribe => {
                let queued = client.map(|c| c.try_subscribe(&self.args.topic, QoS::AtMostOnce));
                if matches!(queued, Some(Ok(()))) {
                    return Ok(None);
                }
                warn!(topic = %self.args.topic, "Subscribe request failed");
                let outcome = self.lifecycle.on_event(BrokerEvent::SubscribeFailed);
                self.apply(outcome, client)
            }
        }
    }

    pub fn writer(&self) -> &StatusWriter<W> {
        &self.writer
    }
}

/// Maps a polled broker event to a lifecycle event.
pub fn translate(polled: Result<Event, ConnectionError>) -> Option<BrokerEvent> {
    match polled {
        Ok(Event::Incoming(Packet::ConnAck(ack))) => Some(BrokerEvent::ConnAck {
            accepted: ack.code == ConnectReturnCode::Success,
        }),
        Ok(Event::Incoming(Packet::SubAck(ack))) => Some(BrokerEvent::SubAck {
            granted: !ack.return_codes.is_empty()
                && ack
                    .return_codes
                    .iter()
                    .all(|code| matches!(code, SubscribeReasonCode::Success(_))),
        }),
        Ok(Event::Incoming(Packet::Publish(publish))) => Some(BrokerEvent::Message {
            payload: publish.payload.to_vec(),
        }),
        Ok(Event::Outgoing(Outgoing::Disconnect)) => Some(BrokerEvent::DisconnectSent),
        Ok(other) => {
            debug!(event = ?other, "Broker event");
            None
        }
        Err(ConnectionError::ConnectionRefused(code)) => {
            warn!(?code, "Broker refused connection");
            Some(BrokerEvent::ConnAck { accepted: false })
        }
        Err(e) => {
            warn!(error = %e, "Broker connection error");
            Some(BrokerEvent::ConnectionError)
        }
    }
}

#[cfg(test)]
mod tests {
    use rumqttc::{ConnAck, Publish, SubAck};
    use sshell_core::ClientStatus;
    use sshell_protocol::RECORD_SIZE;

    use super::*;

    #[test]
    fn test_translate_connack() {
        let ok = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert_eq!(translate(Ok(ok)), Some(BrokerEvent::ConnAck { accepted: true }));

        let refused = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::NotAuthorized,
            false,
        )));
        assert_eq!(
            translate(Ok(refused)),
            Some(BrokerEvent::ConnAck { accepted: false })
        );
        assert_eq!(
            translate(Err(ConnectionError::ConnectionRefused(
                ConnectReturnCode::BadUserNamePassword
            ))),
            Some(BrokerEvent::ConnAck { accepted: false })
        );
    }

    #[test]
    fn test_translate_suback() {
        let granted = SubAck::new(1, vec![SubscribeReasonCode::Success(QoS::AtMostOnce)]);
        assert_eq!(
            translate(Ok(Event::Incoming(Packet::SubAck(granted)))),
            Some(BrokerEvent::SubAck { granted: true })
        );
        let rejected = SubAck::new(1, vec![SubscribeReasonCode::Failure]);
        assert_eq!(
            translate(Ok(Event::Incoming(Packet::SubAck(rejected)))),
            Some(BrokerEvent::SubAck { granted: false })
        );
    }

    #[test]
    fn test_translate_publish_and_disconnect() {
        let publish = Publish::new("sensors/temp", QoS::AtMostOnce, "21.5");
        assert_eq!(
            translate(Ok(Event::Incoming(Packet::Publish(publish)))),
            Some(BrokerEvent::Message {
                payload: b"21.5".to_vec()
            })
        );
        assert_eq!(
            translate(Ok(Event::Outgoing(Outgoing::Disconnect))),
            Some(BrokerEvent::DisconnectSent)
        );
        assert_eq!(translate(Ok(Event::Incoming(Packet::PingResp))), None);
    }

    fn args(ip: &str) -> AgentArgs {
        AgentArgs {
            client_id: 2,
            channel_handle: 9,
            broker_ip: ip.to_string(),
            topic: "sensors/temp".to_string(),
            port: 1883,
            keep_alive: 60,
        }
    }

    fn statuses(bytes: &[u8]) -> Vec<ClientStatus> {
        bytes
            .chunks(RECORD_SIZE)
            .map(|chunk| StatusRecord::decode(chunk).unwrap().status())
            .collect()
    }

    #[tokio::test]
    async fn test_invalid_address_reports_create_failure() {
        let mut session =
            BrokerSession::new(args("300.1.1.1"), 55, StatusWriter::new(Vec::new())).unwrap();
        let exit = session.run(CancellationToken::new()).await.unwrap();

        assert_eq!(exit, AgentExit::Failure);
        assert_eq!(
            statuses(session.writer().get_ref()),
            vec![ClientStatus::CreateFailure]
        );
    }

    #[tokio::test]
    async fn test_stop_before_connect_reports_disconnect() {
        let stop = CancellationToken::new();
        stop.cancel();
        // The stop request wins the biased select before the first poll, so
        // no connection to the discard port is ever attempted.
        let mut a = args("127.0.0.1");
        a.port = 9;
        let mut session = BrokerSession::new(a, 55, StatusWriter::new(Vec::new())).unwrap();

        let exit = session.run(stop).await.unwrap();
        assert_eq!(exit, AgentExit::Success);
        assert_eq!(
            statuses(session.writer().get_ref()),
            vec![ClientStatus::CreateSuccess, ClientStatus::DisconnectSuccess]
        );
    }

    #[test]
    fn test_overlong_topic_still_builds_identity() {
        let mut a = args("10.0.0.1");
        a.topic = "t".repeat(40);
        assert!(BrokerSession::new(a, 1, StatusWriter::new(Vec::new())).is_ok());
    }
}
