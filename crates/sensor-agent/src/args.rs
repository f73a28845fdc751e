//! Command-line arguments the supervisor starts an agent with.

use std::time::Duration;

use clap::Parser;
use rumqttc::MqttOptions;
use sshell_core::{validate_address, validate_topic, ClientId, DomainResult};

/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Default keep-alive interval in seconds.
pub const DEFAULT_KEEP_ALIVE: u64 = 60;

/// Subscribes to one topic on one broker and reports to the supervisor.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "sensor-agent", version, about)]
pub struct AgentArgs {
    /// Id assigned by the supervisor
    #[arg(allow_negative_numbers = true)]
    pub client_id: i32,

    /// Inherited status channel descriptor
    pub channel_handle: i32,

    /// Broker IPv4 address
    pub broker_ip: String,

    /// Topic to subscribe to
    pub topic: String,

    /// Broker port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Keep-alive interval in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_KEEP_ALIVE,
        value_parser = clap::value_parser!(u64).range(5..=65535)
    )]
    pub keep_alive: u64,
}

impl AgentArgs {
    pub fn id(&self) -> ClientId {
        ClientId::new(self.client_id)
    }

    /// Checks the broker address and topic.
    pub fn validate(&self) -> DomainResult<()> {
        validate_address(&self.broker_ip)?;
        validate_topic(&self.topic)
    }

    /// Broker client id, unique per agent process.
    pub fn mqtt_client_id(&self, pid: u32) -> String {
        format!("sensor-agent-{}-{pid}", self.client_id)
    }

    /// Connection options for the broker client.
    pub fn mqtt_options(&self, pid: u32) -> MqttOptions {
        let mut options = MqttOptions::new(self.mqtt_client_id(pid), &self.broker_ip, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive));
        options.set_clean_session(true);
        options
    }
}
