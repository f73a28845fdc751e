//! The agent must accept every command line the supervisor builds.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use clap::Parser;
use sensor_agent::{AgentArgs, DEFAULT_PORT};
use sshell::AgentInvocation;
use sshell_core::{validate_topic, ClientId};

fn parse(invocation: &AgentInvocation) -> AgentArgs {
    let argv = std::iter::once("sensor-agent".to_string()).chain(invocation.args());
    AgentArgs::try_parse_from(argv).expect("supervisor command line rejected")
}

fn invocation(id: i32, topic: &str) -> AgentInvocation {
    AgentInvocation {
        id: ClientId::new(id),
        channel_handle: 4,
        ip: "10.0.0.1".to_string(),
        topic: topic.to_string(),
    }
}

#[test]
fn test_hyphenated_topics_stay_positional() {
    for topic in ["-sensors/temp", "--help", "--port", "-V", "-"] {
        assert!(validate_topic(topic).is_ok(), "{topic:?} should be a valid topic");

        let args = parse(&invocation(0, topic));
        assert_eq!(args.topic, topic);
        assert_eq!(args.broker_ip, "10.0.0.1");
        assert_eq!(args.channel_handle, 4);
        assert_eq!(args.port, DEFAULT_PORT);
        assert!(args.validate().is_ok());
    }
}

#[test]
fn test_wrapped_negative_id() {
    let args = parse(&invocation(i32::MIN, "sensors/temp"));
    assert_eq!(args.id(), ClientId::new(i32::MIN));
    assert_eq!(args.topic, "sensors/temp");
}
