//! Operator input validation for broker addresses and topics.

use crate::error::{DomainError, DomainResult};

/// Longest accepted address ("255.255.255.255"), equal to the wire width.
pub const IP_ADDR_MAX_LEN: usize = 15;

/// Longest accepted topic in bytes, equal to the wire width.
pub const TOPIC_MAX_LEN: usize = 20;

const SEGMENTS: usize = 4;
const SEGMENT_MAX_DIGITS: usize = 3;

/// Validates a dotted-quad IPv4 address.
///
/// Accepts exactly four dot-separated decimal segments of one to three
/// digits, each in `0..=255`. Leading or trailing dots and empty segments
/// are rejected.
pub fn validate_address(ip: &str) -> DomainResult<()> {
    if ip.is_empty() {
        return Err(DomainError::address(ip, "address is empty"));
    }
    if ip.len() > IP_ADDR_MAX_LEN {
        return Err(DomainError::address(
            ip,
            format!("longer than {IP_ADDR_MAX_LEN} characters"),
        ));
    }
    if ip.starts_with('.') || ip.ends_with('.') {
        return Err(DomainError::address(ip, "leading or trailing dot"));
    }

    let segments: Vec<&str> = ip.split('.').collect();
    if segments.len() != SEGMENTS {
        return Err(DomainError::address(
            ip,
            format!("expected {SEGMENTS} segments, found {}", segments.len()),
        ));
    }

    for segment in segments {
        validate_segment(ip, segment)?;
    }
    Ok(())
}

fn validate_segment(ip: &str, segment: &str) -> DomainResult<()> {
    if segment.is_empty() {
        return Err(DomainError::address(ip, "empty segment"));
    }
    if segment.len() > SEGMENT_MAX_DIGITS || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::address(
            ip,
            format!("segment {segment:?} is not a number"),
        ));
    }
    match segment.parse::<u16>() {
        Ok(value) if value <= 255 => Ok(()),
        _ => Err(DomainError::address(
            ip,
            format!("segment {segment} is out of range 0-255"),
        )),
    }
}

/// Validates a subscription topic: non-blank and at most [`TOPIC_MAX_LEN`] bytes.
pub fn validate_topic(topic: &str) -> DomainResult<()> {
    if topic.trim().is_empty() {
        return Err(DomainError::topic(topic, "topic is blank"));
    }
    if topic.len() > TOPIC_MAX_LEN {
        return Err(DomainError::topic(
            topic,
            format!("longer than {TOPIC_MAX_LEN} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_addresses() {
        for ip in ["192.168.1.10", "0.0.0.0", "255.255.255.255", "127.0.0.1", "10.0.0.01"] {
            assert!(validate_address(ip).is_ok(), "{ip} should be accepted");
        }
    }

    #[test]
    fn test_rejects_invalid_addresses() {
        for ip in [
            "192.168.1.",
            ".1.2.3",
            "256.1.1.1",
            "1.1.1",
            "12a.1.1.1",
            "1..2.3",
            "1.2.3.4.5",
            "",
            "1000.1.1.1",
            "-1.1.1.1",
            "1.1.1.1 ",
        ] {
            assert!(validate_address(ip).is_err(), "{ip:?} should be rejected");
        }
    }

    #[test]
    fn test_address_error_names_reason() {
        let err = validate_address("256.1.1.1").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_topic_validation() {
        assert!(validate_topic("sensors/temp").is_ok());
        assert!(validate_topic("a").is_ok());
        assert!(validate_topic(&"t".repeat(TOPIC_MAX_LEN)).is_ok());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("   ").is_err());
        assert!(validate_topic(&"t".repeat(TOPIC_MAX_LEN + 1)).is_err());
    }
}
