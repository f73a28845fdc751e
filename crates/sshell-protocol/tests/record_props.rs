//! Property tests for the status record codec.

use proptest::prelude::*;
use sshell_core::ClientStatus;
use sshell_protocol::{ProtocolError, StatusRecord, RECORD_SIZE};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary bytes either fail to decode or re-encode to themselves.
    #[test]
    fn decode_is_canonical(bytes in prop::collection::vec(any::<u8>(), RECORD_SIZE)) {
        match StatusRecord::decode(&bytes) {
            Ok(record) => prop_assert_eq!(&record.encode()[..], &bytes[..]),
            Err(ProtocolError::Status(_)) | Err(ProtocolError::NegativePid(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    /// Any record built through the public API decodes to an equal record.
    #[test]
    fn constructed_records_survive_the_wire(
        id in any::<i32>(),
        pid in 0u32..=i32::MAX as u32,
        handle in any::<i32>(),
        ip in "[0-9.]{0,15}",
        topic in "[a-z/]{0,20}",
        code in 0i32..11,
        data in prop::collection::vec(1u8..=255, 0..8),
        slot in prop::option::of(0usize..64),
    ) {
        let mut record = StatusRecord::new(id.into(), pid, handle, &ip, &topic).unwrap();
        record.set_status(ClientStatus::from_code(code).unwrap());
        record.set_data(&data);
        record.set_slot(slot);

        let decoded = StatusRecord::decode(&record.encode()).unwrap();
        prop_assert_eq!(decoded.ip(), ip.as_str());
        prop_assert_eq!(decoded.topic(), topic.as_str());
        prop_assert_eq!(decoded.slot(), slot);
        prop_assert_eq!(decoded.data(), &data[..data.len().min(5)]);
        prop_assert_eq!(decoded, record);
    }
}
