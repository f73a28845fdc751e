//! Property tests for the client registry.

use std::collections::HashSet;

use proptest::prelude::*;
use sshell::{ClientRegistry, RegistryError};
use sshell_core::{ClientId, ClientRecord, ClientStatus};

#[derive(Debug, Clone)]
enum Op {
    Insert(u32),
    Remove(u32),
}

fn op() -> impl Strategy<Value = Op> {
    // A small pid space so removes often hit live entries.
    prop_oneof![
        (1u32..20).prop_map(Op::Insert),
        (1u32..20).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn occupancy_matches_live_records(
        capacity in 1usize..=10,
        ops in prop::collection::vec(op(), 0..60),
    ) {
        let mut registry = ClientRegistry::new(capacity).unwrap();
        let mut live = HashSet::new();

        for (n, op) in ops.into_iter().enumerate() {
            match op {
                Op::Insert(pid) => {
                    if live.contains(&pid) {
                        continue;
                    }
                    let record = ClientRecord::new(
                        ClientId::new(n as i32),
                        pid,
                        ClientStatus::SubSuccess,
                        "10.0.0.1",
                        "t",
                    );
                    let before = registry.occupancy();
                    match registry.insert(record) {
                        Ok(slot) => {
                            prop_assert!(slot < capacity);
                            prop_assert_eq!(before & (1 << slot), 0);
                            live.insert(pid);
                        }
                        Err(e) => {
                            prop_assert_eq!(e, RegistryError::Full { max: capacity });
                            prop_assert_eq!(live.len(), capacity);
                            prop_assert_eq!(registry.occupancy(), before);
                        }
                    }
                }
                Op::Remove(pid) => {
                    let removed = registry.remove_by_pid(pid);
                    prop_assert_eq!(removed.is_some(), live.remove(&pid));
                }
            }

            prop_assert_eq!(registry.occupancy().count_ones() as usize, live.len());
            prop_assert_eq!(registry.len(), live.len());
            prop_assert_eq!(registry.list().count(), live.len());
            prop_assert!(registry.occupancy() >> capacity == 0);
            for (slot, record) in registry.list() {
                prop_assert_eq!(record.slot, Some(slot));
                prop_assert!(live.contains(&record.pid));
            }
        }
    }

    #[test]
    fn lowest_free_slot_is_taken(capacity in 2usize..=64, hole in 0usize..64) {
        let hole = hole % capacity;
        let mut registry = ClientRegistry::new(capacity).unwrap();
        for pid in 0..capacity as u32 {
            let record = ClientRecord::new(
                ClientId::new(pid as i32),
                pid,
                ClientStatus::SubSuccess,
                "1.1.1.1",
                "t",
            );
            registry.insert(record).unwrap();
        }
        prop_assert!(registry.is_full());

        registry.remove_by_pid(hole as u32).unwrap();
        let record =
            ClientRecord::new(ClientId::new(-1), 9999, ClientStatus::SubSuccess, "1.1.1.1", "t");
        prop_assert_eq!(registry.insert(record), Ok(hole));
    }
}
