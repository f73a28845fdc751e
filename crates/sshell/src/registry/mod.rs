//! Fixed-capacity registry of subscribed clients.
//!
//! The registry is the supervisor's record of which agents are live. It is
//! owned by the control loop and only mutated from there, in the order
//! status records arrive.
//!
//! # Lifecycle
//!
//! ```text
//!  SubSuccess (new pid) ──▶ insert ──▶ [slot occupied] ──▶ remove_by_pid ◀── DisconnectSuccess
//!                                          │                                  ConnLost
//!                                          └─ update_status ◀── any other status
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Slot lookups go through `get`, never direct indexing
//! - A full registry is reported as `RegistryError::Full`, never a panic

mod arena;

pub use arena::{SlotArena, MAX_CAPACITY};

use sshell_core::{ClientRecord, ClientStatus};
use thiserror::Error;
use tracing::debug;

/// Number of client slots unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 5;

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every slot is occupied.
    #[error("client registry is full (max: {max} clients)")]
    Full {
        /// Capacity of the registry
        max: usize,
    },

    /// Requested capacity cannot be represented.
    #[error("registry capacity must be between 1 and {MAX_CAPACITY}, got {requested}")]
    InvalidCapacity {
        /// The rejected capacity
        requested: usize,
    },
}

/// Registry of live clients, one per slot.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    arena: SlotArena<ClientRecord>,
}

impl ClientRegistry {
    /// Creates an empty registry with `capacity` slots.
    ///
    /// # Errors
    ///
    /// `RegistryError::InvalidCapacity` unless `1 <= capacity <= MAX_CAPACITY`.
    pub fn new(capacity: usize) -> Result<Self, RegistryError> {
        SlotArena::new(capacity)
            .map(|arena| Self { arena })
            .ok_or(RegistryError::InvalidCapacity {
                requested: capacity,
            })
    }

    /// Stores `record` in the lowest free slot and stamps the slot on it.
    ///
    /// The caller guarantees the pid is not already registered.
    ///
    /// # Errors
    ///
    /// `RegistryError::Full` when every slot is taken; nothing is changed.
    pub fn insert(&mut self, record: ClientRecord) -> Result<usize, RegistryError> {
        let max = self.capacity();
        let slot = self
            .arena
            .insert(record)
            .map_err(|_| RegistryError::Full { max })?;

        if let Some(stored) = self.arena.get_mut(slot) {
            stored.slot = Some(slot);
            debug!(slot, pid = stored.pid, client = %stored.id, "Client slot assigned");
        }
        Ok(slot)
    }

    /// Removes the first registered client with `pid`, scanning slots in order.
    ///
    /// Returns the removed record, or `None` if no client has that pid.
    pub fn remove_by_pid(&mut self, pid: u32) -> Option<ClientRecord> {
        let slot = self.slot_of(pid)?;
        let removed = self.arena.remove(slot);
        debug!(slot, pid, "Client slot released");
        removed
    }

    /// Records the latest status of a registered client.
    ///
    /// Returns `false` if the pid is not registered.
    pub fn update_status(&mut self, pid: u32, status: ClientStatus) -> bool {
        let Some(slot) = self.slot_of(pid) else {
            return false;
        };
        match self.arena.get_mut(slot) {
            Some(record) => {
                record.last_status = status;
                true
            }
            None => false,
        }
    }

    /// Occupied slots and their records, in slot order.
    pub fn list(&self) -> impl Iterator<Item = (usize, &ClientRecord)> + '_ {
        self.arena.iter()
    }

    pub fn get(&self, slot: usize) -> Option<&ClientRecord> {
        self.arena.get(slot)
    }

    pub fn contains_pid(&self, pid: u32) -> bool {
        self.slot_of(pid).is_some()
    }

    fn slot_of(&self, pid: u32) -> Option<usize> {
        self.arena
            .iter()
            .find(|(_, record)| record.pid == pid)
            .map(|(slot, _)| slot)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.arena.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Occupancy bitmask: bit `i` is set when slot `i` holds a client.
    pub fn occupancy(&self) -> u64 {
        self.arena.occupancy()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self {
            arena: SlotArena::clamped(DEFAULT_CAPACITY),
        }
    }
}
