//! Fixed-capacity slot arena with bitmask occupancy.
//!
//! Bit `i` of the occupancy mask is set exactly when slot `i` holds a value.
//! Allocation takes the lowest free slot using `trailing_zeros` on the
//! inverted mask, so insert and remove are O(1); iteration visits occupied
//! slots in ascending order.

/// Largest supported capacity (one bit per slot in a `u64`).
pub const MAX_CAPACITY: usize = 64;

/// A fixed number of slots, each empty or holding one `T`.
#[derive(Debug, Clone)]
pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
    occupied: u64,
    full_mask: u64,
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    ///
    /// Returns `None` if `capacity` is zero or above [`MAX_CAPACITY`].
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return None;
        }
        Some(Self::clamped(capacity))
    }

    /// Creates an empty arena, forcing `capacity` into `1..=MAX_CAPACITY`.
    pub fn clamped(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        let full_mask = if capacity == MAX_CAPACITY {
            u64::MAX
        } else {
            (1u64 << capacity) - 1
        };
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            occupied: 0,
            full_mask,
        }
    }

    /// Stores `value` in the lowest free slot.
    ///
    /// Gives the value back unchanged if every slot is taken.
    pub fn insert(&mut self, value: T) -> Result<usize, T> {
        let free = !self.occupied & self.full_mask;
        if free == 0 {
            return Err(value);
        }
        let slot = free.trailing_zeros() as usize;
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = Some(value);
                self.occupied |= 1 << slot;
                Ok(slot)
            }
            None => Err(value),
        }
    }

    /// Empties `slot`, returning what it held.
    pub fn remove(&mut self, slot: usize) -> Option<T> {
        if !self.is_occupied(slot) {
            return None;
        }
        self.occupied &= !(1 << slot);
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        if !self.is_occupied(slot) {
            return None;
        }
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        if !self.is_occupied(slot) {
            return None;
        }
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Occupied slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        SetBits(self.occupied)
            .filter_map(move |slot| self.slots.get(slot)?.as_ref().map(|value| (slot, value)))
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        slot < self.slots.len() && self.occupied & (1 << slot) != 0
    }

    pub fn len(&self) -> usize {
        self.occupied.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.full_mask
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The raw occupancy mask.
    pub fn occupancy(&self) -> u64 {
        self.occupied
    }
}

/// Iterates the indices of set bits, lowest first.
struct SetBits(u64);

impl Iterator for SetBits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_bounds() {
        assert!(SlotArena::<u8>::new(0).is_none());
        assert!(SlotArena::<u8>::new(MAX_CAPACITY + 1).is_none());
        assert_eq!(SlotArena::<u8>::new(MAX_CAPACITY).unwrap().capacity(), 64);
    }

    #[test]
    fn test_lowest_free_slot_is_reused() {
        let mut arena = SlotArena::new(3).unwrap();
        assert_eq!(arena.insert('a'), Ok(0));
        assert_eq!(arena.insert('b'), Ok(1));
        assert_eq!(arena.insert('c'), Ok(2));
        assert!(arena.is_full());
        assert_eq!(arena.insert('d'), Err('d'));

        assert_eq!(arena.remove(1), Some('b'));
        assert_eq!(arena.occupancy(), 0b101);
        assert_eq!(arena.insert('e'), Ok(1));
    }

    #[test]
    fn test_remove_empty_slot_is_noop() {
        let mut arena = SlotArena::new(2).unwrap();
        arena.insert(1).unwrap();
        assert_eq!(arena.remove(1), None);
        assert_eq!(arena.remove(9), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_iter_ascending() {
        let mut arena = SlotArena::new(5).unwrap();
        for v in 0..5 {
            arena.insert(v * 10).unwrap();
        }
        arena.remove(0);
        arena.remove(3);
        let seen: Vec<_> = arena.iter().map(|(slot, v)| (slot, *v)).collect();
        assert_eq!(seen, vec![(1, 10), (2, 20), (4, 40)]);
    }

    #[test]
    fn test_full_width_arena() {
        let mut arena = SlotArena::new(MAX_CAPACITY).unwrap();
        for v in 0..MAX_CAPACITY {
            assert_eq!(arena.insert(v), Ok(v));
        }
        assert!(arena.is_full());
        assert_eq!(arena.occupancy(), u64::MAX);
        assert_eq!(arena.remove(63), Some(63));
        assert!(!arena.is_full());
    }
}
