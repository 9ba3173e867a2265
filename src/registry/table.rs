//! Robin-Hood slot table in a virtual arena.
//!
//! Each slot is one `u64` word:
//!
//! ```text
//!  63            32 31             0
//! +----------------+----------------+
//! |   name hash    |   class id + 1 |
//! +----------------+----------------+
//! ```
//!
//! A zero word is an empty slot, so freshly committed pages are an empty table. The slot count is
//! a power of two and an entry's ideal slot is `hash & (slots - 1)`. Insertion displaces
//! residents that sit closer to their ideal slot than the incoming entry (Robin-Hood), which
//! keeps probe sequences short and lets lookups stop early.
//!
//! The table doubles in place: the arena commits the pages behind the current slots and the
//! entries are redistributed inside the same base address.

use std::sync::Arc;

use crate::{
    config::{RegistryConfig, SLOT_SIZE},
    memory::{PageMapper, VirtualArena},
    Error, Result,
};

const EMPTY: u64 = 0;

#[inline]
fn pack(hash: u32, id: u32) -> u64 {
    (u64::from(hash) << 32) | (u64::from(id) + 1)
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn slot_hash(slot: u64) -> u32 {
    (slot >> 32) as u32
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn slot_id(slot: u64) -> u32 {
    (slot as u32).wrapping_sub(1)
}

/// Probe distance statistics of a [`ClassTable`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeStats {
    /// Largest distance of any entry from its ideal slot
    pub max: usize,
    /// Mean distance of all entries from their ideal slot
    pub mean: f64,
}

/// Open-addressing hash table from name hashes to class ids.
///
/// The table stores hashes only; callers resolve ids to names for the exact comparison.
pub struct ClassTable {
    arena: VirtualArena,
    slots: usize,
    occupied: usize,
    max_slots: usize,
    load_factor_percent: usize,
}

impl ClassTable {
    /// Reserve space for `config.max_slots` and commit `config.initial_slots`.
    ///
    /// # Errors
    /// - [`Error::InvalidConfig`] for invalid sizing
    /// - [`Error::ReservationFailed`] / [`Error::CommitFailed`] from the mapper
    pub fn new(mapper: Arc<dyn PageMapper>, config: &RegistryConfig) -> Result<ClassTable> {
        config.validate()?;

        let mut arena = VirtualArena::reserve(mapper, config.reservation_size())?;
        if arena.base() as usize % std::mem::align_of::<u64>() != 0 {
            return Err(Error::ReservationFailed {
                size: arena.reserved_len(),
                message: "reservation is not aligned for slot words".to_string(),
            });
        }

        arena.grow(config.initial_slots * SLOT_SIZE)?;

        Ok(ClassTable {
            arena,
            slots: config.initial_slots,
            occupied: 0,
            max_slots: config.max_slots,
            load_factor_percent: usize::from(config.load_factor_percent),
        })
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupied
    }

    /// Returns `true` if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Bytes committed for the slot array.
    #[must_use]
    pub fn committed_bytes(&self) -> usize {
        self.arena.committed_len()
    }

    /// Base address of the slot array.
    #[must_use]
    pub fn base(&self) -> *const u8 {
        self.arena.base()
    }

    fn words(&self) -> &[u64] {
        let bytes = self.arena.committed();
        debug_assert!(bytes.len() >= self.slots * SLOT_SIZE);
        // SAFETY: the base is u64 aligned (checked in `new`) and `slots` words are committed
        unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<u64>(), self.slots) }
    }

    fn words_mut(&mut self) -> &mut [u64] {
        let slots = self.slots;
        let bytes = self.arena.committed_mut();
        debug_assert!(bytes.len() >= slots * SLOT_SIZE);
        // SAFETY: the base is u64 aligned (checked in `new`) and `slots` words are committed
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<u64>(), slots) }
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots - 1
    }

    #[inline]
    fn ideal(&self, hash: u32) -> usize {
        hash as usize & self.mask()
    }

    #[inline]
    fn distance(&self, slot: u64, index: usize) -> usize {
        index.wrapping_sub(self.ideal(slot_hash(slot))) & self.mask()
    }

    /// Find the id whose hash is `hash` and for which `matches` holds.
    ///
    /// Probing stops at the first empty slot, or at a resident closer to its ideal slot than the
    /// current probe distance, since the entry would have displaced it.
    pub fn find(&self, hash: u32, mut matches: impl FnMut(u32) -> bool) -> Option<u32> {
        let words = self.words();
        let mut index = self.ideal(hash);

        for distance in 0..self.slots {
            let slot = words[index];
            if slot == EMPTY || self.distance(slot, index) < distance {
                return None;
            }

            if slot_hash(slot) == hash && matches(slot_id(slot)) {
                log::trace!("Found class id {} after {} probes", slot_id(slot), distance);
                return Some(slot_id(slot));
            }

            index = (index + 1) & self.mask();
        }

        None
    }

    /// Make room for one more entry, doubling the table if the load factor would be exceeded.
    ///
    /// On failure the table is unchanged.
    ///
    /// # Errors
    /// - [`Error::RegistryFull`] if every slot is occupied and the table cannot grow
    /// - [`Error::ReservationExhausted`] / [`Error::CommitFailed`] if growth fails
    pub fn reserve_one(&mut self) -> Result<()> {
        let needed = (self.occupied + 1) * 100;
        if needed > self.slots * self.load_factor_percent && self.slots < self.max_slots {
            self.grow()?;
        }

        if self.occupied >= self.slots {
            return Err(Error::RegistryFull { slots: self.slots });
        }

        Ok(())
    }

    /// Place `id` under `hash`.
    ///
    /// # Errors
    /// Returns [`Error::RegistryFull`] if no slot is free.
    pub fn insert(&mut self, hash: u32, id: u32) -> Result<()> {
        if self.occupied >= self.slots {
            return Err(Error::RegistryFull { slots: self.slots });
        }

        self.place(pack(hash, id))?;
        self.occupied += 1;
        Ok(())
    }

    /// Robin-Hood placement.
    ///
    /// # Errors
    /// Returns [`Error::RegistryFull`] if no slot is empty; the slots are left untouched.
    fn place(&mut self, mut entry: u64) -> Result<()> {
        let mask = self.mask();
        let start = self.ideal(slot_hash(entry));

        // Displacement only shifts entries up to the first empty slot of the run
        let words = self.words();
        let Some(run) = (0..self.slots).find(|step| words[(start + step) & mask] == EMPTY) else {
            log::error!("Slot table placement found no empty slot in {} slots", self.slots);
            return Err(Error::RegistryFull { slots: self.slots });
        };

        let mut distance = 0;
        for step in 0..=run {
            let index = (start + step) & mask;
            let resident = self.words()[index];
            if resident == EMPTY {
                self.words_mut()[index] = entry;
                break;
            }

            let resident_distance = self.distance(resident, index);
            if resident_distance < distance {
                self.words_mut()[index] = entry;
                entry = resident;
                distance = resident_distance;
            }

            distance += 1;
        }

        Ok(())
    }

    /// Double the slot count and redistribute every entry inside the same base.
    fn grow(&mut self) -> Result<()> {
        let new_slots = self.slots * 2;
        let needed = new_slots * SLOT_SIZE;
        let committed = self.arena.committed_len();
        if needed > committed {
            self.arena.grow(needed - committed)?;
        }

        let entries: Vec<u64> = self
            .words()
            .iter()
            .copied()
            .filter(|slot| *slot != EMPTY)
            .collect();

        self.words_mut().fill(EMPTY);
        self.slots = new_slots;
        for entry in entries {
            self.place(entry)?;
        }

        log::debug!(
            "Class table grew to {} slots ({} bytes committed)",
            self.slots,
            self.arena.committed_len()
        );

        Ok(())
    }

    /// Probe distance statistics over all occupied slots.
    #[must_use]
    pub fn probe_stats(&self) -> ProbeStats {
        let mut max = 0;
        let mut total = 0;

        for (index, slot) in self.words().iter().enumerate() {
            if *slot != EMPTY {
                let distance = self.distance(*slot, index);
                max = max.max(distance);
                total += distance;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let mean = if self.occupied == 0 {
            0.0
        } else {
            total as f64 / self.occupied as f64
        };

        ProbeStats { max, mean }
    }

    /// Check the table invariants: packed ids are unique, every entry is reachable from its
    /// ideal slot without crossing an empty slot, and the occupied count matches.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let words = self.words();
        let occupied = words.iter().filter(|slot| **slot != EMPTY).count();
        assert_eq!(occupied, self.occupied);

        for (index, slot) in words.iter().enumerate() {
            if *slot == EMPTY {
                continue;
            }

            let distance = self.distance(*slot, index);
            for step in 0..distance {
                let between = (self.ideal(slot_hash(*slot)) + step) & self.mask();
                assert_ne!(words[between], EMPTY, "entry at {index} unreachable");
            }
        }
    }
}
