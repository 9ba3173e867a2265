//! Class name hashing.
//!
//! Names are hashed with 32-bit FNV-1a. The registry packs the hash next to the class id in a
//! single slot word, compares hashes before names during probing, and derives the ideal slot
//! from the low bits.

/// FNV-1a 32-bit offset basis
const FNV_OFFSET: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime
const FNV_PRIME: u32 = 0x0100_0193;

/// Incremental FNV-1a hash over byte runs.
///
/// Feeding the same bytes in any split produces the same hash as [`hash_name`] over their
/// concatenation.
#[derive(Debug, Clone, Copy)]
pub struct NameHash {
    state: u32,
}

impl NameHash {
    /// Create a hasher at the offset basis.
    #[must_use]
    pub fn new() -> Self {
        NameHash { state: FNV_OFFSET }
    }

    /// Mix `bytes` into the hash.
    #[must_use]
    pub fn update(mut self, bytes: &[u8]) -> Self {
        for byte in bytes {
            self.state ^= u32::from(*byte);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
        self
    }

    /// The hash of everything fed so far.
    #[must_use]
    pub fn finalize(self) -> u32 {
        self.state
    }
}

impl Default for NameHash {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a class name.
#[must_use]
pub fn hash_name(name: &[u8]) -> u32 {
    NameHash::new().update(name).finalize()
}
