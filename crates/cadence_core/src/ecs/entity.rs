//! Entity handle with generational index
//!
//! Entities are lightweight handles (8 bytes) that reference slots in the
//! `EntityStore`. The generation counter prevents use-after-free bugs.

use std::fmt;

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: Position in the store's slot table
/// - Generation: Incremented on entity destruction (stale handles stop matching)
///
/// Example:
/// ```ignore
/// let entity = store.create();
/// store.destroy(entity)?;
/// assert!(store.get::<Position>(entity).is_err()); // generation mismatch
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into a 64-bit integer (for hashing and diagnostics)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Unpack from a 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Per-index bookkeeping inside the store.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntitySlot {
    pub generation: u32,
    pub alive: bool,
}
