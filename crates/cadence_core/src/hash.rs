//! Content keys
//!
//! A [`HashKey`] is a stable 64-bit identifier for arbitrary byte content:
//! asset paths, serialized snapshots, raw component data. FNV-1a is used
//! so the same bytes produce the same key on every platform and run.
//! Collisions are possible and accepted.

use std::fmt;
use std::hash::Hasher;

use bytemuck::NoUninit;
use fnv::FnvHasher;

/// 64-bit content key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashKey(u64);

impl HashKey {
    /// Hash a byte sequence. Never fails; the empty slice has a key too.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = FnvHasher::default();
        hasher.write(bytes);
        Self(hasher.finish())
    }

    /// Hash the UTF-8 bytes of a string (asset paths, names).
    pub fn of_str(text: &str) -> Self {
        Self::compute(text.as_bytes())
    }

    /// Hash a plain-old-data value by its in-memory bytes.
    ///
    /// `NoUninit` guarantees there is no padding, so equal values always
    /// have equal bytes.
    pub fn of_value<T: NoUninit>(value: &T) -> Self {
        Self::compute(bytemuck::bytes_of(value))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<&str> for HashKey {
    fn from(text: &str) -> Self {
        Self::of_str(text)
    }
}

/// Incremental key over several pieces of content.
///
/// Feeding `a` then `b` gives the same key as `HashKey::compute` over
/// `a ++ b`.
#[derive(Default)]
pub struct HashKeyBuilder {
    hasher: FnvHasher,
}

impl HashKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.write(bytes);
        self
    }

    pub fn write_value<T: NoUninit>(&mut self, value: &T) -> &mut Self {
        self.write(bytemuck::bytes_of(value))
    }

    pub fn finish(&self) -> HashKey {
        HashKey(self.hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equal_bytes_give_equal_keys() {
        let a = b"textures/player.png".to_vec();
        let b = b"textures/player.png".to_vec();
        assert_eq!(HashKey::compute(&a), HashKey::compute(&b));
        assert_eq!(HashKey::of_str("textures/player.png"), HashKey::compute(&a));
    }

    #[test]
    fn empty_input_is_hashable() {
        assert_eq!(HashKey::compute(&[]), HashKey::compute(&[]));
        // FNV-1a 64 offset basis
        assert_eq!(HashKey::compute(&[]).raw(), 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn keys_are_spread_across_a_sample() {
        let keys: HashSet<HashKey> = (0u32..10_000)
            .map(|i| HashKey::compute(&i.to_le_bytes()))
            .collect();
        assert!(keys.len() > 9_990);

        // Top bits should not all collapse into a few buckets.
        let buckets: HashSet<u64> = keys.iter().map(|k| k.raw() >> 60).collect();
        assert_eq!(buckets.len(), 16);
    }

    #[test]
    fn builder_matches_concatenation() {
        let mut builder = HashKeyBuilder::new();
        builder.write(b"assets/").write(b"bounce.wav");
        assert_eq!(builder.finish(), HashKey::of_str("assets/bounce.wav"));
    }

    #[test]
    fn value_hashing_uses_bytes() {
        let a: [f32; 2] = [1.0, 2.0];
        let b: [f32; 2] = [1.0, 2.0];
        assert_eq!(HashKey::of_value(&a), HashKey::of_value(&b));
        assert_ne!(HashKey::of_value(&a), HashKey::of_value(&[2.0f32, 1.0]));
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(HashKey::from_raw(0xab).to_string(), "00000000000000ab");
    }
}
