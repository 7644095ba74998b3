//! Shared payload alphabet
//!
//! Values written to the cache are windows into one large buffer of printable
//! bytes that is generated once at startup and shared read-only by every
//! worker. Synthesizing a value is then a single offset computation with no
//! allocation or copying in the hot path.

use crate::util::prng::Prng;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Size of the default value pool in bytes
pub const DEFAULT_POOL_SIZE: usize = 100_000;

/// First printable byte used in synthesized values
const ALPHABET_FIRST: u8 = b'!';

/// Last printable byte used in synthesized values
const ALPHABET_LAST: u8 = b'~';

/// Read-only buffer of printable bytes that payloads are sliced from
#[derive(Debug, Clone)]
pub struct ValuePool {
    bytes: Box<[u8]>,
}

impl ValuePool {
    /// Create a pool of `DEFAULT_POOL_SIZE` bytes from a fixed seed
    pub fn new() -> Self {
        Self::with_size(DEFAULT_POOL_SIZE, 0)
    }

    /// Create a pool of `size` bytes filled deterministically from `seed`
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    pub fn with_size(size: usize, seed: u64) -> Self {
        assert!(size > 0, "Value pool size must be greater than 0");

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let bytes: Vec<u8> = (0..size)
            .map(|_| rng.gen_range(ALPHABET_FIRST..=ALPHABET_LAST))
            .collect();

        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Size of the pool, which is also the largest value it can produce
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; pools are never empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow a value of exactly `len` bytes starting at a PRNG-chosen offset
    ///
    /// Lengths larger than the pool are clamped to the pool size; the
    /// configuration validator and workload parser reject such lengths before
    /// a run starts.
    #[inline]
    pub fn value(&self, prng: &mut Prng, len: usize) -> &[u8] {
        let len = len.min(self.bytes.len());
        let window = (self.bytes.len() - len + 1) as u64;
        let start = prng.next_below(window) as usize;
        &self.bytes[start..start + len]
    }
}

impl Default for ValuePool {
    fn default() -> Self {
        Self::new()
    }
}
