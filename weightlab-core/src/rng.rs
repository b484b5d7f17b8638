//! Deterministic per-symbol random streams.
//!
//! A master seed generates sub-seeds for each `(scope, symbol)` pair via
//! BLAKE3 hashing, so the stream an asset sees does not depend on which other
//! assets are in the run or the order they are processed.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seed hierarchy rooted at one master seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for a `(scope, symbol)` pair.
    pub fn sub_seed(&self, scope: &str, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        // length-prefix so ("ab", "c") and ("a", "bc") differ
        hasher.update(&(scope.len() as u64).to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(seed)
    }

    pub fn rng_for(&self, scope: &str, symbol: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, symbol))
    }
}
