//! # Bloom filter for join probe fast-negatives
//!
//! A probabilistic set membership filter used as an optional fast path on
//! the probe side of `HashJoin`/`SemiJoin`/`AntiJoin`: a "definitely
//! absent" answer lets the probe skip a full hashmap lookup and equality
//! check entirely. A "maybe present" answer falls through to the real
//! check, so false positives cost performance, never correctness.
//!
//! ```rust
//! use datalog_engine::join::bloom::BloomFilter;
//!
//! let mut filter = BloomFilter::new(10_000, 0.01);
//! filter.insert(&"hello");
//! assert!(filter.might_contain(&"hello"));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct BloomFilter {
    bits: Vec<bool>,
    num_hashes: u32,
}

impl BloomFilter {
    /// Size the filter for `expected_items` insertions at a target
    /// `false_positive_rate` (0.0-1.0 exclusive), using the standard
    /// optimal-bit-count and optimal-hash-count formulas.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let expected_items = expected_items.max(1);
        let rate = false_positive_rate.clamp(f64::EPSILON, 0.5);
        let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        let num_bits = (-(expected_items as f64) * rate.ln() / ln2_sq).ceil().max(8.0) as usize;
        let num_hashes = ((num_bits as f64 / expected_items as f64) * std::f64::consts::LN_2)
            .round()
            .max(1.0) as u32;
        BloomFilter {
            bits: vec![false; num_bits],
            num_hashes,
        }
    }

    fn hash_positions<T: Hash>(&self, item: &T) -> impl Iterator<Item = usize> + '_ {
        let mut h1_hasher = DefaultHasher::new();
        item.hash(&mut h1_hasher);
        let h1 = h1_hasher.finish();

        let mut h2_hasher = DefaultHasher::new();
        (h1, "bloom-salt").hash(&mut h2_hasher);
        let h2 = h2_hasher.finish();

        // Double hashing (Kirsch-Mitzenmacher): derive `num_hashes`
        // positions from two independent hashes instead of hashing once
        // per function.
        let len = self.bits.len() as u64;
        (0..self.num_hashes).map(move |i| {
            let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
            (combined % len) as usize
        })
    }

    pub fn insert<T: Hash>(&mut self, item: &T) {
        let positions: Vec<usize> = self.hash_positions(item).collect();
        for pos in positions {
            self.bits[pos] = true;
        }
    }

    /// `false` means definitely absent; `true` means maybe present.
    pub fn might_contain<T: Hash>(&self, item: &T) -> bool {
        self.hash_positions(item).all(|pos| self.bits[pos])
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = false);
    }
}
