//! Filter Policy
//!
//! Per-key probabilistic membership filters. A filter is built from every key
//! in a table at build time and consulted on reads to skip tables that
//! provably do not contain the key. A filter may say "maybe" for an absent
//! key (false positive) but must never say "no" for a present one.

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seeds for the two independent hash streams used by double hashing.
const BLOOM_SEED_A: u64 = 0x4d65_7269_6469_616e; // "Meridian"
const BLOOM_SEED_B: u64 = 0x626c_6f6f_6d66_6c74; // "bloomflt"

/// Builds and queries per-table key filters.
pub trait FilterPolicy: Send + Sync {
    /// Identifier stored alongside the filter data.
    fn name(&self) -> &str;

    /// Build a filter over `keys`. The returned bytes are stored verbatim in
    /// the table's filter block.
    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8>;

    /// True if `key` may be in the set the filter was built from.
    /// Must return true for every key passed to `create_filter`.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/// Shared handle to a filter policy.
pub type FilterPolicyRef = Arc<dyn FilterPolicy>;

/// Bloom filter with double hashing.
///
/// `bits_per_key = 10` yields roughly a 1% false-positive rate; the rate is
/// approximately `2^(-bits_per_key * 0.69)`.
#[derive(Debug, Clone, Copy)]
pub struct BloomFilterPolicy {
    bits_per_key: usize,
    /// Number of probes per key, derived as bits_per_key * ln(2).
    k: u32,
}

impl BloomFilterPolicy {
    /// Create a bloom policy using approximately `bits_per_key` filter bits
    /// for each key added.
    pub fn new(bits_per_key: usize) -> Self {
        // k = bits_per_key * ln(2), clamped to a sane probe count.
        let k = ((bits_per_key as f64) * 0.69) as u32;
        let k = k.clamp(1, 30);
        Self { bits_per_key, k }
    }

    /// Convenience: a shared handle to a policy with `bits_per_key` bits.
    pub fn shared(bits_per_key: usize) -> FilterPolicyRef {
        Arc::new(Self::new(bits_per_key))
    }

    fn probes(&self, key: &[u8], bits: u64) -> impl Iterator<Item = u64> {
        let h1 = xxh3_64_with_seed(key, BLOOM_SEED_A);
        let h2 = xxh3_64_with_seed(key, BLOOM_SEED_B) | 1;
        let k = self.k;
        (0..k as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % bits)
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &str {
        "meridiankv.BuiltinBloomFilter"
    }

    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8> {
        // At least 64 bits even for tiny key sets to keep the FP rate down.
        let bits = (keys.len() * self.bits_per_key).max(64);
        let bytes = (bits + 7) / 8;
        let bits = (bytes * 8) as u64;

        let mut filter = vec![0u8; bytes + 1];
        // Remember k so key_may_match works even if the policy is later
        // constructed with different parameters.
        filter[bytes] = self.k as u8;

        for key in keys {
            for bit in self.probes(key, bits) {
                filter[(bit / 8) as usize] |= 1 << (bit % 8);
            }
        }
        filter
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.len() < 2 {
            return true;
        }
        let bytes = filter.len() - 1;
        let bits = (bytes * 8) as u64;
        let k = filter[bytes];
        if k > 30 {
            // Reserved for future encodings; err on the side of a disk probe.
            return true;
        }

        let h1 = xxh3_64_with_seed(key, BLOOM_SEED_A);
        let h2 = xxh3_64_with_seed(key, BLOOM_SEED_B) | 1;
        for i in 0..k as u64 {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % bits;
            if filter[(bit / 8) as usize] & (1 << (bit % 8)) == 0 {
                return false;
            }
        }
        true
    }
}
