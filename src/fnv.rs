//! FNV-1 (not FNV-1a) hashing used for compatibility hashes and cache
//! checksums. The `fnv` crate's `FnvHasher` implements FNV-1a — it XORs
//! before multiplying rather than after — so content hashes computed with
//! it would not match the reference implementation's. This module
//! implements the classic FNV-1 order directly; `fnv::FnvBuildHasher` is
//! still used elsewhere in this crate for `HashMap`/`HashSet` keyed by
//! register or id, where only internal consistency (not a specific
//! external hash value) matters.
const FNV_OFFSET_BASIS_64: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME_64: u64 = 0x0000_0100_0000_01b3;

pub fn fnv1_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS_64;
    for &byte in data {
        hash = hash.wrapping_mul(FNV_PRIME_64);
        hash ^= u64::from(byte);
    }
    hash
}

/// Fold an already-computed hash together with more bytes, for chaining
/// (e.g. mixing a stage index into a per-stage shader hash).
pub fn fnv1_64_continue(seed: u64, data: &[u8]) -> u64 {
    let mut hash = seed;
    for &byte in data {
        hash = hash.wrapping_mul(FNV_PRIME_64);
        hash ^= u64::from(byte);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_offset_basis() {
        assert_eq!(fnv1_64(&[]), FNV_OFFSET_BASIS_64);
    }

    #[test]
    fn continuation_matches_single_pass() {
        let whole = fnv1_64(b"hello world");
        let split = fnv1_64_continue(fnv1_64(b"hello "), b"world");
        assert_eq!(whole, split);
    }

    #[test]
    fn differs_from_trivial_all_zero_hash() {
        assert_ne!(fnv1_64(b"a"), fnv1_64(b"b"));
    }
}
