//! Key hashing
//!
//! 64-bit FNV-1a. The digest is both the index key and the key field of a
//! hint record. No original key is stored alongside it, so two keys with the
//! same digest alias each other in the index.

/// FNV-1a 64-bit offset basis
pub const FNV_OFFSET_BASIS: u64 = 14695981039346656037;

/// FNV-1a 64-bit prime
pub const FNV_PRIME: u64 = 1099511628211;

/// Hash a key with 64-bit FNV-1a
pub fn hash(key: &[u8]) -> u64 {
    key.iter().fold(FNV_OFFSET_BASIS, |acc, &byte| {
        (acc ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
