//! Content digests for width-bounded encrypted slots.
//!
//! Free-form text cannot be stored in an encrypted integer, so it is reduced
//! to Keccak-256 and then taken modulo `2^W` for the slot width `W`. The
//! reduction is arithmetic on the big-endian integer: the result is the
//! low-order `W` bits, never a prefix slice of the hash bytes.

use sha3::{Digest, Keccak256};

/// Keccak-256 (the pre-standard SHA-3 variant used by EVM chains).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Interpret `bytes` as a big-endian integer and reduce it modulo `2^bits`.
///
/// `bits` is clamped to `1..=128`.
pub fn reduce_mod_pow2(bytes: &[u8], bits: u32) -> u128 {
    let bits = bits.clamp(1, 128);
    // shifting a u128 left discards the high bits, i.e. folds mod 2^128
    let folded = bytes
        .iter()
        .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte));
    if bits == 128 {
        folded
    } else {
        folded % (1u128 << bits)
    }
}

/// Digest of `text` that fits a `bits`-wide encrypted slot.
pub fn content_digest(text: &str, bits: u32) -> u128 {
    reduce_mod_pow2(&keccak256(text.as_bytes()), bits)
}
