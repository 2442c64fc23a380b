//! Bucket hash functions for atomic values.
//!
//! Every function takes a `range` (the bucket count). A range of `0` returns the
//! raw, unreduced hash, which composite hashes (facts, multifields) combine and
//! reduce once at the top level.
//!
//! These are bit-reproducible across platforms: multi-byte inputs are read in
//! little-endian order and bytes are treated as unsigned.

/// Multiplier of the polynomial string hash.
const SYMBOL_MULTIPLIER: u64 = 127;

#[inline]
fn reduce(tally: u64, range: u64) -> u64 {
    if range == 0 {
        tally
    } else {
        tally % range
    }
}

#[inline]
fn polynomial(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |tally, &byte| {
        tally.wrapping_mul(SYMBOL_MULTIPLIER).wrapping_add(byte as u64)
    })
}

/// `h = h * 127 + byte` over the UTF-8 bytes of `word`.
pub fn hash_symbol(word: &str, range: u64) -> u64 {
    reduce(polynomial(word.as_bytes()), range)
}

/// The symbol polynomial over the eight IEEE-754 bytes of `number`.
pub fn hash_float(number: f64, range: u64) -> u64 {
    reduce(polynomial(&number.to_le_bytes()), range)
}

/// Absolute value truncated to 32 bits.
pub fn hash_integer(number: i64, range: u64) -> u64 {
    reduce((number.unsigned_abs() as u32) as u64, range)
}

/// Low 32 bits of the address divided by 256, so that neighbouring aligned
/// addresses share a bucket.
pub fn hash_external_address(address: usize, range: u64) -> u64 {
    reduce(((address as u32) / 256) as u64, range)
}

/// Sum of the bitmap's 64-bit words followed by its remaining bytes.
pub fn hash_bitmap(bitmap: &[u8], range: u64) -> u64 {
    let mut words = bitmap.chunks_exact(8);
    let mut count = 0u64;
    for word in &mut words {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(word);
        count = count.wrapping_add(u64::from_le_bytes(buf));
    }
    for &byte in words.remainder() {
        count = count.wrapping_add(byte as u64);
    }
    reduce(count, range)
}
