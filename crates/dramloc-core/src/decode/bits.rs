//! Bit manipulation helpers shared by the decoding stages.

/// Keeps only the bits of `value` selected by `mask`, packed towards bit 0.
///
/// The bits of `value` at positions where `mask` has a 1 are emitted in ascending order,
/// starting at bit 0 of the result. Bits at positions where `mask` has a 0 are removed.
/// The result therefore has at most `mask.count_ones()` significant bits.
///
/// # Examples
///
/// ```
/// use dramloc_core::decode::compact_masked_bits;
///
/// assert_eq!(compact_masked_bits(0b1011, 0b1010), 0b11);
/// assert_eq!(compact_masked_bits(0b1011, 0b0101), 0b01);
/// assert_eq!(compact_masked_bits(0xdead_beef, u64::MAX), 0xdead_beef);
/// ```
pub fn compact_masked_bits(value: u64, mask: u64) -> u64 {
    let mut out = 0;
    let mut pos = 0;
    let mut mask = mask;
    while mask != 0 {
        let bit = mask.trailing_zeros();
        out |= ((value >> bit) & 1) << pos;
        pos += 1;
        mask &= mask - 1;
    }
    out
}

/// Returns bit `n` of `value`.
#[inline]
pub(crate) fn bit(value: u64, n: u32) -> u8 {
    ((value >> n) & 1) as u8
}

/// XOR of all bits of `value`.
#[inline]
pub(crate) fn parity(value: u64) -> u8 {
    (value.count_ones() & 1) as u8
}
