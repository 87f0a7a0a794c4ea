//! Bit layout calculation
//!
//! Matrices give a signal's position as a start byte plus a bit inside that
//! byte. DBC wants one absolute start bit. The conversion always uses the
//! Intel numbering (`byte * 8 + bit`), whatever byte order the row declares;
//! the declared order is kept on the signal as metadata only.

use crate::types::ByteOrder;

/// Absolute start bit for a (start byte, bit within byte) pair
///
/// The byte order argument does not change the result. `None` when the
/// position does not fit in a `u32`.
pub fn absolute_start_bit(start_byte: u32, bit_in_byte: u32, _byte_order: ByteOrder) -> Option<u32> {
    start_byte.checked_mul(8)?.checked_add(bit_in_byte)
}

/// Check whether a signal fits in a payload of `capacity_bits`
///
/// Used for warnings only; nothing is rejected on this basis.
pub fn fits_in_payload(start_bit: u32, length: u32, capacity_bits: u32) -> bool {
    start_bit
        .checked_add(length)
        .is_some_and(|end| end <= capacity_bits)
}
