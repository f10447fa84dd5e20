//! Accumulator checkpoint parsing.
//!
//! A block header carries one 256-bit aggregate checkpoint: eight 32-bit
//! checksums, one per denomination, packed most-significant-first in
//! denomination order.

use primitive_types::U256;
use vitaed_consensus::Hash256;

use crate::denomination::{Denomination, DENOMINATIONS};

/// The 32-bit checksum for one denomination inside an aggregate
/// checkpoint. `Error` yields zero.
pub fn parse_acc_checksum(checkpoint: &Hash256, denomination: Denomination) -> u32 {
    let Some(position) = denomination.index() else {
        return 0;
    };
    let value = U256::from_little_endian(checkpoint);
    let shifted = value >> (32 * (DENOMINATIONS.len() - 1 - position));
    shifted.low_u32()
}

/// Pack per-denomination checksums into an aggregate checkpoint.
pub fn assemble_checkpoint(checksums: &[u32; 8]) -> Hash256 {
    let mut value = U256::zero();
    for checksum in checksums {
        value = (value << 32) | U256::from(*checksum);
    }
    value.to_little_endian()
}
