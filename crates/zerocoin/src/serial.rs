//! Serial number versioning and validity ranges.
//!
//! Serials are 256-bit values revealed when a coin is spent. Version-2
//! serials carry a 0x0f marker in the top byte and commit to the spender's
//! public key; the numeric range of the remainder is bounded by the group
//! order of the external zerocoin parameter set.

use primitive_types::U256;
use vitaed_primitives::hash::sha256d;

pub const SERIAL_VERSION_V1: u8 = 1;
/// Serials at or above this version embed a public-key commitment.
pub const SERIAL_VERSION_PUBKEY: u8 = 2;

const V2_MARKER: u64 = 0x0f;

/// Group order of the v1 serial commitment group (external parameter set,
/// fixed here as an opaque bound).
pub fn group_order_v1() -> U256 {
    U256::from_big_endian(&[
        0xef, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x43,
    ])
}

/// Group order of the v2 parameter set, bounding the adjusted serial.
pub fn group_order_v2() -> U256 {
    U256::from_big_endian(&[
        0x0e, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x8d,
    ])
}

/// Serials whose top byte carries the 0x0f marker are v2.
pub fn extract_version_from_serial(serial: U256) -> u8 {
    if (serial >> 248) == U256::from(V2_MARKER) {
        SERIAL_VERSION_PUBKEY
    } else {
        SERIAL_VERSION_V1
    }
}

/// The serial with its version marker cleared.
pub fn adjusted_serial(serial: U256) -> U256 {
    serial & (U256::MAX >> 8)
}

/// The v2 serial a given public key commits to.
pub fn serial_from_pubkey(pubkey: &[u8]) -> U256 {
    let digest = sha256d(pubkey);
    let hashed = U256::from_little_endian(&digest) >> 8;
    hashed | (U256::from(V2_MARKER) << 248)
}

/// Numeric range check for the serial's version.
pub fn is_valid_serial(serial: U256) -> bool {
    if serial.is_zero() {
        return false;
    }
    match extract_version_from_serial(serial) {
        SERIAL_VERSION_V1 => serial < group_order_v1(),
        _ => {
            let adjusted = adjusted_serial(serial);
            !adjusted.is_zero() && adjusted < group_order_v2()
        }
    }
}

/// Big-endian byte key used by the confirmed-serial index.
pub fn serial_key(serial: U256) -> [u8; 32] {
    serial.to_big_endian()
}
