//! Block trust scoring.
//!
//! Cumulative chain selection weighs proof-of-stake blocks far above
//! proof-of-work blocks of the same target: PoW trust is scaled down by a
//! fixed 2^20 shift so stake dominates chain trust once staking begins.

use primitive_types::U256;

use crate::compact::compact_to_u256;

/// Trust contributed by one block, from its compact target.
///
/// Proof-of-stake: `2^256 / (target + 1)`.
/// Proof-of-work: `max(1, (2^256 - 1 >> 20) / (target + 1))`.
/// An undecodable or zero target contributes nothing.
pub fn block_trust(bits: u32, proof_of_stake: bool) -> U256 {
    let target = match compact_to_u256(bits) {
        Ok(target) => target,
        Err(_) => return U256::zero(),
    };
    if target.is_zero() {
        return U256::zero();
    }

    let one = U256::from(1u64);
    if proof_of_stake {
        // 2^256 / (x+1) computed without the 257-bit numerator
        (!target / (target + one)) + one
    } else {
        let trust = (U256::MAX >> 20) / (target + one);
        if trust > one {
            trust
        } else {
            one
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stake_trust_dominates_work_trust_at_equal_target() {
        for bits in [0x1e0ffff0u32, 0x1d00ffff, 0x1c05a3f4] {
            let pos = block_trust(bits, true);
            let pow = block_trust(bits, false);
            assert!(pow < pos, "bits {bits:#x}");
            assert!(!pow.is_zero());
        }
    }

    #[test]
    fn work_trust_floors_at_one() {
        // easiest possible target: trust would round to zero without the floor
        let pow = block_trust(0x207fffff, false);
        assert_eq!(pow, U256::from(1u64));
    }

    #[test]
    fn invalid_target_contributes_nothing() {
        assert_eq!(block_trust(0x2000_0000, true), U256::zero());
        assert_eq!(block_trust(0x0180_0000, false), U256::zero());
    }

    #[test]
    fn stake_trust_matches_closed_form_on_small_targets() {
        // target = 1 => 2^256 / 2 = 2^255
        let trust = block_trust(0x0101_0000, true);
        assert_eq!(trust, U256::from(1u64) << 255);
    }
}
