//! Stake modifier computation.
//!
//! The modifier mixes unpredictable chain history into every kernel hash
//! so a coin owner cannot precompute future staking opportunities. Two
//! algorithms exist: the legacy 64-round selection (v1), recomputed at
//! most once per interval, and the v2 scheme where each block stores a
//! 256-bit modifier derived from its kernel and the previous modifier.

use std::collections::HashSet;

use primitive_types::U256;
use vitaed_chain::{ActiveChain, BlockId, BlockIndex};
use vitaed_consensus::constants::{
    MODIFIER_INTERVAL, MODIFIER_INTERVAL_RATIO, MODIFIER_SELECTION_ROUNDS, OLD_MODIFIER_INTERVAL,
};
use vitaed_consensus::{ConsensusParams, Hash256};
use vitaed_primitives::encoding::Encoder;
use vitaed_primitives::hash::sha256d;

use crate::input::StakeInput;
use crate::StakeError;

/// Modifier granted to the first block after genesis.
const FIRST_MODIFIER: u64 = u64::from_le_bytes(*b"stakemod");

/// V2 modifier stored on a newly connected block: hash of the block's
/// kernel material and the parent's modifier.
pub fn compute_stake_modifier_v2(kernel: &[u8], prev_modifier: &Hash256) -> Hash256 {
    let mut encoder = Encoder::new();
    encoder.write_bytes(kernel);
    encoder.write_hash_le(prev_modifier);
    sha256d(&encoder.into_inner())
}

/// Per-round section length of the legacy selection schedule. Early rounds
/// get short sections, later rounds a full interval; the sum is
/// `OLD_MODIFIER_INTERVAL`.
fn selection_interval_section(section: usize) -> i64 {
    MODIFIER_INTERVAL * 63
        / (63 + ((63 - section as i64) * (MODIFIER_INTERVAL_RATIO - 1)))
}

/// Hash deciding which candidate a selection round picks. Proof-of-stake
/// candidates get a 2^32 advantage to preserve the energy-efficiency goal.
fn selection_hash(proof: &Hash256, prev_modifier: u64, proof_of_stake: bool) -> U256 {
    let mut encoder = Encoder::new();
    encoder.write_hash_le(proof);
    encoder.write_u64_le(prev_modifier);
    let digest = sha256d(&encoder.into_inner());
    let value = U256::from_little_endian(&digest);
    if proof_of_stake {
        value >> 32
    } else {
        value
    }
}

/// Compute the legacy modifier for the block following `prev`. Returns the
/// modifier and whether this block generated a fresh one.
pub fn compute_next_stake_modifier(
    index: &BlockIndex,
    prev: Option<BlockId>,
    params: &ConsensusParams,
) -> Result<(u64, bool), StakeError> {
    let Some(prev) = prev else {
        // genesis block's modifier is 0
        return Ok((0, true));
    };
    let prev_record = index.get(prev);
    if prev_record.height == 0 {
        return Ok((FIRST_MODIFIER, true));
    }

    // find the current modifier and its generation time
    let mut walk = prev;
    loop {
        let record = index.get(walk);
        if record.generated_stake_modifier() || record.prev.is_none() {
            break;
        }
        walk = record.prev.expect("checked prev");
    }
    let generator = index.get(walk);
    if !generator.generated_stake_modifier() {
        return Err(StakeError::ModifierUnavailable);
    }
    let modifier = generator.stake_modifier_v1;
    let modifier_time = generator.block_time();

    // still inside the same interval bucket: reuse unchanged. This is the
    // deliberate shortcut that keeps every node on one modifier per bucket.
    if modifier_time / MODIFIER_INTERVAL >= prev_record.block_time() / MODIFIER_INTERVAL {
        return Ok((modifier, false));
    }

    // candidates inside the trailing selection window, (time, hash) ascending
    let selection_start =
        (prev_record.block_time() / MODIFIER_INTERVAL) * MODIFIER_INTERVAL - OLD_MODIFIER_INTERVAL;
    let mut candidates: Vec<BlockId> = Vec::new();
    let mut cursor = Some(prev);
    while let Some(id) = cursor {
        let record = index.get(id);
        if record.block_time() < selection_start {
            break;
        }
        candidates.push(id);
        cursor = record.prev;
    }
    candidates.sort_by(|a, b| {
        let left = index.get(*a);
        let right = index.get(*b);
        left.block_time()
            .cmp(&right.block_time())
            .then_with(|| vitaed_pow::compact::cmp_be(&left.hash, &right.hash))
    });

    if candidates.is_empty() {
        return Err(StakeError::ModifierUnavailable);
    }

    // once the lowest candidate passes the switch height, every candidate
    // hashes its block hash; before it, proof-of-stake candidates hash zero
    let new_selection = index.get(candidates[0]).height
        >= params.height_start_new_modifier_selection;

    let mut new_modifier = 0u64;
    let mut selected: HashSet<BlockId> = HashSet::new();
    let mut stop = selection_start;
    let rounds = MODIFIER_SELECTION_ROUNDS.min(candidates.len());
    for round in 0..rounds {
        stop += selection_interval_section(round);

        let mut best: Option<(U256, BlockId)> = None;
        for id in &candidates {
            let record = index.get(*id);
            if best.is_some() && record.block_time() > stop {
                break;
            }
            if selected.contains(id) {
                continue;
            }
            let proof = if new_selection || !record.is_proof_of_stake() {
                record.hash
            } else {
                [0u8; 32]
            };
            let hash = selection_hash(&proof, modifier, record.is_proof_of_stake());
            match &best {
                Some((best_hash, _)) if hash >= *best_hash => {}
                _ => best = Some((hash, *id)),
            }
        }

        let Some((_, chosen)) = best else {
            return Err(StakeError::ModifierUnavailable);
        };
        if index.get(chosen).stake_entropy_bit() {
            new_modifier |= 1u64 << round;
        }
        selected.insert(chosen);
    }

    Ok((new_modifier, true))
}

/// The legacy modifier consumed by a kernel check: the modifier generated
/// about a selection interval after the staked coin's origin block.
pub fn kernel_modifier_v1(
    index: &BlockIndex,
    active: &ActiveChain,
    input: &StakeInput,
    params: &ConsensusParams,
) -> Result<u64, StakeError> {
    if params.is_regtest() {
        return Ok(0);
    }

    match input {
        StakeInput::LegacyZerocoin { origin, .. } => {
            // first accumulator checkpoint at least an hour past the origin
            let origin_time = index.get(*origin).block_time();
            let stop_height = active
                .height()
                .min(params.height_last_zc_accum_checkpoint - 1);
            let mut walk = *origin;
            while index.get(walk).height + 1 <= stop_height {
                let record = index.get(walk);
                if record.block_time() - origin_time > 60 * 60 {
                    let mut low = [0u8; 8];
                    low.copy_from_slice(&record.accumulator_checkpoint[..8]);
                    return Ok(u64::from_le_bytes(low));
                }
                walk = active
                    .next(index, walk)
                    .ok_or(StakeError::ModifierUnavailable)?;
            }
            Err(StakeError::ModifierUnavailable)
        }
        StakeInput::Utxo { origin, .. } => {
            let origin_time = index.get(*origin).block_time();
            let mut modifier_time = origin_time;
            let mut walk = *origin;
            loop {
                walk = active
                    .next(index, walk)
                    .ok_or(StakeError::ModifierUnavailable)?;
                let record = index.get(walk);
                if record.generated_stake_modifier() {
                    modifier_time = record.block_time();
                }
                if modifier_time >= origin_time + OLD_MODIFIER_INTERVAL {
                    break;
                }
            }
            Ok(index.get(walk).stake_modifier_v1)
        }
    }
}
