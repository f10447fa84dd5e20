//! The stake kernel check.

use primitive_types::U256;
use vitaed_chain::{ActiveChain, BlockId, BlockIndex};
use vitaed_consensus::{ConsensusParams, Hash256};
use vitaed_pow::compact::compact_to_u256;
use vitaed_primitives::block::Block;
use vitaed_primitives::encoding::Encoder;
use vitaed_primitives::hash::sha256d;

use crate::input::{init_stake_input, ScriptVerifier, StakeInput, TxResolver};
use crate::modifier::kernel_modifier_v1;
use crate::slots::time_slot;
use crate::StakeError;

/// The entropy seeding a kernel hash: 64-bit legacy or 256-bit v2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeModifier {
    V1(u64),
    V2(Hash256),
}

/// Hash of `(modifier, origin_block_time, uniqueness, tx_time)`. Every
/// byte matters: two nodes disagreeing on any field diverge here.
pub fn stake_kernel_hash(
    modifier: &StakeModifier,
    origin_time: u32,
    uniqueness: &[u8],
    tx_time: u32,
) -> Hash256 {
    let mut encoder = Encoder::new();
    match modifier {
        StakeModifier::V1(modifier) => encoder.write_u64_le(*modifier),
        StakeModifier::V2(modifier) => encoder.write_hash_le(modifier),
    }
    encoder.write_u32_le(origin_time);
    encoder.write_bytes(uniqueness);
    encoder.write_u32_le(tx_time);
    sha256d(&encoder.into_inner())
}

/// The modifier the next block's kernel must hash with.
pub fn kernel_modifier(
    index: &BlockIndex,
    active: &ActiveChain,
    prev: BlockId,
    input: &StakeInput,
    params: &ConsensusParams,
) -> Result<StakeModifier, StakeError> {
    let next_height = index.get(prev).height + 1;
    if params.is_stake_modifier_v2(next_height) {
        Ok(StakeModifier::V2(index.get(prev).stake_modifier_v2))
    } else {
        kernel_modifier_v1(index, active, input, params).map(StakeModifier::V1)
    }
}

/// Kernel check: the hash must fall below the compact target scaled by
/// `value / 100`, so richer inputs stake proportionally more often.
pub fn check_stake_kernel_hash(
    index: &BlockIndex,
    active: &ActiveChain,
    prev: BlockId,
    bits: u32,
    input: &StakeInput,
    tx_time: u32,
    params: &ConsensusParams,
) -> Result<Hash256, StakeError> {
    let modifier = kernel_modifier(index, active, prev, input, params)?;
    let origin_time = index.get(input.origin_block()).time;
    let hash = stake_kernel_hash(&modifier, origin_time, &input.uniqueness_bytes(), tx_time);

    let target = compact_to_u256(bits).map_err(|_| StakeError::KernelMiss)?;
    let weight = U256::from(input.value() as u64) / U256::from(100u64);
    // 256-bit wrapping multiply, matching the reference arithmetic
    let (weighted_target, _) = target.overflowing_mul(weight);

    if U256::from_little_endian(&hash) < weighted_target {
        Ok(hash)
    } else {
        Err(StakeError::KernelMiss)
    }
}

/// Full proof-of-stake validation of a connected block: build the stake
/// input, enforce maturity, and run the kernel check.
pub fn check_proof_of_stake(
    block: &Block,
    prev_height: i32,
    index: &BlockIndex,
    active: &ActiveChain,
    params: &ConsensusParams,
    resolver: &dyn TxResolver,
    scripts: &dyn ScriptVerifier,
) -> Result<(Hash256, StakeInput), StakeError> {
    let coinstake = block
        .coinstake()
        .ok_or(StakeError::BadStakeInput("block has no coinstake"))?;
    let input = init_stake_input(
        coinstake,
        prev_height,
        index,
        active,
        params,
        resolver,
        scripts,
    )?;

    let prev = index
        .lookup(&block.header.prev_block)
        .ok_or(StakeError::OriginNotFound)?;

    // age/depth gate; legacy anonymous stakes predate the rule
    if !input.is_zerocoin()
        && prev_height >= params.height_start_zc_public_spends - 1
        && !input.verify_maturity(index, prev_height, block.header.time as i64, params)
    {
        return Err(StakeError::StakeTooYoung);
    }

    let hash = check_stake_kernel_hash(
        index,
        active,
        prev,
        block.header.bits,
        &input,
        block.header.time,
        params,
    )?;
    vitaed_log::log_debug!(
        "kernel accepted at height {}: value={} time={}",
        prev_height + 1,
        input.value(),
        block.header.time
    );
    Ok((hash, input))
}

/// Miner path: one staking attempt for `input` at the current time.
/// Returns the coinstake timestamp and kernel hash on success.
pub fn stake(
    index: &BlockIndex,
    active: &ActiveChain,
    prev: BlockId,
    input: &StakeInput,
    bits: u32,
    now: i64,
    params: &ConsensusParams,
) -> Result<(i64, Hash256), StakeError> {
    let prev_record = index.get(prev);
    let next_height = prev_record.height + 1;
    let origin = index.get(input.origin_block());
    if origin.height < 1 {
        return Err(StakeError::OriginNotFound);
    }
    if next_height < origin.height + params.stake_min_depth {
        return Err(StakeError::StakeTooYoung);
    }

    // stake on slot boundaries; permissive test networks use the raw clock
    let tx_time = if params.is_regtest() {
        now
    } else {
        time_slot(now, params)
    };
    if tx_time <= prev_record.block_time() && !params.is_regtest() {
        return Err(StakeError::SlotConflict);
    }

    let hash = check_stake_kernel_hash(
        index,
        active,
        prev,
        bits,
        input,
        tx_time as u32,
        params,
    )?;
    Ok((tx_time, hash))
}

/// Search loop over candidate inputs; first kernel hit wins.
pub fn attempt_stake<'a>(
    index: &BlockIndex,
    active: &ActiveChain,
    prev: BlockId,
    inputs: &'a [StakeInput],
    bits: u32,
    now: i64,
    params: &ConsensusParams,
) -> Option<(&'a StakeInput, i64, Hash256)> {
    for input in inputs {
        match stake(index, active, prev, input, bits, now, params) {
            Ok((tx_time, hash)) => return Some((input, tx_time, hash)),
            Err(StakeError::SlotConflict) => return None,
            Err(_) => continue,
        }
    }
    None
}
