//! Supply accounting.
//!
//! Each connected block carries per-denomination counts of outstanding
//! anonymous coins plus the plaintext money supply. Two one-time
//! corrections reproduce historical events: the wrapped-serial inflation
//! after the fake-serial incident, and the filtered-funds adjustment
//! inside the administrative supply recomputation.

use std::collections::HashSet;

use vitaed_chain::{ActiveChain, BlockId, BlockIndex};
use vitaed_consensus::money::{Amount, COIN};
use vitaed_consensus::{ConsensusParams, Hash256, Network};
use vitaed_primitives::block::Block;
use vitaed_primitives::transaction::Transaction;
use vitaed_zerocoin::denomination::{Denomination, DENOMINATIONS};

use crate::spend::TxOutSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupplyError {
    /// A denomination counter would go negative.
    SupplyUnderflow(Denomination),
    MissingBlock(i32),
    MissingPrevOut,
    StartBeyondTip,
}

impl std::fmt::Display for SupplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupplyError::SupplyUnderflow(denom) => write!(
                f,
                "block spends more {}-coins than were ever minted",
                denom.value()
            ),
            SupplyError::MissingBlock(height) => write!(f, "no block data at height {height}"),
            SupplyError::MissingPrevOut => write!(f, "previous output not found during replay"),
            SupplyError::StartBeyondTip => write!(f, "replay start height beyond the tip"),
        }
    }
}

impl std::error::Error for SupplyError {}

/// Outpoints frozen by the historical invalid-coin list.
pub type InvalidOutpoints = HashSet<(Hash256, u32)>;

/// External block-body lookup for the replay procedures.
pub trait BlockSource {
    fn block(&self, hash: &Hash256) -> Option<Block>;
}

fn mint_denominations(block: &Block, filter_invalid: &dyn Fn(&Hash256, u32) -> bool) -> Vec<Denomination> {
    let mut mints = Vec::new();
    for tx in &block.transactions {
        let txid = tx.txid();
        for (index, out) in tx.vout.iter().enumerate() {
            if !out.is_zerocoin_mint() {
                continue;
            }
            if filter_invalid(&txid, index as u32) {
                continue;
            }
            let denom = Denomination::from_amount(out.value);
            if denom != Denomination::Error {
                mints.push(denom);
            }
        }
    }
    mints
}

fn spend_denominations(block: &Block) -> Vec<Denomination> {
    let mut spends = Vec::new();
    for tx in &block.transactions {
        for txin in &tx.vin {
            if txin.has_zerocoin_spend() {
                let denom = Denomination::from_value(txin.sequence as i64);
                if denom != Denomination::Error {
                    spends.push(denom);
                }
            }
        }
    }
    spends
}

/// Per-denomination counters for a block, rolled forward from its parent
/// record using the mints and validated spends in `block`.
pub fn next_zerocoin_supply(
    block: &Block,
    parent: Option<&vitaed_chain::BlockRecord>,
    height: i32,
    params: &ConsensusParams,
    invalid: &InvalidOutpoints,
) -> Result<[i64; 8], SupplyError> {
    let rules = params.rules_at(height);

    // inherit the parent's counters; headers that predate the zerocoin
    // version carry none
    let mut supply = match parent {
        Some(parent) if parent.version > 3 => parent.zc_supply,
        _ => [0i64; 8],
    };

    if parent.is_some() {
        let filter = |txid: &Hash256, vout: u32| {
            rules.filter_invalid_mints && invalid.contains(&(*txid, vout))
        };
        for denom in mint_denominations(block, &filter) {
            if let Some(position) = denom.index() {
                supply[position] += 1;
            }
        }
        for denom in spend_denominations(block) {
            if let Some(position) = denom.index() {
                supply[position] -= 1;
                if supply[position] < 0 {
                    return Err(SupplyError::SupplyUnderflow(denom));
                }
            }
        }
    }

    for (position, denom) in DENOMINATIONS.iter().enumerate() {
        vitaed_log::log_debug!(
            "zc supply at height {}: {} coins of denomination {}",
            height,
            supply[position],
            denom.value()
        );
    }

    // one-time wrapped-serial correction: immediately after the incident
    // window closed, counters are lifted to cover coins duplicated
    // off-chain while serials went unchecked
    let supply_amount: Amount = DENOMINATIONS
        .iter()
        .enumerate()
        .map(|(position, denom)| supply[position] * denom.amount())
        .sum();
    if params.network == Network::Mainnet
        && height == params.height_end_fake_serial + 1
        && supply_amount < params.supply_before_fake_serial + wrapped_inflation_amount(params)
    {
        for (position, denom) in DENOMINATIONS.iter().enumerate() {
            supply[position] += params.wrapped_serial_inflation[position];
            vitaed_log::log_info!(
                "wrapped-serial correction: +{} coins of denomination {}",
                params.wrapped_serial_inflation[position],
                denom.value()
            );
        }
    }

    Ok(supply)
}

/// In-place variant of [`next_zerocoin_supply`] for a record already in
/// the index.
pub fn update_zerocoin_supply(
    block: &Block,
    index: &mut BlockIndex,
    id: BlockId,
    params: &ConsensusParams,
    invalid: &InvalidOutpoints,
) -> Result<(), SupplyError> {
    let record = index.get(id);
    let height = record.height;
    let parent = record.prev.map(|prev| index.get(prev).clone());
    let supply = next_zerocoin_supply(block, parent.as_ref(), height, params, invalid)?;
    index.get_mut(id).zc_supply = supply;
    Ok(())
}

/// Total value of the wrapped-serial correction.
pub fn wrapped_inflation_amount(params: &ConsensusParams) -> Amount {
    DENOMINATIONS
        .iter()
        .enumerate()
        .map(|(position, denom)| params.wrapped_serial_inflation[position] * denom.amount())
        .sum()
}

/// One-time forward sweep applying the wrapped-serial correction to every
/// block already connected past the incident window. Administrative; not
/// part of normal block connect.
pub fn add_wrapped_serials_inflation(
    index: &mut BlockIndex,
    active: &ActiveChain,
    params: &ConsensusParams,
) {
    let chain_height = active.height();
    let mut height = params.height_end_fake_serial;
    if height < 0 || height > chain_height {
        return;
    }
    while height <= chain_height {
        if height % 1_000 == 0 {
            vitaed_log::log_info!("wrapped-serial sweep: block {height}...");
        }
        if let Some(id) = active.at(height) {
            let record = index.get_mut(id);
            for position in 0..DENOMINATIONS.len() {
                record.zc_supply[position] += params.wrapped_serial_inflation[position];
            }
        }
        height += 1;
    }
}

/// Net money-supply delta of one block: outputs minus inputs, with the
/// coinstake's first output exempt and anonymous inputs valued at their
/// denomination.
pub fn block_supply_delta(
    block: &Block,
    outputs: &dyn TxOutSource,
) -> Result<Amount, SupplyError> {
    let mut value_in: Amount = 0;
    let mut value_out: Amount = 0;
    for tx in &block.transactions {
        value_in += transaction_value_in(tx, outputs)?;
        for (index, out) in tx.vout.iter().enumerate() {
            if index == 0 && tx.is_coinstake() {
                continue;
            }
            value_out += out.value;
        }
    }
    Ok(value_out - value_in)
}

fn transaction_value_in(
    tx: &Transaction,
    outputs: &dyn TxOutSource,
) -> Result<Amount, SupplyError> {
    if tx.is_coinbase() {
        return Ok(0);
    }
    let mut value_in: Amount = 0;
    for txin in &tx.vin {
        if txin.has_zerocoin_spend() {
            value_in += txin.sequence as Amount * COIN;
            continue;
        }
        let prev = outputs
            .output(&txin.prevout.hash, txin.prevout.index)
            .ok_or(SupplyError::MissingPrevOut)?;
        value_in += prev.value;
    }
    Ok(value_in)
}

/// Administrative recovery: replay every block from `start_height` and
/// rewrite each record's money supply. At the accumulator-recalculation
/// height the historical filtered-funds addition is applied and the value
/// still locked in invalid outputs is subtracted.
pub fn recalculate_money_supply(
    index: &mut BlockIndex,
    active: &ActiveChain,
    start_height: i32,
    params: &ConsensusParams,
    blocks: &dyn BlockSource,
    outputs: &dyn TxOutSource,
    invalid_unspent_value: Amount,
) -> Result<(), SupplyError> {
    let chain_height = active.height();
    if start_height > chain_height {
        return Err(SupplyError::StartBeyondTip);
    }

    let mut supply_prev = {
        let id = active.at(start_height).ok_or(SupplyError::MissingBlock(start_height))?;
        match index.get(id).prev {
            Some(prev) => index.get(prev).money_supply,
            None => 0,
        }
    };
    if start_height == params.height_start_zc {
        supply_prev = params.money_supply_at_zc_start;
    }

    for height in start_height..=chain_height {
        if height % 1_000 == 0 {
            vitaed_log::log_info!("supply replay: block {height}...");
        }
        let id = active.at(height).ok_or(SupplyError::MissingBlock(height))?;
        let hash = index.get(id).hash;
        let block = blocks.block(&hash).ok_or(SupplyError::MissingBlock(height))?;

        let mut supply = supply_prev + block_supply_delta(&block, outputs)?;

        if height == params.height_recalc_accumulators {
            vitaed_log::log_info!("supply replay: original supply {supply}");
            supply += params.invalid_amount_filtered;
            vitaed_log::log_info!(
                "supply replay: +{} filtered funds, supply {supply}",
                params.invalid_amount_filtered
            );
            supply -= invalid_unspent_value;
            vitaed_log::log_info!(
                "supply replay: -{invalid_unspent_value} locked invalid outputs, supply {supply}"
            );
        }

        index.get_mut(id).money_supply = supply;
        supply_prev = supply;
    }

    Ok(())
}
