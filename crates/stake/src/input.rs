//! The two kinds of coinstake input behind one interface.

use vitaed_chain::{ActiveChain, BlockId, BlockIndex};
use vitaed_consensus::money::Amount;
use vitaed_consensus::{ConsensusParams, Hash256};
use vitaed_primitives::encoding::Encoder;
use vitaed_primitives::script;
use vitaed_primitives::transaction::{Transaction, TxIn};
use vitaed_zerocoin::checkpoint::parse_acc_checksum;
use vitaed_zerocoin::denomination::Denomination;
use vitaed_zerocoin::spend::CoinSpend;

use crate::StakeError;

/// External script-interpreter capability verifying a standard unlocking
/// script against the output it spends.
pub trait ScriptVerifier {
    fn verify_unlock(
        &self,
        script_sig: &[u8],
        script_pubkey: &[u8],
        tx: &Transaction,
        input_index: usize,
    ) -> bool;
}

/// External transaction lookup: a confirmed transaction and the hash of
/// the block that contains it.
pub trait TxResolver {
    fn transaction(&self, txid: &Hash256) -> Option<(Transaction, Hash256)>;
}

/// The economic input behind one coinstake.
#[derive(Clone, Debug)]
pub enum StakeInput {
    /// A standard spendable output.
    Utxo {
        txid: Hash256,
        vout_index: u32,
        value: Amount,
        script_pubkey: Vec<u8>,
        origin: BlockId,
    },
    /// A legacy anonymous coin, identified only by its denomination,
    /// accumulator binding, and hashed serial.
    LegacyZerocoin {
        denomination: Denomination,
        checksum: u32,
        serial_hash: Hash256,
        origin: BlockId,
    },
}

impl StakeInput {
    pub fn is_zerocoin(&self) -> bool {
        matches!(self, StakeInput::LegacyZerocoin { .. })
    }

    pub fn origin_block(&self) -> BlockId {
        match self {
            StakeInput::Utxo { origin, .. } => *origin,
            StakeInput::LegacyZerocoin { origin, .. } => *origin,
        }
    }

    pub fn value(&self) -> Amount {
        match self {
            StakeInput::Utxo { value, .. } => *value,
            StakeInput::LegacyZerocoin { denomination, .. } => denomination.amount(),
        }
    }

    /// Age/depth rule for this input staking on top of `tip_height`.
    pub fn verify_maturity(
        &self,
        index: &BlockIndex,
        tip_height: i32,
        new_block_time: i64,
        params: &ConsensusParams,
    ) -> bool {
        let origin = index.get(self.origin_block());
        params.has_stake_min_age_or_depth(
            tip_height + 1,
            new_block_time,
            origin.height,
            origin.block_time(),
        )
    }

    /// The byte-uniqueness token hashed into the kernel. Stable across
    /// calls: the outpoint for a standard stake, the hashed serial for an
    /// anonymous one.
    pub fn uniqueness_bytes(&self) -> Vec<u8> {
        match self {
            StakeInput::Utxo {
                txid, vout_index, ..
            } => {
                let mut encoder = Encoder::new();
                encoder.write_u32_le(*vout_index);
                encoder.write_hash_le(txid);
                encoder.into_inner()
            }
            StakeInput::LegacyZerocoin { serial_hash, .. } => serial_hash.to_vec(),
        }
    }
}

/// Build and context-check the stake input of a proof-of-stake block's
/// coinstake transaction.
pub fn init_stake_input(
    coinstake: &Transaction,
    prev_height: i32,
    index: &BlockIndex,
    active: &ActiveChain,
    params: &ConsensusParams,
    resolver: &dyn TxResolver,
    scripts: &dyn ScriptVerifier,
) -> Result<StakeInput, StakeError> {
    if !coinstake.is_coinstake() {
        return Err(StakeError::BadStakeInput("transaction is not a coinstake"));
    }
    let txin = &coinstake.vin[0];

    if txin.is_zerocoin_spend() {
        init_zerocoin_stake(txin, prev_height, index, active, params)
    } else {
        init_utxo_stake(coinstake, txin, index, active, resolver, scripts)
    }
}

fn init_utxo_stake(
    coinstake: &Transaction,
    txin: &TxIn,
    index: &BlockIndex,
    active: &ActiveChain,
    resolver: &dyn TxResolver,
    scripts: &dyn ScriptVerifier,
) -> Result<StakeInput, StakeError> {
    let (prev_tx, block_hash) = resolver
        .transaction(&txin.prevout.hash)
        .ok_or(StakeError::OriginNotFound)?;
    let origin = index
        .lookup(&block_hash)
        .filter(|id| active.contains(index, *id))
        .ok_or(StakeError::OriginNotFound)?;

    let prev_out = prev_tx
        .vout
        .get(txin.prevout.index as usize)
        .ok_or(StakeError::BadStakeInput("stake prevout index out of range"))?;

    if !scripts.verify_unlock(&txin.script_sig, &prev_out.script_pubkey, coinstake, 0) {
        return Err(StakeError::ScriptInvalid);
    }

    Ok(StakeInput::Utxo {
        txid: txin.prevout.hash,
        vout_index: txin.prevout.index,
        value: prev_out.value,
        script_pubkey: prev_out.script_pubkey.clone(),
        origin,
    })
}

fn init_zerocoin_stake(
    txin: &TxIn,
    prev_height: i32,
    index: &BlockIndex,
    active: &ActiveChain,
    params: &ConsensusParams,
) -> Result<StakeInput, StakeError> {
    let payload = script::zerocoin_payload(&txin.script_sig)
        .ok_or(StakeError::BadStakeInput("zerocoin stake without payload"))?;
    let spend = CoinSpend::consensus_decode(payload)
        .map_err(|_| StakeError::BadStakeInput("undecodable zerocoin stake"))?;
    if spend.denomination == Denomination::Error {
        return Err(StakeError::BadStakeInput("unknown stake denomination"));
    }

    // anonymous staking only existed between serials-v2 activation and the
    // last accumulator checkpoint
    if prev_height < params.height_start_zc_serials_v2
        || prev_height > params.height_last_zc_accum_checkpoint
    {
        return Err(StakeError::OutsideEligibilityWindow);
    }

    // the proof must bind to the accumulator state required-depth blocks
    // behind the tip, so the staked coin is provably old
    let checkpoint_height = prev_height - params.zc_required_stake_depth;
    let checkpoint_block = active
        .at(checkpoint_height)
        .ok_or(StakeError::OriginNotFound)?;
    let expected = parse_acc_checksum(
        &index.get(checkpoint_block).accumulator_checkpoint,
        spend.denomination,
    );
    if expected != spend.accumulator_checksum {
        return Err(StakeError::AccumulatorMismatch);
    }

    let origin = first_checksum_block(index, active, checkpoint_height, spend.denomination, expected)
        .ok_or(StakeError::OriginNotFound)?;

    Ok(StakeInput::LegacyZerocoin {
        denomination: spend.denomination,
        checksum: spend.accumulator_checksum,
        serial_hash: spend.serial_hash(),
        origin,
    })
}

/// First block whose checkpoint carries `checksum` for `denomination`,
/// scanning back from `from_height`.
fn first_checksum_block(
    index: &BlockIndex,
    active: &ActiveChain,
    from_height: i32,
    denomination: Denomination,
    checksum: u32,
) -> Option<BlockId> {
    let mut found = active.at(from_height)?;
    let mut height = from_height;
    while height > 0 {
        let candidate = active.at(height - 1)?;
        if parse_acc_checksum(&index.get(candidate).accumulator_checkpoint, denomination)
            != checksum
        {
            break;
        }
        found = candidate;
        height -= 1;
    }
    Some(found)
}
