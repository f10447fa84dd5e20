//! The consensus-state handle and the block connect/disconnect paths.
//!
//! One block's full validation commits or discards atomically: every
//! check runs against the parent state, and only a fully validated block
//! writes its record, serials, and supply in a single batch. Callers hold
//! the node's chain-state lock around these entry points.

use std::collections::HashSet;
use std::sync::Arc;

use primitive_types::U256;
use rayon::prelude::*;
use vitaed_chain::index::BlockHeaderData;
use vitaed_chain::{store as chain_store, ActiveChain, BlockId, BlockIndex};
use vitaed_consensus::ConsensusParams;
use vitaed_pow::validation::validate_pow_header;
use vitaed_primitives::block::{merkle_root, Block};
use vitaed_primitives::hash::sha256d;
use vitaed_primitives::script;
use vitaed_stake::kernel::check_proof_of_stake;
use vitaed_stake::modifier::{compute_next_stake_modifier, compute_stake_modifier_v2};
use vitaed_stake::signature::check_block_signature;
use vitaed_stake::{ScriptVerifier, TxResolver};
use vitaed_storage::{KeyValueStore, WriteBatch};
use vitaed_zerocoin::RandomnessProofVerifier;

use crate::serials::ZerocoinIndex;
use crate::spend::{
    check_public_coin_spend_enforced, check_zerocoin_spend, contextual_check_zerocoin_spend,
    ParsedSpend, TxOutSource,
};
use crate::supply::{block_supply_delta, next_zerocoin_supply, InvalidOutpoints};
use crate::ChainStateError;

/// A rejection plus the misbehavior score handed to the peer-banning
/// layer. This core classifies; it never bans.
#[derive(Debug)]
pub struct ValidationFailure {
    pub error: ChainStateError,
    pub dos_score: u32,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (dos {})", self.error, self.dos_score)
    }
}

fn reject(dos_score: u32, error: impl Into<ChainStateError>) -> ValidationFailure {
    ValidationFailure {
        error: error.into(),
        dos_score,
    }
}

/// External collaborators a block connect needs.
pub struct ConnectContext<'a> {
    pub resolver: &'a dyn TxResolver,
    pub scripts: &'a dyn ScriptVerifier,
    pub outputs: &'a (dyn TxOutSource + Sync),
    pub proofs: &'a (dyn RandomnessProofVerifier + Sync),
    pub invalid: &'a InvalidOutpoints,
}

pub struct ChainState<S> {
    store: Arc<S>,
    pub params: ConsensusParams,
    pub index: BlockIndex,
    pub active: ActiveChain,
    zerocoin: ZerocoinIndex<S>,
}

impl<S: KeyValueStore> ChainState<S> {
    pub fn new(store: Arc<S>, params: ConsensusParams) -> Self {
        let zerocoin = ZerocoinIndex::new(Arc::clone(&store));
        Self {
            store,
            params,
            index: BlockIndex::new(),
            active: ActiveChain::new(),
            zerocoin,
        }
    }

    /// Restore the index and active chain from the store.
    pub fn load(store: Arc<S>, params: ConsensusParams) -> Result<Self, ChainStateError> {
        let index = chain_store::load_block_index(store.as_ref())?;
        let tip = chain_store::load_active_tip(store.as_ref(), &index)?;
        let mut active = ActiveChain::new();
        active.set_tip(&index, tip);
        let zerocoin = ZerocoinIndex::new(Arc::clone(&store));
        Ok(Self {
            store,
            params,
            index,
            active,
            zerocoin,
        })
    }

    pub fn zerocoin(&self) -> &ZerocoinIndex<S> {
        &self.zerocoin
    }

    /// Validate `block` as the next block of the active chain and commit
    /// it. Any failure leaves every piece of state untouched.
    pub fn connect_block(
        &mut self,
        block: &Block,
        ctx: &ConnectContext<'_>,
    ) -> Result<BlockId, ValidationFailure> {
        let prev = self.active.tip();
        let prev_height = prev.map(|id| self.index.get(id).height).unwrap_or(-1);
        let height = prev_height + 1;
        let rules = self.params.rules_at(height);

        match prev {
            Some(prev) => {
                if block.header.prev_block != self.index.get(prev).hash {
                    return Err(reject(
                        0,
                        ChainStateError::InvalidBlock("block does not extend the active tip"),
                    ));
                }
            }
            None => {
                if block.header.prev_block != [0u8; 32] {
                    return Err(reject(
                        0,
                        ChainStateError::InvalidBlock("first block must be genesis"),
                    ));
                }
            }
        }

        if block.transactions.is_empty() {
            return Err(reject(
                100,
                ChainStateError::InvalidBlock("block has no transactions"),
            ));
        }

        let proof_of_stake = block.is_proof_of_stake();
        if height > self.params.last_pow_block && !proof_of_stake {
            return Err(reject(
                100,
                ChainStateError::InvalidBlock("proof of work past the last pow height"),
            ));
        }
        if proof_of_stake && height <= self.params.last_pow_block {
            return Err(reject(
                100,
                ChainStateError::InvalidBlock("premature proof of stake"),
            ));
        }

        let txids: Vec<_> = block.transactions.iter().map(|tx| tx.txid()).collect();
        let (root, mutated) = merkle_root(&txids);
        if mutated {
            return Err(reject(
                100,
                ChainStateError::InvalidBlock("duplicate transaction"),
            ));
        }
        if root != block.header.merkle_root {
            return Err(reject(
                100,
                ChainStateError::InvalidBlock("merkle root mismatch"),
            ));
        }

        let stake_input = if proof_of_stake {
            let (_, input) = check_proof_of_stake(
                block,
                prev_height,
                &self.index,
                &self.active,
                &self.params,
                ctx.resolver,
                ctx.scripts,
            )
            .map_err(|err| reject(100, err))?;
            if !check_block_signature(block) {
                return Err(reject(
                    100,
                    ChainStateError::InvalidBlock("bad proof of stake block signature"),
                ));
            }
            Some(input)
        } else {
            validate_pow_header(&block.header, height, &self.params)
                .map_err(|err| reject(50, err))?;
            if !block.signature.is_empty() {
                return Err(reject(
                    100,
                    ChainStateError::InvalidBlock("proof of work block carries a signature"),
                ));
            }
            None
        };

        let spends = self.validate_zerocoin_spends(block, &rules, ctx)?;

        // all checks passed; derive the new record and commit in one batch
        let parent_record = prev.map(|id| self.index.get(id).clone());
        let zc_supply = next_zerocoin_supply(
            block,
            parent_record.as_ref(),
            height,
            &self.params,
            ctx.invalid,
        )
        .map_err(|err| reject(100, err))?;
        let money_supply = parent_record
            .as_ref()
            .map(|record| record.money_supply)
            .unwrap_or(0)
            + block_supply_delta(block, ctx.outputs).map_err(|err| reject(0, err))?;

        // a block disconnected earlier is still indexed; reuse its record
        let hash = block.header.hash();
        let id = match self.index.lookup(&hash) {
            Some(id) => id,
            None => self
                .index
                .insert(BlockHeaderData {
                    hash,
                    prev_hash: block.header.prev_block,
                    time: block.header.time,
                    bits: block.header.bits,
                    version: block.header.version,
                    accumulator_checkpoint: block.header.accumulator_checkpoint,
                    proof_of_stake,
                })
                .map_err(|err| reject(0, err))?,
        };

        if rules.stake_modifier_v2 {
            let kernel = match &stake_input {
                Some(input) => input.uniqueness_bytes(),
                None => block.header.hash().to_vec(),
            };
            let prev_modifier = parent_record
                .as_ref()
                .map(|record| record.stake_modifier_v2)
                .unwrap_or([0u8; 32]);
            self.index.get_mut(id).stake_modifier_v2 =
                compute_stake_modifier_v2(&kernel, &prev_modifier);
        } else {
            let (modifier, generated) =
                compute_next_stake_modifier(&self.index, prev, &self.params)
                    .map_err(|err| reject(0, err))?;
            self.index.get_mut(id).set_stake_modifier_v1(modifier, generated);
        }

        {
            let record = self.index.get_mut(id);
            record.zc_supply = zc_supply;
            record.money_supply = money_supply;
        }

        let mut batch = WriteBatch::new();
        chain_store::put_record(&mut batch, &self.index, self.index.get(id));
        chain_store::set_height_hash(&mut batch, height, &self.index.get(id).hash);
        for (tx_index, parsed) in &spends {
            self.zerocoin
                .put_serial(&mut batch, parsed.spend.serial, &txids[*tx_index]);
        }
        for (tx_index, tx) in block.transactions.iter().enumerate() {
            for out in &tx.vout {
                if out.is_zerocoin_mint() {
                    let pubcoin = script::zerocoin_payload(&out.script_pubkey).unwrap_or(&[]);
                    self.zerocoin
                        .put_mint(&mut batch, &sha256d(pubcoin), &txids[tx_index]);
                }
            }
        }
        self.zerocoin
            .put_supply_snapshot(&mut batch, &zc_supply, money_supply);
        self.store
            .write_batch(&batch)
            .map_err(|err| reject(0, err))?;

        self.active.set_tip(&self.index, Some(id));
        Ok(id)
    }

    /// Undo the tip: drop its serials, mints, and height entry, and point
    /// the active chain at its parent. The record itself stays indexed.
    pub fn disconnect_block(&mut self, block: &Block) -> Result<(), ChainStateError> {
        let tip = self
            .active
            .tip()
            .ok_or(ChainStateError::InvalidBlock("no tip to disconnect"))?;
        let record = self.index.get(tip);
        if record.hash != block.header.hash() {
            return Err(ChainStateError::InvalidBlock(
                "disconnect block is not the tip",
            ));
        }

        let mut batch = WriteBatch::new();
        for tx in &block.transactions {
            for txin in &tx.vin {
                if !txin.has_zerocoin_spend() {
                    continue;
                }
                if let Some(serial) = spent_serial(txin) {
                    self.zerocoin.delete_serial(&mut batch, serial);
                }
            }
            for out in &tx.vout {
                if out.is_zerocoin_mint() {
                    let pubcoin = script::zerocoin_payload(&out.script_pubkey).unwrap_or(&[]);
                    self.zerocoin.delete_mint(&mut batch, &sha256d(pubcoin));
                }
            }
        }
        chain_store::clear_height_hash(&mut batch, record.height);
        let prev = record.prev;
        if let Some(prev) = prev {
            let parent = self.index.get(prev);
            self.zerocoin
                .put_supply_snapshot(&mut batch, &parent.zc_supply, parent.money_supply);
        }
        self.store.write_batch(&batch)?;

        self.active.set_tip(&self.index, prev);
        Ok(())
    }

    fn validate_zerocoin_spends(
        &self,
        block: &Block,
        rules: &vitaed_consensus::ActiveRules,
        ctx: &ConnectContext<'_>,
    ) -> Result<Vec<(usize, ParsedSpend)>, ValidationFailure> {
        let spending: Vec<usize> = block
            .transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| tx.has_zerocoin_spend_inputs())
            .map(|(tx_index, _)| tx_index)
            .collect();
        if spending.is_empty() {
            return Ok(Vec::new());
        }
        if !rules.zerocoin_active {
            return Err(reject(
                100,
                ChainStateError::InvalidBlock("zerocoin spend before activation"),
            ));
        }

        // structural checks are independent per transaction
        let parsed: Vec<(usize, Vec<ParsedSpend>)> = spending
            .par_iter()
            .map(|tx_index| {
                check_zerocoin_spend(
                    &block.transactions[*tx_index],
                    true,
                    &self.params,
                    ctx.outputs,
                    ctx.proofs,
                )
                .map(|spends| (*tx_index, spends))
            })
            .collect::<Result<_, _>>()
            .map_err(|err| reject(100, err))?;

        let mut seen: HashSet<U256> = HashSet::new();
        let mut flattened = Vec::new();
        for (tx_index, spends) in parsed {
            let tx = &block.transactions[tx_index];
            for spend in spends {
                check_public_coin_spend_enforced(rules, spend.is_public)
                    .map_err(|err| reject(100, err))?;
                contextual_check_zerocoin_spend(tx, &spend, rules, Some(&self.zerocoin))
                    .map_err(|err| reject(100, err))?;
                if !seen.insert(spend.spend.serial) {
                    return Err(reject(100, crate::spend::ZerocoinError::DoubleSpend));
                }
                flattened.push((tx_index, spend));
            }
        }
        Ok(flattened)
    }
}

/// Serial revealed by a spend input, for disconnect bookkeeping.
fn spent_serial(txin: &vitaed_primitives::transaction::TxIn) -> Option<U256> {
    use vitaed_zerocoin::spend::CoinSpend;
    let payload = script::zerocoin_payload(&txin.script_sig)?;
    if txin.is_zerocoin_public_spend() {
        let mut decoder = vitaed_primitives::encoding::Decoder::new(payload);
        let spend_bytes = decoder.read_var_bytes().ok()?;
        CoinSpend::consensus_decode(&spend_bytes)
            .ok()
            .map(|spend| spend.serial)
    } else {
        CoinSpend::consensus_decode(payload)
            .ok()
            .map(|spend| spend.serial)
    }
}
