//! In-memory block index.
//!
//! Records live in an arena owned by [`BlockIndex`]; parent and skip
//! references are arena indices, never owning pointers, so reorg logic can
//! repoint the active chain without touching record lifetime.

use std::collections::HashMap;

use primitive_types::U256;
use vitaed_consensus::money::Amount;
use vitaed_consensus::Hash256;
use vitaed_pow::trust::block_trust;
use vitaed_zerocoin::denomination::{Denomination, DENOMINATIONS};

use crate::ChainError;

pub type BlockId = usize;

pub const FLAG_PROOF_OF_STAKE: u8 = 1 << 0;
pub const FLAG_STAKE_ENTROPY: u8 = 1 << 1;
pub const FLAG_GENERATED_MODIFIER: u8 = 1 << 2;

#[derive(Clone, Debug)]
pub struct BlockRecord {
    pub hash: Hash256,
    pub prev: Option<BlockId>,
    pub skip: Option<BlockId>,
    pub height: i32,
    pub time: u32,
    pub bits: u32,
    pub version: i32,
    pub flags: u8,
    pub stake_modifier_v1: u64,
    pub stake_modifier_v2: Hash256,
    pub accumulator_checkpoint: Hash256,
    pub chain_trust: U256,
    pub money_supply: Amount,
    /// Outstanding anonymous coins per denomination.
    pub zc_supply: [i64; 8],
}

impl BlockRecord {
    pub fn is_proof_of_stake(&self) -> bool {
        (self.flags & FLAG_PROOF_OF_STAKE) != 0
    }

    pub fn stake_entropy_bit(&self) -> bool {
        (self.flags & FLAG_STAKE_ENTROPY) != 0
    }

    pub fn generated_stake_modifier(&self) -> bool {
        (self.flags & FLAG_GENERATED_MODIFIER) != 0
    }

    pub fn block_time(&self) -> i64 {
        self.time as i64
    }

    pub fn set_stake_modifier_v1(&mut self, modifier: u64, generated: bool) {
        self.stake_modifier_v1 = modifier;
        if generated {
            self.flags |= FLAG_GENERATED_MODIFIER;
        }
    }

    pub fn zc_mints(&self, denomination: Denomination) -> i64 {
        match denomination.index() {
            Some(position) => self.zc_supply[position],
            None => 0,
        }
    }

    pub fn zc_supply_amount(&self) -> Amount {
        DENOMINATIONS
            .iter()
            .map(|denom| self.zc_mints(*denom) * denom.amount())
            .sum()
    }
}

/// Candidate data for a new index entry.
#[derive(Clone, Debug)]
pub struct BlockHeaderData {
    pub hash: Hash256,
    pub prev_hash: Hash256,
    pub time: u32,
    pub bits: u32,
    pub version: i32,
    pub accumulator_checkpoint: Hash256,
    pub proof_of_stake: bool,
}

#[derive(Default)]
pub struct BlockIndex {
    records: Vec<BlockRecord>,
    by_hash: HashMap<Hash256, BlockId>,
}

fn invert_lowest_one(value: i32) -> i32 {
    value & value.saturating_sub(1)
}

/// Height the skip pointer of a block at `height` jumps to.
pub fn get_skip_height(height: i32) -> i32 {
    if height < 2 {
        0
    } else if (height & 1) != 0 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: BlockId) -> &BlockRecord {
        &self.records[id]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut BlockRecord {
        &mut self.records[id]
    }

    pub fn lookup(&self, hash: &Hash256) -> Option<BlockId> {
        self.by_hash.get(hash).copied()
    }

    /// Index a header whose parent is already known (or genesis).
    pub fn insert(&mut self, header: BlockHeaderData) -> Result<BlockId, ChainError> {
        if self.by_hash.contains_key(&header.hash) {
            return Err(ChainError::DuplicateBlock);
        }

        let (prev, height, prev_trust) = if header.prev_hash == [0u8; 32] {
            (None, 0, U256::zero())
        } else {
            let prev = self
                .lookup(&header.prev_hash)
                .ok_or(ChainError::UnknownParent)?;
            let record = self.get(prev);
            (Some(prev), record.height + 1, record.chain_trust)
        };

        let skip = prev.and_then(|prev| self.ancestor(prev, get_skip_height(height)));

        let mut flags = 0u8;
        if header.proof_of_stake {
            flags |= FLAG_PROOF_OF_STAKE;
        }
        if (header.hash[0] & 1) == 1 {
            flags |= FLAG_STAKE_ENTROPY;
        }

        let id = self.records.len();
        self.records.push(BlockRecord {
            hash: header.hash,
            prev,
            skip,
            height,
            time: header.time,
            bits: header.bits,
            version: header.version,
            flags,
            stake_modifier_v1: 0,
            stake_modifier_v2: [0u8; 32],
            accumulator_checkpoint: header.accumulator_checkpoint,
            chain_trust: prev_trust + block_trust(header.bits, header.proof_of_stake),
            money_supply: 0,
            zc_supply: [0; 8],
        });
        self.by_hash.insert(header.hash, id);
        Ok(id)
    }

    /// Ancestor of `id` at `height`, jumping the skip list where possible.
    pub fn ancestor(&self, id: BlockId, height: i32) -> Option<BlockId> {
        let mut walk = id;
        let mut walk_height = self.get(id).height;
        if height > walk_height || height < 0 {
            return None;
        }

        while walk_height > height {
            let record = self.get(walk);
            let skip_height = get_skip_height(walk_height);
            let skip_prev_height = get_skip_height(walk_height - 1);
            let take_skip = match record.skip {
                Some(_) => {
                    skip_height == height
                        || (skip_height > height
                            && !(skip_prev_height < skip_height - 2 && skip_prev_height >= height))
                }
                None => false,
            };
            if take_skip {
                walk = record.skip.expect("checked skip");
                walk_height = skip_height;
            } else {
                walk = record.prev?;
                walk_height -= 1;
            }
        }
        Some(walk)
    }
}
