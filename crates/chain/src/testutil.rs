//! Deterministic chain builders for tests in this and downstream crates.

use vitaed_consensus::Hash256;

use crate::index::{BlockHeaderData, BlockId, BlockIndex};

/// Header with a synthetic hash derived from `tag`. Tags above 200 mark
/// the block proof-of-stake, mirroring a chain that switched over.
pub fn test_header(tag: u64, prev_hash: Hash256, time: u32) -> BlockHeaderData {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&tag.to_le_bytes());
    hash[8] = 0xee;
    BlockHeaderData {
        hash,
        prev_hash,
        time,
        bits: 0x1e0ffff0,
        version: 5,
        accumulator_checkpoint: [0u8; 32],
        proof_of_stake: tag > 200,
    }
}

/// Linear chain of `length` blocks at 45-second spacing from a fixed
/// epoch, inserted into `index`.
pub fn build_chain(index: &mut BlockIndex, length: u64) -> Vec<BlockId> {
    let mut ids = Vec::new();
    let mut prev_hash = [0u8; 32];
    for tag in 0..length {
        let header = test_header(tag + 1, prev_hash, 1_000_000 + tag as u32 * 45);
        prev_hash = header.hash;
        ids.push(index.insert(header).expect("insert"));
    }
    ids
}
