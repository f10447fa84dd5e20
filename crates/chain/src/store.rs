//! Block-record persistence through the key-value store.

use primitive_types::U256;
use vitaed_consensus::Hash256;
use vitaed_primitives::encoding::{Decoder, Encoder};
use vitaed_storage::{Column, KeyValueStore, StoreError, WriteBatch};

use crate::index::{BlockHeaderData, BlockId, BlockIndex, BlockRecord, FLAG_PROOF_OF_STAKE};
use crate::ChainError;

pub fn height_key(height: i32) -> [u8; 4] {
    height.to_be_bytes()
}

pub fn put_record(batch: &mut WriteBatch, index: &BlockIndex, record: &BlockRecord) {
    let prev_hash = record
        .prev
        .map(|prev| index.get(prev).hash)
        .unwrap_or([0u8; 32]);
    batch.put(
        Column::BlockIndex,
        record.hash,
        encode_record(record, &prev_hash),
    );
}

pub fn set_height_hash(batch: &mut WriteBatch, height: i32, hash: &Hash256) {
    batch.put(Column::HeightIndex, height_key(height), *hash);
}

pub fn clear_height_hash(batch: &mut WriteBatch, height: i32) {
    batch.delete(Column::HeightIndex, height_key(height));
}

fn encode_record(record: &BlockRecord, prev_hash: &Hash256) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_hash_le(prev_hash);
    encoder.write_i32_le(record.height);
    encoder.write_u32_le(record.time);
    encoder.write_u32_le(record.bits);
    encoder.write_i32_le(record.version);
    encoder.write_u8(record.flags);
    encoder.write_u64_le(record.stake_modifier_v1);
    encoder.write_hash_le(&record.stake_modifier_v2);
    encoder.write_hash_le(&record.accumulator_checkpoint);
    encoder.write_hash_le(&record.chain_trust.to_little_endian());
    encoder.write_i64_le(record.money_supply);
    for count in record.zc_supply {
        encoder.write_i64_le(count);
    }
    encoder.into_inner()
}

struct StoredRecord {
    hash: Hash256,
    prev_hash: Hash256,
    height: i32,
    time: u32,
    bits: u32,
    version: i32,
    flags: u8,
    stake_modifier_v1: u64,
    stake_modifier_v2: Hash256,
    accumulator_checkpoint: Hash256,
    chain_trust: U256,
    money_supply: i64,
    zc_supply: [i64; 8],
}

fn decode_record(hash: Hash256, bytes: &[u8]) -> Result<StoredRecord, ChainError> {
    let mut decoder = Decoder::new(bytes);
    let mut read = || -> Result<StoredRecord, vitaed_primitives::encoding::DecodeError> {
        let prev_hash = decoder.read_hash_le()?;
        let height = decoder.read_i32_le()?;
        let time = decoder.read_u32_le()?;
        let bits = decoder.read_u32_le()?;
        let version = decoder.read_i32_le()?;
        let flags = decoder.read_u8()?;
        let stake_modifier_v1 = decoder.read_u64_le()?;
        let stake_modifier_v2 = decoder.read_hash_le()?;
        let accumulator_checkpoint = decoder.read_hash_le()?;
        let chain_trust = U256::from_little_endian(&decoder.read_hash_le()?);
        let money_supply = decoder.read_i64_le()?;
        let mut zc_supply = [0i64; 8];
        for count in zc_supply.iter_mut() {
            *count = decoder.read_i64_le()?;
        }
        Ok(StoredRecord {
            hash,
            prev_hash,
            height,
            time,
            bits,
            version,
            flags,
            stake_modifier_v1,
            stake_modifier_v2,
            accumulator_checkpoint,
            chain_trust,
            money_supply,
            zc_supply,
        })
    };
    read().map_err(|_| ChainError::Corrupt("truncated block record"))
}

/// Rebuild the in-memory index from every stored record, re-deriving the
/// arena links by inserting parents before children.
pub fn load_block_index<S: KeyValueStore>(store: &S) -> Result<BlockIndex, StoreError> {
    let entries = store.scan_prefix(Column::BlockIndex, &[])?;
    let mut stored = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if key.len() != 32 {
            return Err(StoreError::Backend("bad block index key".to_string()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&key);
        let record = decode_record(hash, &value)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        stored.push(record);
    }
    stored.sort_by_key(|record| record.height);

    let mut index = BlockIndex::new();
    for record in stored {
        let id = index
            .insert(BlockHeaderData {
                hash: record.hash,
                prev_hash: record.prev_hash,
                time: record.time,
                bits: record.bits,
                version: record.version,
                accumulator_checkpoint: record.accumulator_checkpoint,
                proof_of_stake: (record.flags & FLAG_PROOF_OF_STAKE) != 0,
            })
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let entry = index.get_mut(id);
        entry.flags = record.flags;
        entry.stake_modifier_v1 = record.stake_modifier_v1;
        entry.stake_modifier_v2 = record.stake_modifier_v2;
        entry.chain_trust = record.chain_trust;
        entry.money_supply = record.money_supply;
        entry.zc_supply = record.zc_supply;
    }
    Ok(index)
}

/// Best-chain tip restored from the height index.
pub fn load_active_tip<S: KeyValueStore>(
    store: &S,
    index: &BlockIndex,
) -> Result<Option<BlockId>, StoreError> {
    let entries = store.scan_prefix(Column::HeightIndex, &[])?;
    let mut tip: Option<(i32, BlockId)> = None;
    for (key, value) in entries {
        if key.len() != 4 || value.len() != 32 {
            return Err(StoreError::Backend("bad height index entry".to_string()));
        }
        let height = i32::from_be_bytes([key[0], key[1], key[2], key[3]]);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&value);
        let id = index
            .lookup(&hash)
            .ok_or_else(|| StoreError::Backend("height entry without record".to_string()))?;
        if tip.map(|(best, _)| height > best).unwrap_or(true) {
            tip = Some((height, id));
        }
    }
    Ok(tip.map(|(_, id)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::build_chain;
    use vitaed_storage::memory::MemoryStore;

    #[test]
    fn records_survive_a_store_round_trip() {
        let mut index = BlockIndex::new();
        let ids = build_chain(&mut index, 20);
        index.get_mut(ids[7]).money_supply = 1_234;
        index.get_mut(ids[7]).zc_supply[2] = 9;
        index.get_mut(ids[7]).stake_modifier_v1 = 0xfeed;

        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for id in &ids {
            put_record(&mut batch, &index, index.get(*id));
            let record = index.get(*id);
            set_height_hash(&mut batch, record.height, &record.hash);
        }
        store.write_batch(&batch).expect("write");

        let loaded = load_block_index(&store).expect("load");
        assert_eq!(loaded.len(), 20);
        let id = loaded.lookup(&index.get(ids[7]).hash).expect("lookup");
        let record = loaded.get(id);
        assert_eq!(record.money_supply, 1_234);
        assert_eq!(record.zc_supply[2], 9);
        assert_eq!(record.stake_modifier_v1, 0xfeed);
        assert_eq!(record.height, 7);

        let tip = load_active_tip(&store, &loaded).expect("tip").expect("some");
        assert_eq!(loaded.get(tip).height, 19);
    }
}
