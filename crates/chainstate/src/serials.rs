//! Confirmed-serial and confirmed-mint indexes.

use std::sync::Arc;

use primitive_types::U256;
use vitaed_consensus::Hash256;
use vitaed_storage::{Column, KeyValueStore, StoreError, WriteBatch};
use vitaed_zerocoin::serial::serial_key;

const SUPPLY_SNAPSHOT_KEY: &[u8] = b"supply";

/// Persistent lookup tables: spent serial -> txid, mint pubcoin -> txid,
/// plus the aggregate supply snapshot.
pub struct ZerocoinIndex<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> ZerocoinIndex<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn serial_txid(&self, serial: U256) -> Result<Option<Hash256>, StoreError> {
        let bytes = self.store.get(Column::ZcSerial, &serial_key(serial))?;
        decode_txid(bytes)
    }

    pub fn is_serial_confirmed(&self, serial: U256) -> Result<bool, StoreError> {
        Ok(self.serial_txid(serial)?.is_some())
    }

    pub fn put_serial(&self, batch: &mut WriteBatch, serial: U256, txid: &Hash256) {
        batch.put(Column::ZcSerial, serial_key(serial), *txid);
    }

    pub fn delete_serial(&self, batch: &mut WriteBatch, serial: U256) {
        batch.delete(Column::ZcSerial, serial_key(serial));
    }

    pub fn mint_txid(&self, pubcoin_hash: &Hash256) -> Result<Option<Hash256>, StoreError> {
        let bytes = self.store.get(Column::ZcMint, pubcoin_hash)?;
        decode_txid(bytes)
    }

    /// Persist the tip's aggregate supply: per-denomination counts plus
    /// the plaintext money supply.
    pub fn put_supply_snapshot(
        &self,
        batch: &mut WriteBatch,
        zc_supply: &[i64; 8],
        money_supply: i64,
    ) {
        let mut bytes = Vec::with_capacity(72);
        for count in zc_supply {
            bytes.extend_from_slice(&count.to_le_bytes());
        }
        bytes.extend_from_slice(&money_supply.to_le_bytes());
        batch.put(Column::ZcSupply, SUPPLY_SNAPSHOT_KEY, bytes);
    }

    pub fn supply_snapshot(&self) -> Result<Option<([i64; 8], i64)>, StoreError> {
        let Some(bytes) = self.store.get(Column::ZcSupply, SUPPLY_SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        if bytes.len() != 72 {
            return Err(StoreError::Backend("bad supply snapshot".to_string()));
        }
        let mut zc_supply = [0i64; 8];
        for (position, count) in zc_supply.iter_mut().enumerate() {
            let start = position * 8;
            *count = i64::from_le_bytes(bytes[start..start + 8].try_into().expect("len"));
        }
        let money_supply = i64::from_le_bytes(bytes[64..72].try_into().expect("len"));
        Ok(Some((zc_supply, money_supply)))
    }

    pub fn put_mint(&self, batch: &mut WriteBatch, pubcoin_hash: &Hash256, txid: &Hash256) {
        batch.put(Column::ZcMint, pubcoin_hash, *txid);
    }

    pub fn delete_mint(&self, batch: &mut WriteBatch, pubcoin_hash: &Hash256) {
        batch.delete(Column::ZcMint, pubcoin_hash);
    }
}

fn decode_txid(bytes: Option<Vec<u8>>) -> Result<Option<Hash256>, StoreError> {
    match bytes {
        None => Ok(None),
        Some(bytes) => {
            if bytes.len() != 32 {
                return Err(StoreError::Backend("bad txid length".to_string()));
            }
            let mut txid = [0u8; 32];
            txid.copy_from_slice(&bytes);
            Ok(Some(txid))
        }
    }
}
