//! Transaction types and serialization.

use vitaed_consensus::Hash256;

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::hash::sha256d;
use crate::outpoint::OutPoint;
use crate::script;

pub const CURRENT_TX_VERSION: i32 = 1;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// Legacy blind spend: a null prevout plus the spend marker opcode.
    pub fn is_zerocoin_spend(&self) -> bool {
        self.prevout.is_null() && script::is_zerocoin_spend(&self.script_sig)
    }

    /// Public spend: references the mint output it redeems.
    pub fn is_zerocoin_public_spend(&self) -> bool {
        script::is_zerocoin_public_spend(&self.script_sig)
    }

    pub fn has_zerocoin_spend(&self) -> bool {
        self.is_zerocoin_spend() || self.is_zerocoin_public_spend()
    }
}

impl Encodable for TxIn {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.prevout.consensus_encode(encoder);
        encoder.write_var_bytes(&self.script_sig);
        encoder.write_u32_le(self.sequence);
    }
}

impl Decodable for TxIn {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let prevout = OutPoint::consensus_decode(decoder)?;
        let script_sig = decoder.read_var_bytes()?;
        let sequence = decoder.read_u32_le()?;
        Ok(Self {
            prevout,
            script_sig,
            sequence,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    /// The coinstake marker output: zero value, empty script.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }

    pub fn is_zerocoin_mint(&self) -> bool {
        script::is_zerocoin_mint(&self.script_pubkey)
    }
}

impl Encodable for TxOut {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_i64_le(self.value);
        encoder.write_var_bytes(&self.script_pubkey);
    }
}

impl Decodable for TxOut {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let value = decoder.read_i64_le()?;
        let script_pubkey = decoder.read_var_bytes()?;
        Ok(Self {
            value,
            script_pubkey,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
    pub version: i32,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn consensus_encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(self.version);
        encoder.write_varint(self.vin.len() as u64);
        for input in &self.vin {
            input.consensus_encode(&mut encoder);
        }
        encoder.write_varint(self.vout.len() as u64);
        for output in &self.vout {
            output.consensus_encode(&mut encoder);
        }
        encoder.write_u32_le(self.lock_time);
        encoder.into_inner()
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let tx = Self::decode_from(&mut decoder)?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(tx)
    }

    pub fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let version = decoder.read_i32_le()?;
        let vin_count = decoder.read_varint()? as usize;
        let mut vin = Vec::with_capacity(vin_count);
        for _ in 0..vin_count {
            vin.push(TxIn::consensus_decode(decoder)?);
        }
        let vout_count = decoder.read_varint()? as usize;
        let mut vout = Vec::with_capacity(vout_count);
        for _ in 0..vout_count {
            vout.push(TxOut::consensus_decode(decoder)?);
        }
        let lock_time = decoder.read_u32_le()?;
        Ok(Self {
            version,
            vin,
            vout,
            lock_time,
        })
    }

    pub fn txid(&self) -> Hash256 {
        sha256d(&self.consensus_encode())
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].prevout.is_null() && !self.vin[0].has_zerocoin_spend()
    }

    pub fn is_coinstake(&self) -> bool {
        !self.vin.is_empty()
            && (!self.vin[0].prevout.is_null() || self.vin[0].is_zerocoin_spend())
            && self.vout.len() >= 2
            && self.vout[0].is_empty()
    }

    pub fn has_zerocoin_spend_inputs(&self) -> bool {
        self.vin.iter().any(TxIn::has_zerocoin_spend)
    }

    pub fn has_zerocoin_mint_outputs(&self) -> bool {
        self.vout.iter().any(TxOut::is_zerocoin_mint)
    }

    pub fn value_out(&self) -> i64 {
        self.vout.iter().map(|out| out.value).sum()
    }

    /// The hash a spend proof binds to: this transaction with its inputs
    /// stripped, so the proof commits to the exact payout set.
    pub fn outputs_hash(&self) -> Hash256 {
        let stripped = Transaction {
            version: self.version,
            vin: Vec::new(),
            vout: self.vout.clone(),
            lock_time: self.lock_time,
        };
        stripped.txid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: CURRENT_TX_VERSION,
            vin: vec![TxIn {
                prevout: OutPoint {
                    hash: [0x11; 32],
                    index: 0,
                },
                script_sig: vec![0x51],
                sequence: u32::MAX,
            }],
            vout: vec![TxOut {
                value: 5_000,
                script_pubkey: vec![0x52],
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn round_trips_consensus_encoding() {
        let tx = sample_tx();
        let bytes = tx.consensus_encode();
        let decoded = Transaction::consensus_decode(&bytes).expect("decode");
        assert_eq!(decoded, tx);
    }

    #[test]
    fn coinstake_shape_detection() {
        let mut tx = sample_tx();
        assert!(!tx.is_coinstake());
        tx.vout.insert(
            0,
            TxOut {
                value: 0,
                script_pubkey: Vec::new(),
            },
        );
        assert!(tx.is_coinstake());
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn outputs_hash_ignores_inputs() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.vin[0].sequence = 5;
        assert_eq!(tx.outputs_hash(), other.outputs_hash());
        assert_ne!(tx.txid(), other.txid());

        let mut changed = tx.clone();
        changed.vout[0].value += 1;
        assert_ne!(tx.outputs_hash(), changed.outputs_hash());
    }
}
