//! Serialized coin spends.

use primitive_types::U256;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};
use std::sync::OnceLock;
use vitaed_consensus::Hash256;
use vitaed_primitives::encoding::{DecodeError, Decoder, Encoder};
use vitaed_primitives::hash::sha256d;

use crate::denomination::Denomination;
use crate::serial::{extract_version_from_serial, serial_from_pubkey, SERIAL_VERSION_PUBKEY};

static SECP256K1_VERIFY: OnceLock<Secp256k1<VerifyOnly>> = OnceLock::new();

fn secp256k1_verify() -> &'static Secp256k1<VerifyOnly> {
    SECP256K1_VERIFY.get_or_init(Secp256k1::verification_only)
}

/// First spend version that signs the spend with the coin's key.
pub const SPEND_VERSION_SIGNED: u8 = 2;
/// First spend version that proves randomness with a Schnorr signature
/// instead of publishing it.
pub const SPEND_VERSION_SCHNORR: u8 = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum SpendType {
    Spend = 0,
    Stake = 1,
}

impl SpendType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SpendType::Spend),
            1 => Some(SpendType::Stake),
            _ => None,
        }
    }
}

/// The consensus-visible content of a coin spend. The zero-knowledge
/// material itself stays opaque; consensus only binds and orders it.
#[derive(Clone, Debug, PartialEq)]
pub struct CoinSpend {
    pub denomination: Denomination,
    /// Hash of the spending transaction's outputs the proof commits to.
    pub ptx_hash: Hash256,
    /// Which accumulator snapshot the proof was generated against.
    pub accumulator_checksum: u32,
    pub serial: U256,
    /// Opaque zero-knowledge proof material (externally verified).
    pub proof: Vec<u8>,
    pub version: u8,
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
    pub spend_type: SpendType,
}

impl CoinSpend {
    pub fn coin_version(&self) -> u8 {
        extract_version_from_serial(self.serial)
    }

    pub fn consensus_encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_u32_le(self.denomination.value() as u32);
        encoder.write_hash_le(&self.ptx_hash);
        encoder.write_u32_le(self.accumulator_checksum);
        encoder.write_hash_le(&self.serial.to_little_endian());
        encoder.write_var_bytes(&self.proof);
        if self.version >= SPEND_VERSION_SIGNED {
            encoder.write_u8(self.version);
            encoder.write_var_bytes(&self.pubkey);
            encoder.write_var_bytes(&self.signature);
            encoder.write_u8(self.spend_type as u8);
        }
        encoder.into_inner()
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let spend = Self::decode_from(&mut decoder)?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(spend)
    }

    pub fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let denomination = Denomination::from_value(decoder.read_u32_le()? as i64);
        let ptx_hash = decoder.read_hash_le()?;
        let accumulator_checksum = decoder.read_u32_le()?;
        let serial = U256::from_little_endian(&decoder.read_hash_le()?);
        let proof = decoder.read_var_bytes()?;

        // pre-signature spends end here
        if decoder.is_empty() {
            return Ok(Self {
                denomination,
                ptx_hash,
                accumulator_checksum,
                serial,
                proof,
                version: 1,
                pubkey: Vec::new(),
                signature: Vec::new(),
                spend_type: SpendType::Spend,
            });
        }

        let version = decoder.read_u8()?;
        if version < SPEND_VERSION_SIGNED {
            return Err(DecodeError::InvalidData("signed spend with version below 2"));
        }
        let pubkey = decoder.read_var_bytes()?;
        let signature = decoder.read_var_bytes()?;
        let spend_type = SpendType::from_u8(decoder.read_u8()?)
            .ok_or(DecodeError::InvalidData("unknown spend type"))?;
        Ok(Self {
            denomination,
            ptx_hash,
            accumulator_checksum,
            serial,
            proof,
            version,
            pubkey,
            signature,
            spend_type,
        })
    }

    /// The digest the spend signature covers: every consensus-visible field
    /// except the signature itself.
    pub fn signature_hash(&self) -> Hash256 {
        let mut encoder = Encoder::new();
        encoder.write_hash_le(&self.ptx_hash);
        encoder.write_u32_le(self.denomination.value() as u32);
        encoder.write_hash_le(&self.serial.to_little_endian());
        encoder.write_u32_le(self.accumulator_checksum);
        encoder.write_u8(self.spend_type as u8);
        sha256d(&encoder.into_inner())
    }

    /// V2+ spends must carry an ECDSA signature by the key the serial
    /// commits to. V1 spends carry no signature and always pass here; their
    /// soundness rests on the blind proof.
    pub fn has_valid_signature(&self) -> bool {
        if self.coin_version() < SERIAL_VERSION_PUBKEY {
            return true;
        }
        if self.serial != serial_from_pubkey(&self.pubkey) {
            return false;
        }
        let Ok(pubkey) = PublicKey::from_slice(&self.pubkey) else {
            return false;
        };
        let Ok(signature) = Signature::from_der(&self.signature) else {
            return false;
        };
        let Ok(message) = Message::from_digest_slice(&self.signature_hash()) else {
            return false;
        };
        secp256k1_verify()
            .verify_ecdsa(&message, &signature, &pubkey)
            .is_ok()
    }

    /// Uniqueness token a staked coin contributes to the kernel hash.
    pub fn serial_hash(&self) -> Hash256 {
        sha256d(&self.serial.to_little_endian())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use secp256k1::SecretKey;

    fn test_key(last_byte: u8) -> (SecretKey, PublicKey) {
        let mut bytes = [0u8; 32];
        bytes[31] = last_byte;
        let secret = SecretKey::from_slice(&bytes).expect("secret key");
        let secp = Secp256k1::signing_only();
        (secret, PublicKey::from_secret_key(&secp, &secret))
    }

    /// Bind the spend to the key derived from `last_byte` and sign its
    /// current fields.
    pub(crate) fn sign_spend(spend: &mut CoinSpend, last_byte: u8) {
        let (secret, pubkey) = test_key(last_byte);
        spend.pubkey = pubkey.serialize().to_vec();
        spend.serial = serial_from_pubkey(&spend.pubkey);
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest_slice(&spend.signature_hash()).expect("digest");
        spend.signature = secp.sign_ecdsa(&message, &secret).serialize_der().to_vec();
    }

    pub(crate) fn signed_spend(last_byte: u8, spend_type: SpendType) -> CoinSpend {
        let mut spend = CoinSpend {
            denomination: Denomination::Ten,
            ptx_hash: [0x44; 32],
            accumulator_checksum: 0xdead_beef,
            serial: U256::zero(),
            proof: vec![0xab; 16],
            version: SPEND_VERSION_SCHNORR,
            pubkey: Vec::new(),
            signature: Vec::new(),
            spend_type,
        };
        sign_spend(&mut spend, last_byte);
        spend
    }

    #[test]
    fn round_trips_signed_and_unsigned_spends() {
        let spend = signed_spend(1, SpendType::Spend);
        let bytes = spend.consensus_encode();
        assert_eq!(CoinSpend::consensus_decode(&bytes).expect("decode"), spend);

        let legacy = CoinSpend {
            version: 1,
            pubkey: Vec::new(),
            signature: Vec::new(),
            serial: U256::from(77u64),
            ..spend
        };
        let bytes = legacy.consensus_encode();
        assert_eq!(CoinSpend::consensus_decode(&bytes).expect("decode"), legacy);
    }

    #[test]
    fn signature_verifies_and_binds_to_fields() {
        let spend = signed_spend(2, SpendType::Spend);
        assert!(spend.has_valid_signature());

        let mut tampered = spend.clone();
        tampered.ptx_hash = [0x45; 32];
        assert!(!tampered.has_valid_signature());

        let mut wrong_serial = spend.clone();
        wrong_serial.serial = serial_from_pubkey(&[0x03; 33]);
        assert!(!wrong_serial.has_valid_signature());
    }

    #[test]
    fn v1_spends_have_no_signature_requirement() {
        let mut spend = signed_spend(3, SpendType::Spend);
        spend.serial = U256::from(99u64);
        spend.signature = Vec::new();
        spend.pubkey = Vec::new();
        assert!(spend.has_valid_signature());
    }
}
