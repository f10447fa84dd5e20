//! Public coin spends.
//!
//! A public spend redeems a mint by referencing its output directly and
//! proving knowledge of the coin's randomness, instead of hiding inside
//! the accumulator. Used for auditability of transition-era coins.

use vitaed_consensus::Hash256;
use vitaed_primitives::encoding::{DecodeError, Decoder, Encoder};
use vitaed_primitives::script;
use vitaed_primitives::transaction::{Transaction, TxIn, TxOut};

use crate::denomination::Denomination;
use crate::serial::SERIAL_VERSION_PUBKEY;
use crate::spend::{CoinSpend, SPEND_VERSION_SCHNORR};

/// External capability proving that the published randomness material
/// opens the mint commitment for the revealed serial. Accumulator and
/// commitment arithmetic is never reimplemented in this crate.
pub trait RandomnessProofVerifier {
    fn verify(
        &self,
        serial: &Hash256,
        commitment: &[u8],
        ptx_hash: &Hash256,
        proof: &[u8],
    ) -> bool;
}

#[derive(Debug)]
pub enum PublicSpendError {
    Decode(DecodeError),
    NotPublicSpend,
    VersionTooLow,
    CommitmentMismatch,
    DenominationMismatch,
    SignatureInvalid,
}

impl std::fmt::Display for PublicSpendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublicSpendError::Decode(err) => write!(f, "{err}"),
            PublicSpendError::NotPublicSpend => write!(f, "input is not a public coin spend"),
            PublicSpendError::VersionTooLow => {
                write!(f, "v1 coin requires a schnorr-era public spend")
            }
            PublicSpendError::CommitmentMismatch => {
                write!(f, "randomness proof does not open the mint commitment")
            }
            PublicSpendError::DenominationMismatch => {
                write!(f, "spend denomination does not match the mint output")
            }
            PublicSpendError::SignatureInvalid => write!(f, "public spend signature invalid"),
        }
    }
}

impl std::error::Error for PublicSpendError {}

impl From<DecodeError> for PublicSpendError {
    fn from(err: DecodeError) -> Self {
        PublicSpendError::Decode(err)
    }
}

#[derive(Clone, Debug)]
pub struct PublicCoinSpend {
    pub spend: CoinSpend,
    /// Mint being redeemed, taken from the input's prevout.
    pub mint_txid: Hash256,
    pub mint_index: u32,
    /// Randomness material proven against the mint commitment.
    pub randomness_proof: Vec<u8>,
}

impl PublicCoinSpend {
    pub fn encode_script_sig(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_u8(script::OP_ZEROCOINPUBLICSPEND);
        encoder.write_var_bytes(&self.spend.consensus_encode());
        encoder.write_var_bytes(&self.randomness_proof);
        encoder.into_inner()
    }

    /// Parse a public spend from a transaction input and rebind it to the
    /// spending transaction's outputs.
    pub fn from_txin(txin: &TxIn, tx: &Transaction) -> Result<Self, PublicSpendError> {
        if !txin.is_zerocoin_public_spend() {
            return Err(PublicSpendError::NotPublicSpend);
        }
        let payload =
            script::zerocoin_payload(&txin.script_sig).ok_or(PublicSpendError::NotPublicSpend)?;
        let mut decoder = Decoder::new(payload);
        let spend_bytes = decoder.read_var_bytes()?;
        let mut spend = CoinSpend::consensus_decode(&spend_bytes)?;
        let randomness_proof = decoder.read_var_bytes()?;
        if !decoder.is_empty() {
            return Err(PublicSpendError::Decode(DecodeError::TrailingBytes));
        }

        // the proof binds to the outputs of the transaction it rides in
        spend.ptx_hash = tx.outputs_hash();
        Ok(Self {
            spend,
            mint_txid: txin.prevout.hash,
            mint_index: txin.prevout.index,
            randomness_proof,
        })
    }

    /// Verify the spend against the mint output it claims to redeem.
    pub fn validate(
        &self,
        prev_out: &TxOut,
        verifier: &dyn RandomnessProofVerifier,
    ) -> Result<(), PublicSpendError> {
        if self.spend.coin_version() < SERIAL_VERSION_PUBKEY
            && self.spend.version < SPEND_VERSION_SCHNORR
        {
            // coins without an embedded key cannot publish raw randomness
            return Err(PublicSpendError::VersionTooLow);
        }

        let commitment =
            script::zerocoin_payload(&prev_out.script_pubkey).unwrap_or(&[]);
        if Denomination::from_amount(prev_out.value) != self.spend.denomination
            || self.spend.denomination == Denomination::Error
        {
            return Err(PublicSpendError::DenominationMismatch);
        }

        let serial_bytes = self.spend.serial.to_little_endian();
        if !verifier.verify(
            &serial_bytes,
            commitment,
            &self.spend.ptx_hash,
            &self.randomness_proof,
        ) {
            return Err(PublicSpendError::CommitmentMismatch);
        }

        if !self.spend.has_valid_signature() {
            return Err(PublicSpendError::SignatureInvalid);
        }
        Ok(())
    }
}

/// Proof verifier that accepts a proof iff it equals the sha256d of the
/// commitment, serial, and output hash. Stands in for the external
/// commitment arithmetic in tests and light deployments.
pub struct DigestBindingVerifier;

impl RandomnessProofVerifier for DigestBindingVerifier {
    fn verify(
        &self,
        serial: &Hash256,
        commitment: &[u8],
        ptx_hash: &Hash256,
        proof: &[u8],
    ) -> bool {
        proof == expected_binding(serial, commitment, ptx_hash).as_slice()
    }
}

/// The binding digest `DigestBindingVerifier` expects; spend construction
/// in tests uses the same derivation.
pub fn expected_binding(serial: &Hash256, commitment: &[u8], ptx_hash: &Hash256) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_hash_le(serial);
    encoder.write_var_bytes(commitment);
    encoder.write_hash_le(ptx_hash);
    vitaed_primitives::hash::sha256d(&encoder.into_inner()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spend::tests::signed_spend;
    use crate::spend::SpendType;
    use vitaed_primitives::outpoint::OutPoint;

    fn mint_output(denom: Denomination) -> TxOut {
        let mut script = vec![script::OP_ZEROCOINMINT];
        script.extend_from_slice(&[0x77; 32]);
        TxOut {
            value: denom.amount(),
            script_pubkey: script,
        }
    }

    fn spending_tx() -> Transaction {
        Transaction {
            version: 1,
            vin: Vec::new(),
            vout: vec![TxOut {
                value: Denomination::Ten.amount(),
                script_pubkey: vec![0x51],
            }],
            lock_time: 0,
        }
    }

    fn build_public_spend(tx: &Transaction, prev_out: &TxOut) -> PublicCoinSpend {
        let mut spend = signed_spend(9, SpendType::Spend);
        spend.ptx_hash = tx.outputs_hash();
        crate::spend::tests::sign_spend(&mut spend, 9);
        PublicCoinSpend {
            randomness_proof: expected_binding(
                &spend.serial.to_little_endian(),
                script::zerocoin_payload(&prev_out.script_pubkey).expect("payload"),
                &spend.ptx_hash,
            ),
            spend,
            mint_txid: [0x10; 32],
            mint_index: 0,
        }
    }

    #[test]
    fn well_formed_public_spend_validates() {
        let tx = spending_tx();
        let prev_out = mint_output(Denomination::Ten);
        let public = build_public_spend(&tx, &prev_out);
        public
            .validate(&prev_out, &DigestBindingVerifier)
            .expect("valid public spend");
    }

    #[test]
    fn parse_rebinds_output_hash() {
        let tx = spending_tx();
        let prev_out = mint_output(Denomination::Ten);
        let public = build_public_spend(&tx, &prev_out);

        let txin = TxIn {
            prevout: OutPoint {
                hash: public.mint_txid,
                index: public.mint_index,
            },
            script_sig: public.encode_script_sig(),
            sequence: Denomination::Ten.value() as u32,
        };
        let parsed = PublicCoinSpend::from_txin(&txin, &tx).expect("parse");
        assert_eq!(parsed.spend.ptx_hash, tx.outputs_hash());
        assert_eq!(parsed.mint_txid, [0x10; 32]);
    }

    #[test]
    fn validate_checks_denomination_against_mint() {
        let tx = spending_tx();
        let prev_out = mint_output(Denomination::Ten);
        let public = build_public_spend(&tx, &prev_out);

        let wrong_denom = mint_output(Denomination::Fifty);
        let err = public
            .validate(&wrong_denom, &DigestBindingVerifier)
            .expect_err("denomination mismatch");
        assert!(matches!(err, PublicSpendError::DenominationMismatch));
    }

    #[test]
    fn validate_rejects_bad_randomness_proof() {
        let tx = spending_tx();
        let prev_out = mint_output(Denomination::Ten);
        let mut public = build_public_spend(&tx, &prev_out);
        public.randomness_proof = vec![0u8; 32];
        let err = public
            .validate(&prev_out, &DigestBindingVerifier)
            .expect_err("bad proof");
        assert!(matches!(err, PublicSpendError::CommitmentMismatch));
    }
}
