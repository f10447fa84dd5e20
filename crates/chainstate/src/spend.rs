//! Anonymous-spend validation.
//!
//! Structural checks run per transaction in isolation; contextual checks
//! additionally consult the active rule set and, when a block is being
//! connected, the confirmed-serial index.

use std::collections::HashSet;

use primitive_types::U256;
use vitaed_consensus::money::Amount;
use vitaed_consensus::rules::ActiveRules;
use vitaed_consensus::{ConsensusParams, Hash256};
use vitaed_primitives::script;
use vitaed_primitives::transaction::{Transaction, TxOut};
use vitaed_storage::KeyValueStore;
use vitaed_zerocoin::denomination::Denomination;
use vitaed_zerocoin::serial::is_valid_serial;
use vitaed_zerocoin::spend::{CoinSpend, SpendType};
use vitaed_zerocoin::{PublicCoinSpend, RandomnessProofVerifier};

use crate::serials::ZerocoinIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZerocoinError {
    /// Structurally invalid proof, denomination, or binding.
    MalformedInput(&'static str),
    /// Serial reused, within a transaction or across the chain.
    DoubleSpend,
    SignatureInvalid,
    /// Commitment/randomness proof does not open against the mint.
    AccumulatorMismatch,
    /// Spend version or type wrong for the current rule set.
    ConsensusVersionViolation(&'static str),
    /// Redeemed value short of the declared outputs.
    InsufficientFunds,
    TooManySpends,
    /// Referenced mint output could not be found.
    MissingPrevOut,
}

impl std::fmt::Display for ZerocoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZerocoinError::MalformedInput(message) => write!(f, "{message}"),
            ZerocoinError::DoubleSpend => write!(f, "zerocoin serial already spent"),
            ZerocoinError::SignatureInvalid => write!(f, "zerocoin spend signature invalid"),
            ZerocoinError::AccumulatorMismatch => {
                write!(f, "zerocoin spend commitment mismatch")
            }
            ZerocoinError::ConsensusVersionViolation(message) => write!(f, "{message}"),
            ZerocoinError::InsufficientFunds => {
                write!(f, "transaction spends more than was redeemed")
            }
            ZerocoinError::TooManySpends => write!(f, "too many zerocoin spends in transaction"),
            ZerocoinError::MissingPrevOut => write!(f, "zerocoin spend prev output not found"),
        }
    }
}

impl std::error::Error for ZerocoinError {}

/// External lookup of an arbitrary confirmed output.
pub trait TxOutSource {
    fn output(&self, txid: &Hash256, index: u32) -> Option<TxOut>;
}

/// One validated spend input.
#[derive(Clone, Debug)]
pub struct ParsedSpend {
    pub spend: CoinSpend,
    pub input_index: usize,
    pub is_public: bool,
}

/// Structural validation of every anonymous-spend input of `tx`:
/// denomination sanity, sequence cross-check, output binding, intra-tx
/// serial uniqueness, proof verification for public spends, and the
/// aggregate redemption checks.
pub fn check_zerocoin_spend(
    tx: &Transaction,
    verify_proofs: bool,
    params: &ConsensusParams,
    outputs: &dyn TxOutSource,
    proofs: &dyn RandomnessProofVerifier,
) -> Result<Vec<ParsedSpend>, ZerocoinError> {
    // at most two non-mint outputs: redemption address plus change
    if tx.vout.len() > 2 {
        let outs = tx
            .vout
            .iter()
            .filter(|out| !out.is_zerocoin_mint())
            .count();
        if outs > 2 && !tx.is_coinstake() {
            return Err(ZerocoinError::MalformedInput(
                "over two non-mint outputs in a zerocoin spend",
            ));
        }
    }

    let hash_tx_out = tx.outputs_hash();
    let mut parsed = Vec::new();
    let mut serials: HashSet<U256> = HashSet::new();
    let mut total_redeemed: Amount = 0;
    let mut public_spends = 0usize;
    let mut blind_spends = 0usize;

    for (input_index, txin) in tx.vin.iter().enumerate() {
        let is_public = txin.is_zerocoin_public_spend();
        if !txin.is_zerocoin_spend() && !is_public {
            continue;
        }

        let spend = if is_public {
            public_spends += 1;
            PublicCoinSpend::from_txin(txin, tx)
                .map_err(|_| ZerocoinError::MalformedInput("undecodable public spend"))?
                .spend
        } else {
            blind_spends += 1;
            let payload = script::zerocoin_payload(&txin.script_sig)
                .ok_or(ZerocoinError::MalformedInput("spend without payload"))?;
            CoinSpend::consensus_decode(payload)
                .map_err(|_| ZerocoinError::MalformedInput("undecodable spend"))?
        };

        if spend.denomination == Denomination::Error {
            return Err(ZerocoinError::MalformedInput(
                "spend does not have a valid denomination",
            ));
        }

        // the sequence field independently re-states the denomination
        if spend.denomination.value() != txin.sequence as i64 {
            return Err(ZerocoinError::MalformedInput(
                "spend sequence denomination mismatch",
            ));
        }

        // the proof must commit to this exact payout set
        if spend.ptx_hash != hash_tx_out {
            return Err(ZerocoinError::MalformedInput(
                "spend does not bind to this transaction's outputs",
            ));
        }

        if is_public && verify_proofs {
            let prev_out = outputs
                .output(&txin.prevout.hash, txin.prevout.index)
                .ok_or(ZerocoinError::MissingPrevOut)?;
            let public = PublicCoinSpend::from_txin(txin, tx)
                .map_err(|_| ZerocoinError::MalformedInput("undecodable public spend"))?;
            public.validate(&prev_out, proofs).map_err(|err| {
                use vitaed_zerocoin::public_spend::PublicSpendError;
                match err {
                    PublicSpendError::SignatureInvalid => ZerocoinError::SignatureInvalid,
                    PublicSpendError::CommitmentMismatch => ZerocoinError::AccumulatorMismatch,
                    PublicSpendError::DenominationMismatch => {
                        ZerocoinError::MalformedInput("spend denomination differs from mint")
                    }
                    PublicSpendError::VersionTooLow => ZerocoinError::ConsensusVersionViolation(
                        "public spend version too low for coin",
                    ),
                    _ => ZerocoinError::MalformedInput("invalid public spend"),
                }
            })?;
        }

        if !serials.insert(spend.serial) {
            return Err(ZerocoinError::DoubleSpend);
        }

        total_redeemed += spend.denomination.amount();
        parsed.push(ParsedSpend {
            spend,
            input_index,
            is_public,
        });
    }

    if blind_spends > params.max_zc_spends_per_tx
        || public_spends > params.max_zc_public_spends_per_tx
    {
        return Err(ZerocoinError::TooManySpends);
    }

    if !parsed.is_empty() && !tx.is_coinstake() && total_redeemed < tx.value_out() {
        return Err(ZerocoinError::InsufficientFunds);
    }

    Ok(parsed)
}

/// The activation cliff for public spends cuts both ways: once required,
/// blind spends stop connecting; before it, public spends are premature.
pub fn check_public_coin_spend_enforced(
    rules: &ActiveRules,
    is_public: bool,
) -> Result<(), ZerocoinError> {
    if rules.public_spends_required && !is_public {
        return Err(ZerocoinError::ConsensusVersionViolation(
            "old spend version after public spend activation",
        ));
    }
    if !rules.public_spends_required && is_public {
        return Err(ZerocoinError::ConsensusVersionViolation(
            "public spend before activation",
        ));
    }
    Ok(())
}

/// Height-dependent checks for a single parsed spend. The confirmed-serial
/// lookup runs only when `serial_index` is supplied, i.e. when the spend
/// is being connected to the active chain rather than checked in
/// isolation.
pub fn contextual_check_zerocoin_spend<S: KeyValueStore>(
    tx: &Transaction,
    parsed: &ParsedSpend,
    rules: &ActiveRules,
    serial_index: Option<&ZerocoinIndex<S>>,
) -> Result<(), ZerocoinError> {
    let spend = &parsed.spend;

    if rules.public_spends_required
        && parsed.is_public
        && spend.version != rules.public_spend_version
    {
        return Err(ZerocoinError::ConsensusVersionViolation(
            "wrong public spend version",
        ));
    }

    if rules.zerocoin_serials_v2 {
        if !spend.has_valid_signature() {
            if rules.in_fake_serial_range {
                // the network accepted these before the rule was tightened;
                // reproduce the leniency, do not fix it
                vitaed_log::log_warn!(
                    "invalid spend signature tolerated at height {} (fake-serial range)",
                    rules.height
                );
            } else {
                return Err(ZerocoinError::SignatureInvalid);
            }
        }

        let expected = if tx.is_coinstake() {
            SpendType::Stake
        } else {
            SpendType::Spend
        };
        if spend.spend_type != expected {
            return Err(ZerocoinError::ConsensusVersionViolation(
                "spend type does not match transaction shape",
            ));
        }
    }

    if !is_valid_serial(spend.serial) {
        if rules.in_fake_serial_range {
            vitaed_log::log_warn!(
                "out-of-range serial tolerated at height {} (fake-serial range)",
                rules.height
            );
        } else {
            return Err(ZerocoinError::MalformedInput("serial out of valid range"));
        }
    }

    if let Some(index) = serial_index {
        let confirmed = index
            .is_serial_confirmed(spend.serial)
            .map_err(|_| ZerocoinError::MalformedInput("serial index unavailable"))?;
        if confirmed {
            return Err(ZerocoinError::DoubleSpend);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitaed_consensus::params::consensus_params;
    use vitaed_consensus::Network;
    use vitaed_primitives::outpoint::OutPoint;
    use vitaed_primitives::transaction::TxIn;
    use vitaed_storage::memory::MemoryStore;
    use vitaed_zerocoin::DigestBindingVerifier;

    struct NoOutputs;

    impl TxOutSource for NoOutputs {
        fn output(&self, _txid: &Hash256, _index: u32) -> Option<TxOut> {
            None
        }
    }

    fn blind_spend_txin(spend: &CoinSpend) -> TxIn {
        let mut script_sig = vec![script::OP_ZEROCOINSPEND];
        script_sig.extend_from_slice(&spend.consensus_encode());
        TxIn {
            prevout: OutPoint::null(),
            script_sig,
            sequence: spend.denomination.value() as u32,
        }
    }

    fn spend_tx(denomination: Denomination, payout: Amount) -> (Transaction, CoinSpend) {
        let mut tx = Transaction {
            version: 1,
            vin: Vec::new(),
            vout: vec![TxOut {
                value: payout,
                script_pubkey: vec![0x51],
            }],
            lock_time: 0,
        };
        let spend = CoinSpend {
            denomination,
            ptx_hash: tx.outputs_hash(),
            accumulator_checksum: 1,
            serial: U256::from(1_234u64),
            proof: vec![0x01; 4],
            version: 1,
            pubkey: Vec::new(),
            signature: Vec::new(),
            spend_type: SpendType::Spend,
        };
        tx.vin.push(blind_spend_txin(&spend));
        (tx, spend)
    }

    fn mainnet() -> ConsensusParams {
        consensus_params(Network::Mainnet)
    }

    #[test]
    fn well_formed_blind_spend_passes_structural_checks() {
        let (tx, spend) = spend_tx(Denomination::Ten, Denomination::Ten.amount() - 1_000);
        let parsed = check_zerocoin_spend(&tx, true, &mainnet(), &NoOutputs, &DigestBindingVerifier)
            .expect("valid spend");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].spend.serial, spend.serial);
        assert!(!parsed[0].is_public);
    }

    #[test]
    fn sequence_denomination_mismatch_is_malformed() {
        let (mut tx, _) = spend_tx(Denomination::Ten, 1_000);
        tx.vin[0].sequence = 50;
        let err = check_zerocoin_spend(&tx, true, &mainnet(), &NoOutputs, &DigestBindingVerifier)
            .expect_err("mismatch");
        assert_eq!(
            err,
            ZerocoinError::MalformedInput("spend sequence denomination mismatch")
        );
    }

    #[test]
    fn proof_must_bind_to_actual_outputs() {
        let (mut tx, _) = spend_tx(Denomination::Ten, 1_000);
        // tamper with the payout after the proof was bound
        tx.vout[0].value += 1;
        let err = check_zerocoin_spend(&tx, true, &mainnet(), &NoOutputs, &DigestBindingVerifier)
            .expect_err("rebound outputs");
        assert_eq!(
            err,
            ZerocoinError::MalformedInput("spend does not bind to this transaction's outputs")
        );
    }

    #[test]
    fn duplicate_serial_within_tx_is_double_spend() {
        let (mut tx, spend) = spend_tx(Denomination::Ten, 1_000);
        tx.vin.push(blind_spend_txin(&spend));
        // rebinding both inputs to the same outputs hash keeps them valid
        let err = check_zerocoin_spend(&tx, true, &mainnet(), &NoOutputs, &DigestBindingVerifier)
            .expect_err("dup serial");
        assert_eq!(err, ZerocoinError::DoubleSpend);
    }

    #[test]
    fn over_redemption_is_insufficient_funds() {
        let (tx, _) = spend_tx(Denomination::Ten, Denomination::Ten.amount() + 1);
        let err = check_zerocoin_spend(&tx, true, &mainnet(), &NoOutputs, &DigestBindingVerifier)
            .expect_err("over redemption");
        assert_eq!(err, ZerocoinError::InsufficientFunds);
    }

    #[test]
    fn spend_type_must_match_transaction_shape() {
        let params = mainnet();
        let (tx, _) = spend_tx(Denomination::Ten, 1_000);
        let mut parsed =
            check_zerocoin_spend(&tx, true, &params, &NoOutputs, &DigestBindingVerifier)
                .expect("valid");
        let rules = params.rules_at(params.height_start_zc_serials_v2);

        // an ordinary transaction carrying a Stake-typed spend is rejected
        parsed[0].spend.spend_type = SpendType::Stake;
        // v1 spends carry no signature; signature check passes, type fails
        let err = contextual_check_zerocoin_spend::<MemoryStore>(&tx, &parsed[0], &rules, None)
            .expect_err("wrong type");
        assert_eq!(
            err,
            ZerocoinError::ConsensusVersionViolation("spend type does not match transaction shape")
        );
    }

    #[test]
    fn serial_range_leniency_is_gated_to_the_historical_window() {
        let params = mainnet();
        let (tx, _) = spend_tx(Denomination::Ten, 1_000);
        let mut parsed =
            check_zerocoin_spend(&tx, true, &params, &NoOutputs, &DigestBindingVerifier)
                .expect("valid");
        parsed[0].spend.serial = U256::zero();

        // inside the window: logged, tolerated
        let inside = params.rules_at(params.height_end_fake_serial);
        contextual_check_zerocoin_spend::<MemoryStore>(&tx, &parsed[0], &inside, None)
            .expect("tolerated in range");

        // outside: fatal
        let outside = params.rules_at(params.height_end_fake_serial + 1);
        let err = contextual_check_zerocoin_spend::<MemoryStore>(&tx, &parsed[0], &outside, None)
            .expect_err("fatal out of range");
        assert_eq!(
            err,
            ZerocoinError::MalformedInput("serial out of valid range")
        );
    }

    #[test]
    fn public_spend_enforcement_cuts_both_ways() {
        let params = mainnet();
        let before = params.rules_at(params.height_start_zc_public_spends - 1);
        let after = params.rules_at(params.height_start_zc_public_spends);

        check_public_coin_spend_enforced(&before, false).expect("blind ok before");
        check_public_coin_spend_enforced(&after, true).expect("public ok after");
        assert!(check_public_coin_spend_enforced(&before, true).is_err());
        assert!(check_public_coin_spend_enforced(&after, false).is_err());
    }
}
