//! Consensus parameter definitions.

use crate::money::{Amount, COIN};
use crate::Hash256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

/// Per-denomination coin counts added by the one-time wrapped-serial
/// correction, indexed in denomination order (1, 5, 10, 50, 100, 500,
/// 1000, 5000). Fixed historical amounts; never derived.
pub type WrappedSerialInflation = [i64; 8];

#[derive(Clone, Debug)]
pub struct ConsensusParams {
    pub network: Network,
    pub hash_genesis_block: Hash256,
    pub genesis_time: u32,

    pub pow_limit: Hash256,
    pub pos_limit: Hash256,
    pub pos_limit_v2: Hash256,
    pub target_spacing: i64,
    pub target_timespan: i64,
    pub target_timespan_v2: i64,
    pub time_slot_length: i64,
    pub future_time_drift_pow: i64,
    pub future_time_drift_pos: i64,

    pub last_pow_block: i32,
    pub coinbase_maturity: i32,
    pub stake_min_age: i64,
    pub stake_min_depth: i32,

    /// Legacy modifier selection switches to hashing every candidate's
    /// block hash (instead of zeroing proof-of-stake candidates) once the
    /// lowest candidate reaches this height.
    pub height_start_new_modifier_selection: i32,
    pub height_start_zc: i32,
    pub height_start_zc_serials_v2: i32,
    pub height_start_zc_public_spends: i32,
    pub height_last_zc_accum_checkpoint: i32,
    pub height_start_stake_modifier_v2: i32,
    pub height_start_time_protocol_v2: i32,
    pub height_end_fake_serial: i32,
    pub height_first_fraudulent: i32,
    pub height_recalc_accumulators: i32,
    pub height_enforce_invalid_utxo: i32,
    pub height_enforce_serial_range: i32,

    pub invalid_amount_filtered: Amount,
    pub supply_before_fake_serial: Amount,
    /// Plaintext supply at the zerocoin activation block, used as the
    /// replay baseline when recomputation starts exactly there.
    pub money_supply_at_zc_start: Amount,
    pub wrapped_serial_inflation: WrappedSerialInflation,

    pub zc_required_stake_depth: i32,
    pub zc_mint_maturity: i32,
    pub max_zc_spends_per_tx: usize,
    pub max_zc_public_spends_per_tx: usize,

    /// Runtime feature flag selecting the enforced public-spend version.
    pub public_spend_v4: bool,
}

impl ConsensusParams {
    pub fn is_regtest(&self) -> bool {
        self.network == Network::Regtest
    }

    pub fn is_stake_modifier_v2(&self, height: i32) -> bool {
        height >= self.height_start_stake_modifier_v2
    }

    pub fn is_time_protocol_v2(&self, height: i32) -> bool {
        height >= self.height_start_time_protocol_v2
    }

    pub fn future_block_time_drift(&self, height: i32) -> i64 {
        if self.is_time_protocol_v2(height) {
            // under time protocol v2 the drift is one slot minus a second
            return self.time_slot_length - 1;
        }
        if height > self.last_pow_block {
            self.future_time_drift_pos
        } else {
            self.future_time_drift_pow
        }
    }

    /// Timestamps must land exactly on a slot boundary once time protocol
    /// v2 is active.
    pub fn is_valid_block_time_stamp(&self, time: i64, height: i32) -> bool {
        if !self.is_time_protocol_v2(height) {
            return true;
        }
        (time % self.time_slot_length) == 0
    }

    /// Minimum age (before stake modifier v2) or minimum depth (after) for
    /// a stake input's origin block.
    pub fn has_stake_min_age_or_depth(
        &self,
        context_height: i32,
        context_time: i64,
        origin_height: i32,
        origin_time: i64,
    ) -> bool {
        if !self.is_stake_modifier_v2(context_height) {
            return self.is_regtest() || origin_time + self.stake_min_age <= context_time;
        }
        context_height - origin_height >= self.stake_min_depth
    }
}

#[derive(Debug)]
pub enum HexError {
    InvalidLength,
    InvalidHex,
}

pub fn hash256_from_hex(input: &str) -> Result<Hash256, HexError> {
    let mut hex = input.trim();
    if let Some(stripped) = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")) {
        hex = stripped;
    }

    if hex.is_empty() || hex.len() > 64 {
        return Err(HexError::InvalidLength);
    }

    let mut hex_owned = String::with_capacity(64);
    for _ in 0..(64 - hex.len()) {
        hex_owned.push('0');
    }
    hex_owned.push_str(hex);

    let mut bytes = [0u8; 32];
    for (i, byte_out) in bytes.iter_mut().enumerate() {
        let start = i * 2;
        let byte = u8::from_str_radix(&hex_owned[start..start + 2], 16)
            .map_err(|_| HexError::InvalidHex)?;
        *byte_out = byte;
    }
    bytes.reverse();

    Ok(bytes)
}

fn limit_hash(hex: &str) -> Hash256 {
    match hash256_from_hex(hex) {
        Ok(hash) => hash,
        Err(_) => [0u8; 32],
    }
}

pub fn consensus_params(network: Network) -> ConsensusParams {
    match network {
        Network::Mainnet => mainnet_consensus_params(),
        Network::Testnet => testnet_consensus_params(),
        Network::Regtest => regtest_consensus_params(),
    }
}

fn mainnet_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Mainnet,
        hash_genesis_block: limit_hash(
            "0000041e482b9b9691d98eefb48473405c0b8ec31b76df3797c74a78680ef818",
        ),
        genesis_time: 1_454_124_731,

        pow_limit: limit_hash("00000fffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"),
        pos_limit: limit_hash("000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"),
        pos_limit_v2: limit_hash(
            "00000fffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        ),
        target_spacing: 45,
        target_timespan: 40 * 60,
        target_timespan_v2: 30 * 60,
        time_slot_length: 15,
        future_time_drift_pow: 7_200,
        future_time_drift_pos: 180,

        last_pow_block: 200,
        coinbase_maturity: 8,
        stake_min_age: 60 * 60,
        stake_min_depth: 80,

        height_start_new_modifier_selection: 615_800,
        height_start_zc: 209_467,
        height_start_zc_serials_v2: 1_050_020,
        height_start_zc_public_spends: 1_880_000,
        height_last_zc_accum_checkpoint: 1_686_240,
        height_start_stake_modifier_v2: 1_967_000,
        height_start_time_protocol_v2: 2_153_200,
        height_end_fake_serial: 1_686_229,
        height_first_fraudulent: 891_737,
        height_recalc_accumulators: 908_000,
        height_enforce_invalid_utxo: 902_850,
        height_enforce_serial_range: 895_400,

        invalid_amount_filtered: 268_200 * COIN,
        supply_before_fake_serial: 4_131_563 * COIN,
        money_supply_at_zc_start: 1_254_796_547_496_199,
        wrapped_serial_inflation: [970, 4_001, 2_343, 444, 1_115, 691, 378, 109],

        zc_required_stake_depth: 200,
        zc_mint_maturity: 20,
        max_zc_spends_per_tx: 7,
        max_zc_public_spends_per_tx: 637,

        public_spend_v4: true,
    }
}

fn testnet_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Testnet,
        height_start_new_modifier_selection: 51_197,
        height_start_zc: 130_400,
        height_start_zc_serials_v2: 444_020,
        height_start_zc_public_spends: 660_000,
        height_last_zc_accum_checkpoint: 651_000,
        height_start_stake_modifier_v2: 700_000,
        height_start_time_protocol_v2: 800_000,
        // the fake-serial incident is a mainnet event
        height_end_fake_serial: -1,
        height_first_fraudulent: -1,
        height_recalc_accumulators: -1,
        height_enforce_invalid_utxo: -1,
        height_enforce_serial_range: 1,
        invalid_amount_filtered: 0,
        supply_before_fake_serial: 0,
        wrapped_serial_inflation: [0; 8],
        stake_min_depth: 100,
        hash_genesis_block: limit_hash(
            "0000041e482b9b9691d98eefb48473405c0b8ec31b76df3797c74a78680ef818",
        ),
        ..mainnet_consensus_params()
    }
}

fn regtest_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Regtest,
        pow_limit: limit_hash(
            "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        ),
        pos_limit: limit_hash(
            "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        ),
        pos_limit_v2: limit_hash(
            "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        ),
        last_pow_block: 250,
        stake_min_age: 0,
        stake_min_depth: 0,
        height_start_new_modifier_selection: 0,
        height_start_zc: 300,
        height_start_zc_serials_v2: 300,
        height_start_zc_public_spends: 400,
        height_last_zc_accum_checkpoint: i32::MAX,
        height_start_stake_modifier_v2: 251,
        height_start_time_protocol_v2: i32::MAX,
        height_end_fake_serial: -1,
        height_first_fraudulent: -1,
        height_recalc_accumulators: -1,
        height_enforce_invalid_utxo: -1,
        height_enforce_serial_range: 1,
        invalid_amount_filtered: 0,
        supply_before_fake_serial: 0,
        wrapped_serial_inflation: [0; 8],
        zc_required_stake_depth: 8,
        ..mainnet_consensus_params()
    }
}
