//! Height-resolved consensus rule sets.
//!
//! Every height-gated switch is resolved once per block into an
//! [`ActiveRules`] value and handed to the validators, so individual
//! checks never compare heights themselves.

use crate::params::ConsensusParams;
use crate::Network;

pub const PUBLIC_SPEND_VERSION_BASE: u8 = 3;
pub const PUBLIC_SPEND_VERSION_SCHNORR: u8 = 4;

#[derive(Clone, Copy, Debug)]
pub struct ActiveRules {
    pub height: i32,
    /// Anonymous coins exist at this height.
    pub zerocoin_active: bool,
    /// Spends must carry and verify a v2 serial signature.
    pub zerocoin_serials_v2: bool,
    /// Old blind spends are rejected; only public spends connect.
    pub public_spends_required: bool,
    /// Which public-spend version is accepted right now.
    pub public_spend_version: u8,
    /// Kernel hashes seed from the 256-bit modifier.
    pub stake_modifier_v2: bool,
    /// Block timestamps are slot-aligned.
    pub time_protocol_v2: bool,
    /// Inside the historical window where signature and serial-range
    /// failures are logged instead of rejected.
    pub in_fake_serial_range: bool,
    /// Mints on the historical invalid list stop counting toward supply.
    pub filter_invalid_mints: bool,
    /// Serial numeric-range violations are fatal outside the window above.
    pub enforce_serial_range: bool,
}

impl ConsensusParams {
    pub fn rules_at(&self, height: i32) -> ActiveRules {
        let in_fake_serial_range =
            self.network == Network::Mainnet && height <= self.height_end_fake_serial;
        ActiveRules {
            height,
            zerocoin_active: height >= self.height_start_zc,
            zerocoin_serials_v2: height >= self.height_start_zc_serials_v2,
            public_spends_required: height >= self.height_start_zc_public_spends,
            public_spend_version: if self.public_spend_v4 {
                PUBLIC_SPEND_VERSION_SCHNORR
            } else {
                PUBLIC_SPEND_VERSION_BASE
            },
            stake_modifier_v2: self.is_stake_modifier_v2(height),
            time_protocol_v2: self.is_time_protocol_v2(height),
            in_fake_serial_range,
            filter_invalid_mints: height >= self.height_recalc_accumulators
                && self.height_recalc_accumulators >= 0,
            enforce_serial_range: height >= self.height_enforce_serial_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::consensus_params;

    #[test]
    fn fake_serial_range_is_mainnet_only() {
        let params = consensus_params(Network::Mainnet);
        let end = params.height_end_fake_serial;
        assert!(params.rules_at(end).in_fake_serial_range);
        assert!(!params.rules_at(end + 1).in_fake_serial_range);

        let testnet = consensus_params(Network::Testnet);
        assert!(!testnet.rules_at(0).in_fake_serial_range);
    }

    #[test]
    fn public_spend_version_follows_feature_flag() {
        let mut params = consensus_params(Network::Mainnet);
        assert_eq!(
            params.rules_at(0).public_spend_version,
            PUBLIC_SPEND_VERSION_SCHNORR
        );
        params.public_spend_v4 = false;
        assert_eq!(
            params.rules_at(0).public_spend_version,
            PUBLIC_SPEND_VERSION_BASE
        );
    }

    #[test]
    fn rule_transitions_activate_at_exact_heights() {
        let params = consensus_params(Network::Mainnet);

        let h = params.height_start_zc_public_spends;
        assert!(!params.rules_at(h - 1).public_spends_required);
        assert!(params.rules_at(h).public_spends_required);

        let h = params.height_start_stake_modifier_v2;
        assert!(!params.rules_at(h - 1).stake_modifier_v2);
        assert!(params.rules_at(h).stake_modifier_v2);
    }
}
