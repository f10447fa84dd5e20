//! Time protocol v2 slots.

use vitaed_consensus::ConsensusParams;

/// Round a timestamp down to its slot boundary.
pub fn time_slot(time: i64, params: &ConsensusParams) -> i64 {
    (time / params.time_slot_length) * params.time_slot_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitaed_consensus::params::consensus_params;
    use vitaed_consensus::Network;

    #[test]
    fn rounds_down_to_fifteen_second_boundaries() {
        let params = consensus_params(Network::Mainnet);
        assert_eq!(time_slot(1_500_000_000, &params), 1_500_000_000);
        assert_eq!(time_slot(1_500_000_014, &params), 1_500_000_000);
        assert_eq!(time_slot(1_500_000_015, &params), 1_500_000_015);
    }
}
