use primitive_types::U256;
use vitaed_consensus::ConsensusParams;
use vitaed_primitives::block::BlockHeader;

use crate::compact::{compact_to_u256, CompactError};

#[derive(Debug)]
pub enum PowError {
    InvalidBits(&'static str),
    HashMismatch,
    Compact(CompactError),
}

impl std::fmt::Display for PowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowError::InvalidBits(message) => write!(f, "{message}"),
            PowError::HashMismatch => write!(f, "pow hash does not meet target"),
            PowError::Compact(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PowError {}

impl From<CompactError> for PowError {
    fn from(err: CompactError) -> Self {
        PowError::Compact(err)
    }
}

pub fn validate_pow_header(
    header: &BlockHeader,
    height: i32,
    params: &ConsensusParams,
) -> Result<(), PowError> {
    let target = compact_to_u256(header.bits)?;
    if target.is_zero() {
        return Err(PowError::InvalidBits("pow target is zero"));
    }

    let pow_limit = U256::from_little_endian(&params.pow_limit);
    if target > pow_limit {
        return Err(PowError::InvalidBits("pow target above limit"));
    }

    let hash_bytes = header.hash();
    if height == 0 && header.prev_block == [0u8; 32] && hash_bytes == params.hash_genesis_block {
        return Ok(());
    }

    let hash_value = U256::from_little_endian(&hash_bytes);
    if hash_value > target {
        return Err(PowError::HashMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitaed_consensus::params::consensus_params;
    use vitaed_consensus::Network;

    fn header(bits: u32, nonce: u32) -> BlockHeader {
        BlockHeader {
            version: 4,
            prev_block: [0x11; 32],
            merkle_root: [0u8; 32],
            time: 1_500_000_000,
            bits,
            nonce,
            accumulator_checkpoint: [0u8; 32],
        }
    }

    #[test]
    fn rejects_target_above_limit() {
        let params = consensus_params(Network::Mainnet);
        let err = validate_pow_header(&header(0x207fffff, 0), 10, &params).expect_err("too easy");
        match err {
            PowError::InvalidBits(message) => assert_eq!(message, "pow target above limit"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn accepts_hash_below_regtest_limit() {
        let params = consensus_params(Network::Regtest);
        // regtest limit is ~0 >> 1, nearly every hash passes
        let mut found = false;
        for nonce in 0..16 {
            if validate_pow_header(&header(0x207fffff, nonce), 10, &params).is_ok() {
                found = true;
                break;
            }
        }
        assert!(found, "no nonce satisfied the permissive regtest target");
    }
}
