//! Block-connect orchestration: spend validation, serial indexes, supply.

pub mod serials;
pub mod spend;
pub mod state;
pub mod supply;

pub use spend::{TxOutSource, ZerocoinError};
pub use state::{ChainState, ValidationFailure};
pub use supply::SupplyError;

use vitaed_chain::ChainError;
use vitaed_pow::validation::PowError;
use vitaed_stake::StakeError;
use vitaed_storage::StoreError;

#[derive(Debug)]
pub enum ChainStateError {
    InvalidBlock(&'static str),
    Chain(ChainError),
    Pow(PowError),
    Stake(StakeError),
    Zerocoin(ZerocoinError),
    Supply(SupplyError),
    Store(StoreError),
}

impl std::fmt::Display for ChainStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainStateError::InvalidBlock(message) => write!(f, "{message}"),
            ChainStateError::Chain(err) => write!(f, "{err}"),
            ChainStateError::Pow(err) => write!(f, "{err}"),
            ChainStateError::Stake(err) => write!(f, "{err}"),
            ChainStateError::Zerocoin(err) => write!(f, "{err}"),
            ChainStateError::Supply(err) => write!(f, "{err}"),
            ChainStateError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ChainStateError {}

impl From<ChainError> for ChainStateError {
    fn from(err: ChainError) -> Self {
        ChainStateError::Chain(err)
    }
}

impl From<PowError> for ChainStateError {
    fn from(err: PowError) -> Self {
        ChainStateError::Pow(err)
    }
}

impl From<StakeError> for ChainStateError {
    fn from(err: StakeError) -> Self {
        ChainStateError::Stake(err)
    }
}

impl From<ZerocoinError> for ChainStateError {
    fn from(err: ZerocoinError) -> Self {
        ChainStateError::Zerocoin(err)
    }
}

impl From<SupplyError> for ChainStateError {
    fn from(err: SupplyError) -> Self {
        ChainStateError::Supply(err)
    }
}

impl From<StoreError> for ChainStateError {
    fn from(err: StoreError) -> Self {
        ChainStateError::Store(err)
    }
}
