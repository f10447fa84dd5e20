//! Block index and active-chain bookkeeping.

pub mod active;
pub mod index;
pub mod store;
pub mod testutil;

pub use active::ActiveChain;
pub use index::{BlockId, BlockIndex, BlockRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    UnknownParent,
    DuplicateBlock,
    UnknownBlock,
    Corrupt(&'static str),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::UnknownParent => write!(f, "previous block not in index"),
            ChainError::DuplicateBlock => write!(f, "block already indexed"),
            ChainError::UnknownBlock => write!(f, "block not in index"),
            ChainError::Corrupt(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ChainError {}
