//! Consensus primitives: encoding, hashes, scripts, transactions, blocks.

pub mod block;
pub mod encoding;
pub mod hash;
pub mod outpoint;
pub mod script;
pub mod transaction;

pub use vitaed_consensus::Hash256;
