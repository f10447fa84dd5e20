//! Consensus constants, network parameters, and height-gated rule sets.

pub mod constants;
pub mod money;
pub mod params;
pub mod rules;

pub use params::{consensus_params, ConsensusParams, Network};
pub use rules::ActiveRules;

pub type Hash256 = [u8; 32];
