//! Consensus-wide constants shared across validation.

/// Blocks at or above this version hash the accumulator checkpoint field.
pub const ZC_HEADER_VERSION: i32 = 5;
/// Block version required once time protocol v2 activates.
pub const TIME_PROTOCOL_V2_BLOCK_VERSION: i32 = 7;

/// Interval, in seconds, between legacy stake-modifier recomputations.
pub const MODIFIER_INTERVAL: i64 = 60;
/// Ratio controlling how fast the legacy selection sections shrink.
pub const MODIFIER_INTERVAL_RATIO: i64 = 3;
/// Seconds a legacy kernel modifier must postdate the coin's origin block.
pub const OLD_MODIFIER_INTERVAL: i64 = 2_087;
/// Number of selection rounds (entropy bits) in a legacy modifier.
pub const MODIFIER_SELECTION_ROUNDS: usize = 64;

/// Maximum reorg length accepted under normal conditions.
pub const MAX_REORG_DEPTH: i64 = 100;

/// The index of the coinstake transaction inside a proof-of-stake block.
pub const COINSTAKE_TX_INDEX: usize = 1;
