//! Proof-of-stake validation: stake modifiers, stake inputs, kernels.

pub mod input;
pub mod kernel;
pub mod modifier;
pub mod signature;
pub mod slots;

pub use input::{ScriptVerifier, StakeInput, TxResolver};
pub use kernel::StakeModifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeError {
    /// Coinstake input could not be understood.
    BadStakeInput(&'static str),
    /// The coin's origin block could not be located.
    OriginNotFound,
    /// Unlocking script failed verification.
    ScriptInvalid,
    /// Stake proof bound to a different accumulator snapshot.
    AccumulatorMismatch,
    /// Anonymous stake outside its historical eligibility window.
    OutsideEligibilityWindow,
    /// Minimum age/depth not reached.
    StakeTooYoung,
    /// Kernel hash at or above the weighted target.
    KernelMiss,
    /// No usable stake modifier for this kernel.
    ModifierUnavailable,
    /// Candidate timestamp collides with the previous block's slot.
    SlotConflict,
}

impl std::fmt::Display for StakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StakeError::BadStakeInput(message) => write!(f, "{message}"),
            StakeError::OriginNotFound => write!(f, "stake origin block not found"),
            StakeError::ScriptInvalid => write!(f, "coinstake unlocking script invalid"),
            StakeError::AccumulatorMismatch => {
                write!(f, "stake accumulator checksum mismatch")
            }
            StakeError::OutsideEligibilityWindow => {
                write!(f, "anonymous stake outside eligibility window")
            }
            StakeError::StakeTooYoung => write!(f, "stake does not meet min age or depth"),
            StakeError::KernelMiss => write!(f, "kernel hash does not meet weighted target"),
            StakeError::ModifierUnavailable => write!(f, "stake modifier unavailable"),
            StakeError::SlotConflict => write!(f, "stake time collides with previous block"),
        }
    }
}

impl std::error::Error for StakeError {}
