//! League business logic: validation, progression, settlement, decay, roster.

mod decay;
mod ledger;
mod progression;
mod roster;
mod validation;

pub use ledger::{Ledger, Reversal, Settlement};
pub use progression::{
    apply_delta, compute_deltas, consolation, settle_seats, win_reward, Delta, ProgressionRules,
    SeatDelta, SeatOutcome,
};
pub use validation::{match_warnings, validate_match, PlayerWarning, Warning};
