//! Data structures for the league: players, levels, matches, errors.

mod decay;
mod error;
mod game;
mod level;
mod player;

pub use decay::DecayRecord;
pub use error::{ConflictError, LeagueError, ValidationError};
pub use game::{
    Match, MatchId, MatchRequest, MatchSubmission, PlayerUpdateResult, Role, Seat, SeatSnapshot,
    Team, WINNING_SCORE,
};
pub use level::{Level, LevelProgress, LevelTable, LevelWithInfo};
pub use player::{normalize_pseudo, Player, PlayerId, Resources, PSEUDO_MAX_LEN, PSEUDO_MIN_LEN};
