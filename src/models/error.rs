//! Error taxonomy shared by the validator, ledger, store and aggregator.

use crate::models::game::{MatchId, Seat, Team};
use crate::models::player::PlayerId;
use thiserror::Error;

/// Malformed input: reported to the submitter, nothing is written.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("all four players must be specified ({0} is empty)")]
    MissingPlayer(Seat),
    #[error("{seat} is not a valid player id")]
    MalformedPlayerId { seat: Seat },
    #[error("the four players must be different")]
    DuplicatePlayer,
    #[error("scores must be between 0 and 10 ({team} scored {score})")]
    ScoreOutOfRange { team: Team, score: i32 },
    #[error("one of the scores must be 10")]
    NoWinningScore,
    #[error("a match cannot end in a tie")]
    Tie,
    #[error("pseudo must be between 3 and 20 characters (got {len})")]
    PseudoLength { len: usize },
    #[error("pseudo '{0}' is already taken")]
    PseudoTaken(String),
    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),
    #[error("period start must be before its end")]
    InvalidPeriod,
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Retryable write conflicts.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConflictError {
    #[error("this match has already been recorded ({0})")]
    DuplicateMatch(MatchId),
    #[error("player {0} was updated concurrently")]
    StaleWrite(PlayerId),
    #[error("gave up after {0} conflicting attempts")]
    RetriesExhausted(u32),
}

#[derive(Debug, Error)]
pub enum LeagueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("player {0} does not exist")]
    UnknownPlayer(PlayerId),
    /// Configuration-integrity fault, not caused by the request.
    #[error("level table is malformed: {0}")]
    InvalidLevelTable(String),
    #[error("match {0} does not exist")]
    MatchNotFound(MatchId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl LeagueError {
    /// Only conflicts may succeed when resubmitted unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LeagueError::Conflict(_))
    }

    /// Stable machine-readable name for API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LeagueError::Validation(_) => "validation",
            LeagueError::Conflict(_) => "conflict",
            LeagueError::UnknownPlayer(_) => "reference",
            LeagueError::InvalidLevelTable(_) => "integrity",
            LeagueError::MatchNotFound(_) => "not_found",
            LeagueError::Storage(_) => "storage",
            LeagueError::Config(_) => "config",
        }
    }
}

impl From<csv::Error> for LeagueError {
    fn from(e: csv::Error) -> Self {
        LeagueError::Storage(format!("csv: {}", e))
    }
}
