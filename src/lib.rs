//! Babyfoot league: match settlement, exp/level progression and stats.

pub mod config;
pub mod events;
pub mod logic;
pub mod models;
pub mod service;
pub mod stats;
pub mod store;

pub use config::{AppConfig, GameConfig, StoreUrl};
pub use events::LedgerEvent;
pub use logic::{match_warnings, validate_match, Ledger, Reversal, Settlement};
pub use models::{
    ConflictError, LeagueError, Level, LevelTable, LevelWithInfo, Match, MatchId, MatchRequest,
    MatchSubmission, Player, PlayerId, PlayerUpdateResult, Seat, Team, ValidationError,
};
pub use service::League;
pub use store::{open_store, LedgerSnapshot, MemoryStore, Store};
