//! The data-store seam.
//!
//! All writes go through [`Store::commit`] as one [`WriteSet`]: either every
//! row in it lands or none does. Player writes carry the version they were
//! read at; a stale version is a [`ConflictError::StaleWrite`], which the
//! ledger answers by re-reading and retrying.

mod memory;
mod seed;

pub use memory::MemoryStore;
pub use seed::{
    load_config_csv, load_levels_csv, load_players_csv, open_store, read_config, read_levels,
    read_players,
};

use crate::config::GameConfig;
use crate::models::{
    ConflictError, DecayRecord, LeagueError, LevelTable, Match, MatchId, Player, PlayerId,
};
use chrono::{DateTime, Utc};

/// One player row to write.
#[derive(Clone, Debug)]
pub struct PlayerWrite {
    pub player: Player,
    /// Version the row was read at; `None` inserts a new player.
    pub expected_version: Option<u64>,
}

impl PlayerWrite {
    /// Update of a row previously loaded from the store.
    pub fn update(player: Player) -> Self {
        let expected_version = Some(player.version);
        Self {
            player,
            expected_version,
        }
    }

    pub fn insert(player: Player) -> Self {
        Self {
            player,
            expected_version: None,
        }
    }
}

/// Everything one transaction writes.
#[derive(Clone, Debug, Default)]
pub struct WriteSet {
    pub players: Vec<PlayerWrite>,
    pub insert_match: Option<Match>,
    pub delete_match: Option<MatchId>,
    pub decay_history: Vec<DecayRecord>,
}

/// Consistent read of the whole ledger, for the aggregator.
#[derive(Clone, Debug)]
pub struct LedgerSnapshot {
    pub players: Vec<Player>,
    /// Chronological (by date, then insertion order).
    pub matches: Vec<Match>,
    pub levels: LevelTable,
    pub config: GameConfig,
}

impl LedgerSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Display name, or the id itself for a row that no longer resolves.
    pub fn pseudo(&self, id: PlayerId) -> String {
        self.player(id)
            .map(|p| p.pseudo.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

pub trait Store: Send + Sync {
    /// Rows for `ids`, in the same order. Any unknown id is an error.
    fn load_players(&self, ids: &[PlayerId]) -> Result<Vec<Player>, LeagueError>;

    fn load_match(&self, id: MatchId) -> Result<Option<Match>, LeagueError>;

    /// Matches dated at or after `since`.
    fn recent_matches(&self, since: DateTime<Utc>) -> Result<Vec<Match>, LeagueError>;

    fn levels(&self) -> Result<LevelTable, LeagueError>;

    fn game_config(&self) -> Result<GameConfig, LeagueError>;

    /// Apply the write set atomically.
    fn commit(&self, writes: WriteSet) -> Result<(), LeagueError>;

    fn snapshot(&self) -> Result<LedgerSnapshot, LeagueError>;
}

pub(crate) fn stale(id: PlayerId) -> LeagueError {
    ConflictError::StaleWrite(id).into()
}
