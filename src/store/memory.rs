//! In-process store: every table behind one `RwLock`.
//!
//! Commits take the write lock for validation and application together, so
//! a snapshot (read lock) never sees half a settlement.

use super::{stale, LedgerSnapshot, Store, WriteSet};
use crate::config::GameConfig;
use crate::models::{
    ConflictError, DecayRecord, LeagueError, LevelTable, Match, MatchId, Player, PlayerId,
    ValidationError,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    players: HashMap<PlayerId, Player>,
    /// Insertion order; sorted by date on read.
    matches: Vec<Match>,
    levels: LevelTable,
    config: GameConfig,
    decay_history: Vec<DecayRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn lock_error() -> LeagueError {
    LeagueError::Storage("lock error".into())
}

impl MemoryStore {
    pub fn new(levels: LevelTable, config: GameConfig) -> Self {
        Self::seeded(levels, config, Vec::new())
    }

    /// Store pre-filled with player rows (versions are reset to 0).
    pub fn seeded(levels: LevelTable, config: GameConfig, players: Vec<Player>) -> Self {
        let players = players
            .into_iter()
            .map(|mut p| {
                p.version = 0;
                (p.id, p)
            })
            .collect();
        Self {
            tables: RwLock::new(Tables {
                players,
                matches: Vec::new(),
                levels,
                config,
                decay_history: Vec::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, LeagueError> {
        self.tables.read().map_err(|_| lock_error())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, LeagueError> {
        self.tables.write().map_err(|_| lock_error())
    }

    pub fn decay_history(&self) -> Result<Vec<DecayRecord>, LeagueError> {
        Ok(self.read()?.decay_history.clone())
    }

    pub fn match_count(&self) -> Result<usize, LeagueError> {
        Ok(self.read()?.matches.len())
    }
}

fn chronological(matches: &[Match]) -> Vec<Match> {
    let mut sorted = matches.to_vec();
    // stable: equal dates keep insertion order
    sorted.sort_by_key(|m| m.date);
    sorted
}

/// Every check a commit must pass, run before anything is applied.
fn check(tables: &Tables, writes: &WriteSet) -> Result<(), LeagueError> {
    for w in &writes.players {
        let id = w.player.id;
        match (w.expected_version, tables.players.get(&id)) {
            (Some(v), Some(current)) if current.version == v => {}
            (Some(_), Some(_)) => return Err(stale(id)),
            (Some(_), None) => return Err(LeagueError::UnknownPlayer(id)),
            (None, Some(_)) => {
                return Err(LeagueError::Storage(format!("player {} already exists", id)))
            }
            (None, None) => {}
        }
        let pseudo = w.player.pseudo.to_lowercase();
        let taken = tables
            .players
            .values()
            .any(|p| p.id != id && p.pseudo.to_lowercase() == pseudo);
        if taken {
            return Err(ValidationError::PseudoTaken(w.player.pseudo.clone()).into());
        }
    }
    if let Some(id) = writes.delete_match {
        if !tables.matches.iter().any(|m| m.id == id) {
            return Err(LeagueError::MatchNotFound(id));
        }
    }
    if let Some(m) = &writes.insert_match {
        if tables.matches.iter().any(|existing| existing.id == m.id) {
            return Err(ConflictError::DuplicateMatch(m.id).into());
        }
        for id in m.players() {
            let known = tables.players.contains_key(&id)
                || writes.players.iter().any(|w| w.player.id == id);
            if !known {
                return Err(LeagueError::UnknownPlayer(id));
            }
        }
    }
    Ok(())
}

impl Store for MemoryStore {
    fn load_players(&self, ids: &[PlayerId]) -> Result<Vec<Player>, LeagueError> {
        let tables = self.read()?;
        ids.iter()
            .map(|id| {
                tables
                    .players
                    .get(id)
                    .cloned()
                    .ok_or(LeagueError::UnknownPlayer(*id))
            })
            .collect()
    }

    fn load_match(&self, id: MatchId) -> Result<Option<Match>, LeagueError> {
        Ok(self.read()?.matches.iter().find(|m| m.id == id).cloned())
    }

    fn recent_matches(&self, since: DateTime<Utc>) -> Result<Vec<Match>, LeagueError> {
        let tables = self.read()?;
        let recent: Vec<Match> = tables
            .matches
            .iter()
            .filter(|m| m.date >= since)
            .cloned()
            .collect();
        Ok(chronological(&recent))
    }

    fn levels(&self) -> Result<LevelTable, LeagueError> {
        Ok(self.read()?.levels.clone())
    }

    fn game_config(&self) -> Result<GameConfig, LeagueError> {
        Ok(self.read()?.config.clone())
    }

    fn commit(&self, writes: WriteSet) -> Result<(), LeagueError> {
        let mut tables = self.write()?;
        check(&tables, &writes)?;

        for w in writes.players {
            let mut player = w.player;
            player.version = w.expected_version.map_or(0, |v| v + 1);
            tables.players.insert(player.id, player);
        }
        if let Some(id) = writes.delete_match {
            tables.matches.retain(|m| m.id != id);
        }
        if let Some(m) = writes.insert_match {
            tables.matches.push(m);
        }
        tables.decay_history.extend(writes.decay_history);
        Ok(())
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, LeagueError> {
        let tables = self.read()?;
        let mut players: Vec<Player> = tables.players.values().cloned().collect();
        players.sort_by(|a, b| a.pseudo.cmp(&b.pseudo).then(a.id.cmp(&b.id)));
        Ok(LedgerSnapshot {
            players,
            matches: chronological(&tables.matches),
            levels: tables.levels.clone(),
            config: tables.config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PlayerWrite;

    fn store_with(pseudos: &[&str]) -> (MemoryStore, Vec<Player>) {
        let players: Vec<Player> = pseudos.iter().map(|p| Player::new(*p, 10, 10)).collect();
        let store = MemoryStore::seeded(LevelTable::default(), GameConfig::new(), players.clone());
        (store, players)
    }

    #[test]
    fn stale_version_is_rejected_and_nothing_applies() {
        let (store, players) = store_with(&["Anna", "Bert"]);
        let mut a = players[0].clone();
        a.exp = 10;
        store.commit(WriteSet {
            players: vec![PlayerWrite::update(a.clone())],
            ..Default::default()
        })
        .unwrap();

        // second writer still holds version 0 for Anna
        let mut b = players[1].clone();
        b.exp = 99;
        let mut stale_a = players[0].clone();
        stale_a.exp = 50;
        let err = store
            .commit(WriteSet {
                players: vec![PlayerWrite::update(b), PlayerWrite::update(stale_a)],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LeagueError::Conflict(ConflictError::StaleWrite(_))));

        let rows = store.load_players(&[players[0].id, players[1].id]).unwrap();
        assert_eq!(rows[0].exp, 10);
        assert_eq!(rows[0].version, 1);
        assert_eq!(rows[1].exp, 0);
    }

    #[test]
    fn pseudo_uniqueness_ignores_case() {
        let (store, _) = store_with(&["Anna"]);
        let err = store
            .commit(WriteSet {
                players: vec![PlayerWrite::insert(Player::new("ANNA", 10, 10))],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            LeagueError::Validation(ValidationError::PseudoTaken(_))
        ));
    }

    #[test]
    fn deleting_unknown_match_fails() {
        let (store, _) = store_with(&[]);
        let id = MatchId::new_v4();
        let err = store
            .commit(WriteSet {
                delete_match: Some(id),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LeagueError::MatchNotFound(x) if x == id));
    }
}
