//! Settlement ledger: atomic settle / reverse over a [`Store`].
//!
//! Each operation is a read-compute-commit cycle. The commit carries the
//! player versions read at the start; if another settlement touched one of
//! those players meanwhile the store rejects the whole write set and the
//! cycle restarts from fresh reads.

use crate::logic::progression::{settle_seats, ProgressionRules};
use crate::models::{
    ConflictError, LeagueError, LevelTable, Match, MatchId, MatchRequest, Player,
    PlayerUpdateResult, SeatSnapshot,
};
use crate::store::{PlayerWrite, Store, WriteSet};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;

const DEFAULT_MAX_ATTEMPTS: u32 = 8;
const DEFAULT_BACKOFF_MS: u64 = 5;

/// A committed match and what it did to each player.
#[derive(Clone, Debug)]
pub struct Settlement {
    pub record: Match,
    pub results: Vec<PlayerUpdateResult>,
}

/// A deleted match; `old_*` is the state just before, `new_*` the restored one.
#[derive(Clone, Debug)]
pub struct Reversal {
    pub match_id: MatchId,
    pub restored: Vec<PlayerUpdateResult>,
}

pub struct Ledger<S> {
    store: Arc<S>,
    max_attempts: u32,
    backoff_ms: u64,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_attempts: self.max_attempts,
            backoff_ms: self.backoff_ms,
        }
    }
}

impl<S: Store> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }

    /// Attempts per operation and the upper bound of the random pause between them.
    pub fn with_retry(mut self, max_attempts: u32, backoff_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_ms = backoff_ms;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `attempt` until it succeeds or fails with something other than a stale write.
    pub(crate) fn retry<T>(
        &self,
        op: &str,
        mut attempt: impl FnMut() -> Result<T, LeagueError>,
    ) -> Result<T, LeagueError> {
        let mut rng = rand::thread_rng();
        for n in 1..=self.max_attempts {
            match attempt() {
                Err(LeagueError::Conflict(ConflictError::StaleWrite(id))) => {
                    log::debug!("{}: player {} changed underneath (attempt {})", op, id, n);
                    if self.backoff_ms > 0 && n < self.max_attempts {
                        let pause = rng.gen_range(0..=self.backoff_ms * u64::from(n));
                        std::thread::sleep(std::time::Duration::from_millis(pause));
                    }
                }
                other => return other,
            }
        }
        log::warn!("{}: giving up after {} attempts", op, self.max_attempts);
        Err(ConflictError::RetriesExhausted(self.max_attempts).into())
    }

    /// Settle a validated match dated `date`.
    pub fn settle(
        &self,
        request: &MatchRequest,
        date: DateTime<Utc>,
    ) -> Result<Settlement, LeagueError> {
        self.retry("settle", || self.try_settle(request, date))
    }

    fn try_settle(
        &self,
        request: &MatchRequest,
        date: DateTime<Utc>,
    ) -> Result<Settlement, LeagueError> {
        let config = self.store.game_config()?;
        let rules = ProgressionRules::from_config(&config);
        let levels = self.store.levels()?;

        let window = Duration::seconds(config.duplicate_window_secs());
        if window > Duration::zero() {
            let recent = self.store.recent_matches(date - window)?;
            if let Some(dup) = recent
                .iter()
                .find(|m| m.date <= date + window && m.same_lineup(request))
            {
                return Err(ConflictError::DuplicateMatch(dup.id).into());
            }
        }

        let players = self.store.load_players(&request.players)?;
        for p in &players {
            if p.mana == 0 || p.hp == 0 {
                log::warn!(
                    "{} plays with {} mana and {} hp",
                    p.pseudo,
                    p.mana,
                    p.hp
                );
            }
        }

        let outcomes = settle_seats(request, &players, &levels, &rules)?;
        let mut writes = Vec::with_capacity(outcomes.len());
        let mut snapshots = Vec::with_capacity(outcomes.len());
        let mut results = Vec::with_capacity(outcomes.len());
        for (outcome, player) in outcomes.iter().zip(&players) {
            let mut updated = player.clone();
            updated.set_resources(outcome.after);
            writes.push(PlayerWrite::update(updated));
            snapshots.push(SeatSnapshot {
                player_id: outcome.player_id,
                before: outcome.before,
                after: outcome.after,
            });
            results.push(PlayerUpdateResult {
                player_id: player.id,
                pseudo: player.pseudo.clone(),
                old_exp: outcome.before.exp,
                new_exp: outcome.after.exp,
                old_mana: outcome.before.mana,
                new_mana: outcome.after.mana,
                old_hp: outcome.before.hp,
                new_hp: outcome.after.hp,
                old_level: outcome.old_level,
                new_level: outcome.new_level,
            });
        }
        let seats: [SeatSnapshot; 4] = snapshots
            .try_into()
            .map_err(|_| LeagueError::Storage("expected four seats".into()))?;
        let record = Match::new(date, seats, request);

        self.store.commit(WriteSet {
            players: writes,
            insert_match: Some(record.clone()),
            ..Default::default()
        })?;

        for r in &results {
            log::info!(
                "{}: exp {} -> {}, mana {} -> {}, hp {} -> {}",
                r.pseudo,
                r.old_exp,
                r.new_exp,
                r.old_mana,
                r.new_mana,
                r.old_hp,
                r.new_hp
            );
        }
        Ok(Settlement { record, results })
    }

    /// Undo a settlement: restore every seat's `before` snapshot and drop the record.
    pub fn reverse(&self, match_id: MatchId) -> Result<Reversal, LeagueError> {
        self.retry("reverse", || self.try_reverse(match_id))
    }

    fn try_reverse(&self, match_id: MatchId) -> Result<Reversal, LeagueError> {
        let record = self
            .store
            .load_match(match_id)?
            .ok_or(LeagueError::MatchNotFound(match_id))?;
        let levels = self.store.levels()?;
        let players = self.store.load_players(&record.players())?;

        let mut writes = Vec::with_capacity(4);
        let mut restored = Vec::with_capacity(4);
        for ((_, seat), player) in record.seats().zip(&players) {
            restored.push(restore_row(player, seat, &levels));
            let mut updated = player.clone();
            updated.set_resources(seat.before);
            writes.push(PlayerWrite::update(updated));
        }

        self.store.commit(WriteSet {
            players: writes,
            delete_match: Some(match_id),
            ..Default::default()
        })?;
        log::info!("Reversed match {} ({} players restored)", match_id, restored.len());
        Ok(Reversal { match_id, restored })
    }
}

fn restore_row(player: &Player, seat: &SeatSnapshot, levels: &LevelTable) -> PlayerUpdateResult {
    PlayerUpdateResult {
        player_id: player.id,
        pseudo: player.pseudo.clone(),
        old_exp: player.exp,
        new_exp: seat.before.exp,
        old_mana: player.mana,
        new_mana: seat.before.mana,
        old_hp: player.hp,
        new_hp: seat.before.hp,
        old_level: levels.level_for(player.exp).level,
        new_level: levels.level_for(seat.before.exp).level,
    }
}
