//! Periodic gauge jobs: weekly regeneration/decay and full reset.

use crate::logic::ledger::Ledger;
use crate::models::{DecayRecord, LeagueError, Player, Resources};
use crate::store::{PlayerWrite, Store, WriteSet};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

impl<S: Store> Ledger<S> {
    /// Weekly job over every enabled player.
    ///
    /// Mana and HP regenerate by the configured amounts (bounded by the max).
    /// Players with fewer than `min_weekly_matches` in the last seven days
    /// lose `decay_pct` of their exp, but never drop below their current
    /// level's threshold.
    pub fn weekly_decay(&self, now: DateTime<Utc>) -> Result<Vec<DecayRecord>, LeagueError> {
        self.retry("weekly_decay", || self.try_weekly_decay(now))
    }

    fn try_weekly_decay(&self, now: DateTime<Utc>) -> Result<Vec<DecayRecord>, LeagueError> {
        let snapshot = self.store().snapshot()?;
        let config = &snapshot.config;
        let mana_regen = config.count("weekly_mana_regen");
        let hp_regen = config.count("weekly_hp_regen");
        let min_matches = config.count("min_weekly_matches");
        let decay_pct = config.count("decay_pct").min(100);

        let since = now - Duration::days(7);
        let mut played: HashMap<_, u32> = HashMap::new();
        for m in snapshot.matches.iter().filter(|m| m.date >= since && m.date < now) {
            for id in m.players() {
                *played.entry(id).or_default() += 1;
            }
        }

        let mut writes = Vec::new();
        let mut history = Vec::new();
        for player in snapshot.players.iter().filter(|p| !p.disable) {
            let matches_played = played.get(&player.id).copied().unwrap_or(0);
            let mana = player.mana.saturating_add(mana_regen).min(config.max_mana());
            let hp = player.hp.saturating_add(hp_regen).min(config.max_hp());
            let exp = if matches_played < min_matches {
                let floor = snapshot.levels.level_for(player.exp).min_exp;
                let lost = (u64::from(player.exp) * u64::from(decay_pct) / 100) as u32;
                player.exp.saturating_sub(lost).max(floor)
            } else {
                player.exp
            };
            let after = Resources { exp, hp, mana };
            if after == player.resources() {
                continue;
            }
            history.push(DecayRecord {
                id: Uuid::new_v4(),
                player_id: player.id,
                decay_date: now,
                exp_before: player.exp,
                exp_after: exp,
                mana_added: mana.saturating_sub(player.mana),
                hp_added: hp.saturating_sub(player.hp),
                matches_played,
            });
            let mut updated = player.clone();
            updated.set_resources(after);
            writes.push(PlayerWrite::update(updated));
        }

        if writes.is_empty() {
            return Ok(history);
        }
        self.store().commit(WriteSet {
            players: writes,
            decay_history: history.clone(),
            ..Default::default()
        })?;
        log::info!("Weekly decay applied to {} players", history.len());
        Ok(history)
    }

    /// Refill every player's HP and mana to the configured maxima.
    pub fn reset_hp_mana(&self) -> Result<usize, LeagueError> {
        self.retry("reset_hp_mana", || {
            let snapshot = self.store().snapshot()?;
            let max_hp = snapshot.config.max_hp();
            let max_mana = snapshot.config.max_mana();
            let writes: Vec<PlayerWrite> = snapshot
                .players
                .iter()
                .filter(|p| p.hp != max_hp || p.mana != max_mana)
                .map(|p| {
                    let mut updated: Player = p.clone();
                    updated.hp = max_hp;
                    updated.mana = max_mana;
                    PlayerWrite::update(updated)
                })
                .collect();
            let count = writes.len();
            if count > 0 {
                self.store().commit(WriteSet {
                    players: writes,
                    ..Default::default()
                })?;
            }
            log::info!("Reset HP and mana of {} players", count);
            Ok(count)
        })
    }
}
