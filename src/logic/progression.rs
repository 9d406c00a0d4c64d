//! Progression calculator: match outcome -> per-player exp/hp/mana deltas.
//!
//! Winners earn the `exp_given` of their current level, scaled by the goal
//! margin. Losers earn a small consolation. Everyone spends mana, losers lose
//! HP. Gauges are clamped to `[0, max]`; exp only ever goes up here.

use crate::config::GameConfig;
use crate::models::{
    LeagueError, LevelTable, MatchRequest, Player, PlayerId, Resources, Seat, WINNING_SCORE,
};
use serde::Serialize;

/// Numbers the calculator needs, read once from [`GameConfig`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgressionRules {
    pub max_hp: u32,
    pub max_mana: u32,
    pub min_reward_pct: u32,
    pub consolation_pct: u32,
    pub mana_cost: u32,
    pub hp_cost_defeat: u32,
    pub hp_cost_perfect_defeat: u32,
}

impl ProgressionRules {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            max_hp: config.max_hp(),
            max_mana: config.max_mana(),
            min_reward_pct: config.count("min_reward_pct").min(100),
            consolation_pct: config.count("consolation_pct").min(100),
            mana_cost: config.count("mana_cost"),
            hp_cost_defeat: config.count("hp_cost_defeat"),
            hp_cost_perfect_defeat: config.count("hp_cost_perfect_defeat"),
        }
    }
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

/// Change to one player's gauges. Exp is a gain, never a loss.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Delta {
    pub exp: u32,
    pub hp: i64,
    pub mana: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct SeatDelta {
    pub seat: Seat,
    pub player_id: PlayerId,
    pub delta: Delta,
}

/// Full before/after picture for one seat.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SeatOutcome {
    pub seat: Seat,
    pub player_id: PlayerId,
    pub before: Resources,
    pub after: Resources,
    pub old_level: u32,
    pub new_level: u32,
}

/// Winner reward for a level's `exp_given`.
///
/// Linear in the margin from `min_reward_pct` (10-9) up to 100% (10-0).
pub fn win_reward(exp_given: u32, margin: u8, min_reward_pct: u32) -> u32 {
    let margin = u64::from(margin.clamp(1, WINNING_SCORE));
    let min = u64::from(min_reward_pct.min(100));
    let pct = min + (100 - min) * (margin - 1) / 9;
    (u64::from(exp_given) * pct / 100) as u32
}

pub fn consolation(exp_given: u32, consolation_pct: u32) -> u32 {
    (u64::from(exp_given) * u64::from(consolation_pct.min(100)) / 100) as u32
}

fn find<'a>(players: &'a [Player], id: PlayerId) -> Result<&'a Player, LeagueError> {
    players
        .iter()
        .find(|p| p.id == id)
        .ok_or(LeagueError::UnknownPlayer(id))
}

/// Deltas for the four seats, in [`Seat::ALL`] order.
pub fn compute_deltas(
    request: &MatchRequest,
    players: &[Player],
    levels: &LevelTable,
    rules: &ProgressionRules,
) -> Result<Vec<SeatDelta>, LeagueError> {
    let winner = request.winner();
    let margin = request.margin();
    let perfect = request.score(winner.opponent()) == 0;

    Seat::ALL
        .into_iter()
        .map(|seat| {
            let player = find(players, request.player(seat))?;
            let exp_given = levels.level_for(player.exp).exp_given;
            let won = seat.team == winner;
            let delta = if won {
                Delta {
                    exp: win_reward(exp_given, margin, rules.min_reward_pct),
                    hp: 0,
                    mana: -i64::from(rules.mana_cost),
                }
            } else {
                let hp_cost = if perfect {
                    rules.hp_cost_perfect_defeat
                } else {
                    rules.hp_cost_defeat
                };
                Delta {
                    exp: consolation(exp_given, rules.consolation_pct),
                    hp: -i64::from(hp_cost),
                    mana: -i64::from(rules.mana_cost),
                }
            };
            Ok(SeatDelta {
                seat,
                player_id: player.id,
                delta,
            })
        })
        .collect()
}

fn bounded(value: u32, delta: i64, max: u32) -> u32 {
    (i64::from(value) + delta).clamp(0, i64::from(max)) as u32
}

/// Apply a delta to a resource triple under the configured bounds.
pub fn apply_delta(before: Resources, delta: Delta, rules: &ProgressionRules) -> Resources {
    Resources {
        exp: before.exp.saturating_add(delta.exp),
        hp: bounded(before.hp, delta.hp, rules.max_hp),
        mana: bounded(before.mana, delta.mana, rules.max_mana),
    }
}

/// Deltas applied: before/after resources and levels for every seat.
pub fn settle_seats(
    request: &MatchRequest,
    players: &[Player],
    levels: &LevelTable,
    rules: &ProgressionRules,
) -> Result<Vec<SeatOutcome>, LeagueError> {
    let deltas = compute_deltas(request, players, levels, rules)?;
    deltas
        .into_iter()
        .map(|d| {
            let player = find(players, d.player_id)?;
            let before = player.resources();
            let after = apply_delta(before, d.delta, rules);
            Ok(SeatOutcome {
                seat: d.seat,
                player_id: d.player_id,
                before,
                after,
                old_level: levels.level_for(before.exp).level,
                new_level: levels.level_for(after.exp).level,
            })
        })
        .collect()
}
