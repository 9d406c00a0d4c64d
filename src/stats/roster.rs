//! Level snapshot and paginated match history.

use crate::models::{MatchId, PlayerId, Seat, Team};
use crate::store::LedgerSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MAX_PER_PAGE: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerLevel {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub level: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub illustration: Option<String>,
    pub exp: u32,
    pub required_exp: u32,
    pub exp_given: u32,
    pub next_level_exp: Option<u32>,
    /// Percent of the way to the next level.
    pub progress: f64,
    pub hp: u32,
    pub mana: u32,
    pub disable: bool,
}

/// Current level of every player, highest level then exp first.
pub fn players_level(snapshot: &LedgerSnapshot, include_disabled: bool) -> Vec<PlayerLevel> {
    let levels = &snapshot.levels;
    let mut rows: Vec<PlayerLevel> = snapshot
        .players
        .iter()
        .filter(|p| include_disabled || !p.disable)
        .map(|p| {
            let current = levels.level_for(p.exp);
            let progress = levels.progress(p.exp);
            let display = levels.display_source(current.level);
            PlayerLevel {
                player_id: p.id,
                pseudo: p.pseudo.clone(),
                level: current.level,
                title: display.and_then(|l| l.title.clone()),
                description: display.and_then(|l| l.description.clone()),
                illustration: display.and_then(|l| l.illustration.clone()),
                exp: p.exp,
                required_exp: progress.required_exp,
                exp_given: current.exp_given,
                next_level_exp: progress.next_level_exp,
                progress: progress.progress,
                hp: p.hp,
                mana: p.mana,
                disable: p.disable,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.level
            .cmp(&a.level)
            .then_with(|| b.exp.cmp(&a.exp))
            .then_with(|| a.pseudo.cmp(&b.pseudo))
    });
    rows
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistorySeat {
    pub seat: Seat,
    pub player_id: PlayerId,
    pub pseudo: String,
    /// Level when the match was played.
    pub level: u32,
    pub exp_gained: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchHistoryItem {
    pub id: MatchId,
    pub date: DateTime<Utc>,
    pub score_white: u8,
    pub score_black: u8,
    pub winner: Team,
    pub added_by: Option<PlayerId>,
    pub seats: Vec<HistorySeat>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MatchHistoryPage {
    pub matches: Vec<MatchHistoryItem>,
    pub total_count: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Newest first. `page` counts from 1; `per_page` is clamped to `1..=100`.
pub fn match_history(
    snapshot: &LedgerSnapshot,
    player: Option<PlayerId>,
    page: usize,
    per_page: usize,
) -> MatchHistoryPage {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let selected: Vec<_> = snapshot
        .matches
        .iter()
        .rev()
        .filter(|m| player.map_or(true, |id| m.seat_of(id).is_some()))
        .collect();

    let matches = selected
        .iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .map(|m| MatchHistoryItem {
            id: m.id,
            date: m.date,
            score_white: m.score_white,
            score_black: m.score_black,
            winner: m.winner(),
            added_by: m.added_by,
            seats: m
                .seats()
                .map(|(seat, snap)| HistorySeat {
                    seat,
                    player_id: snap.player_id,
                    pseudo: snapshot.pseudo(snap.player_id),
                    level: snapshot.levels.level_for(snap.before.exp).level,
                    exp_gained: snap.exp_gained(),
                })
                .collect(),
        })
        .collect();

    MatchHistoryPage {
        matches,
        total_count: selected.len(),
        page,
        per_page,
    }
}
