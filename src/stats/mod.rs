//! Read-side aggregator: rankings, streaks and titles derived from the ledger.
//!
//! Everything here is a pure function of a [`LedgerSnapshot`] and a
//! [`Period`]; nothing is stored. Titles are lists of tied holders, an empty
//! list meaning nobody qualifies.

mod cache;
mod complex;
mod period;
mod player_stats;
mod roster;
mod titles;

pub use cache::StatsCache;
pub use complex::{
    complex_stats, ComplexStats, PairRecord, Positions, Ranking, RateRecord, Streak, Streaks,
};
pub use period::{parse_date, Period};
pub use player_stats::{player_stats, PlayerStats, Relation, Tally};
pub use roster::{
    match_history, players_level, HistorySeat, MatchHistoryItem, MatchHistoryPage, PlayerLevel,
    MAX_PER_PAGE,
};
pub use titles::{
    base_match_stats, historical_stats, Activity, ActivityRecord, BaseMatchStats, CasanovaRecord,
    Classico, ClassicoSide, CountRecord, FidelityRecord, FirstBloodRecord, HistoricalStats,
    LunchRecord, RevengeRecord,
};

use crate::config::GameConfig;
use crate::models::{Match, PlayerId};
use crate::store::LedgerSnapshot;
use std::cmp::Ordering;

/// Minimum sample sizes, read from [`GameConfig`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatsThresholds {
    pub partner: u32,
    pub pair: u32,
    pub position: u32,
    pub title: u32,
    pub streak: u32,
    pub revenge: u32,
    pub classico: u32,
    pub first_blood: u32,
}

impl StatsThresholds {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            partner: config.count("min_partner_matches").max(1),
            pair: config.count("min_pair_matches").max(1),
            position: config.count("min_position_matches").max(1),
            title: config.count("min_title_matches").max(1),
            streak: config.count("min_streak_length").max(1),
            revenge: config.count("min_revenge_opportunities").max(1),
            classico: config.count("min_classico_matches").max(1),
            first_blood: config.count("min_first_blood_matches").max(1),
        }
    }
}

/// Exact fraction, ordered by value without floating point.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Ratio {
    pub num: u32,
    pub den: u32,
}

impl Ratio {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Percentage rounded to two decimals; 0 for an empty sample.
    pub fn percent(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        (f64::from(self.num) / f64::from(self.den) * 10_000.0).round() / 100.0
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ratio {}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = u64::from(self.num) * u64::from(other.den.max(1));
        let rhs = u64::from(other.num) * u64::from(self.den.max(1));
        lhs.cmp(&rhs)
    }
}

/// Every item tied with the best according to `key` (higher is better).
/// Holders come out in the input order.
pub(crate) fn leaders<T, K: Ord>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let Some(best) = items.iter().map(&key).max() else {
        return Vec::new();
    };
    items.into_iter().filter(|item| key(item) == best).collect()
}

/// Matches inside the period, chronological.
pub(crate) fn in_period<'a>(snapshot: &'a LedgerSnapshot, period: &Period) -> Vec<&'a Match> {
    snapshot
        .matches
        .iter()
        .filter(|m| period.contains(m.date))
        .collect()
}

/// Unordered pair key.
pub(crate) fn pair_key(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
