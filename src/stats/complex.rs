//! Streaks, position and pair rankings.

use crate::models::{Match, PlayerId, Role};
use crate::stats::player_stats::Tally;
use crate::stats::{in_period, leaders, pair_key, Period, Ratio, StatsThresholds};
use crate::store::LedgerSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// A run of consecutive wins (or losses) by one player.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Streak {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub streak_length: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Streaks {
    pub longest_win_streak: Vec<Streak>,
    pub longest_lose_streak: Vec<Streak>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub total_matches: u32,
    pub wins: u32,
    pub defeats: u32,
    pub win_rate: f64,
    pub loss_rate: f64,
}

/// Best and worst holders of one ranking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ranking<T> {
    pub best: Vec<T>,
    pub worst: Vec<T>,
}

impl<T> Default for Ranking<T> {
    fn default() -> Self {
        Self {
            best: Vec::new(),
            worst: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Positions {
    pub attacker: Ranking<RateRecord>,
    pub defender: Ranking<RateRecord>,
}

/// Two players who shared a side of the table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PairRecord {
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub player1_pseudo: String,
    pub player2_pseudo: String,
    pub total_matches: u32,
    pub wins: u32,
    pub defeats: u32,
    pub win_rate: f64,
    pub loss_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComplexStats {
    pub streaks: Streaks,
    pub positions: Positions,
    pub pairs: Ranking<PairRecord>,
}

/// With `player` set, only that player's streaks, positions and pairs compete.
pub fn complex_stats(
    snapshot: &LedgerSnapshot,
    period: &Period,
    player: Option<PlayerId>,
) -> ComplexStats {
    let thresholds = StatsThresholds::from_config(&snapshot.config);
    let matches = in_period(snapshot, period);
    let wanted = |id: PlayerId| player.map_or(true, |p| p == id);

    ComplexStats {
        streaks: streaks(snapshot, &matches, thresholds.streak, &wanted),
        positions: positions(snapshot, &matches, thresholds.position, &wanted),
        pairs: pairs(snapshot, &matches, thresholds.pair, &wanted),
    }
}

#[derive(Clone, Copy)]
struct Run {
    length: u32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Default)]
struct RunTracker {
    current: Option<(bool, Run)>,
    best_win: Option<Run>,
    best_loss: Option<Run>,
}

impl RunTracker {
    fn push(&mut self, won: bool, at: DateTime<Utc>) {
        let run = match self.current {
            Some((w, mut run)) if w == won => {
                run.length += 1;
                run.end = at;
                run
            }
            _ => Run {
                length: 1,
                start: at,
                end: at,
            },
        };
        self.current = Some((won, run));
        let best = if won {
            &mut self.best_win
        } else {
            &mut self.best_loss
        };
        // >= so that an equal run ending later replaces the older one
        if best.map_or(true, |b| run.length >= b.length) {
            *best = Some(run);
        }
    }
}

fn streaks(
    snapshot: &LedgerSnapshot,
    matches: &[&Match],
    min_length: u32,
    wanted: &dyn Fn(PlayerId) -> bool,
) -> Streaks {
    let mut trackers: HashMap<PlayerId, RunTracker> = HashMap::new();
    for m in matches {
        let winner = m.winner();
        for (seat, snap) in m.seats() {
            if wanted(snap.player_id) {
                trackers
                    .entry(snap.player_id)
                    .or_default()
                    .push(seat.team == winner, m.date);
            }
        }
    }

    let collect = |pick: fn(&RunTracker) -> Option<Run>| {
        let mut runs: Vec<Streak> = trackers
            .iter()
            .filter_map(|(id, t)| pick(t).map(|run| (*id, run)))
            .filter(|(_, run)| run.length >= min_length)
            .map(|(id, run)| Streak {
                player_id: id,
                pseudo: snapshot.pseudo(id),
                streak_length: run.length,
                start_date: run.start,
                end_date: run.end,
            })
            .collect();
        runs.sort_by(|a, b| {
            b.end_date
                .cmp(&a.end_date)
                .then_with(|| a.pseudo.cmp(&b.pseudo))
        });
        leaders(runs, |s| s.streak_length)
    };

    Streaks {
        longest_win_streak: collect(|t| t.best_win),
        longest_lose_streak: collect(|t| t.best_loss),
    }
}

fn positions(
    snapshot: &LedgerSnapshot,
    matches: &[&Match],
    min_matches: u32,
    wanted: &dyn Fn(PlayerId) -> bool,
) -> Positions {
    let mut attackers: HashMap<PlayerId, Tally> = HashMap::new();
    let mut defenders: HashMap<PlayerId, Tally> = HashMap::new();
    for m in matches {
        let winner = m.winner();
        for (seat, snap) in m.seats() {
            if !wanted(snap.player_id) {
                continue;
            }
            let tallies = match seat.role {
                Role::Attacker => &mut attackers,
                Role::Defender => &mut defenders,
            };
            tallies.entry(snap.player_id).or_default().record(
                seat.team == winner,
                m.score(seat.team),
                m.score(seat.team.opponent()),
            );
        }
    }

    Positions {
        attacker: rank_players(snapshot, &attackers, min_matches),
        defender: rank_players(snapshot, &defenders, min_matches),
    }
}

fn rank_players(
    snapshot: &LedgerSnapshot,
    tallies: &HashMap<PlayerId, Tally>,
    min_matches: u32,
) -> Ranking<RateRecord> {
    let mut eligible: Vec<(PlayerId, Tally, String)> = tallies
        .iter()
        .filter(|(_, t)| t.matches >= min_matches)
        .map(|(id, t)| (*id, *t, snapshot.pseudo(*id)))
        .collect();
    eligible.sort_by(|a, b| a.2.cmp(&b.2));

    let record = |(id, t, pseudo): (PlayerId, Tally, String)| RateRecord {
        player_id: id,
        pseudo,
        total_matches: t.matches,
        wins: t.victories,
        defeats: t.defeats,
        win_rate: t.win_rate,
        loss_rate: t.loss_rate(),
    };
    let best = leaders(eligible.clone(), |(_, t, _)| (t.ratio(), t.matches));
    let worst = leaders(eligible, |(_, t, _)| (Reverse(t.ratio()), t.matches));
    Ranking {
        best: best.into_iter().map(record).collect(),
        worst: worst.into_iter().map(record).collect(),
    }
}

fn pairs(
    snapshot: &LedgerSnapshot,
    matches: &[&Match],
    min_matches: u32,
    wanted: &dyn Fn(PlayerId) -> bool,
) -> Ranking<PairRecord> {
    let mut tallies: HashMap<(PlayerId, PlayerId), Tally> = HashMap::new();
    for m in matches {
        let winner = m.winner();
        for team in [winner, winner.opponent()] {
            let [a, b] = m.team_players(team);
            if !wanted(a) && !wanted(b) {
                continue;
            }
            tallies.entry(pair_key(a, b)).or_default().record(
                team == winner,
                m.score(team),
                m.score(team.opponent()),
            );
        }
    }

    let mut eligible: Vec<PairRecord> = tallies
        .into_iter()
        .filter(|(_, t)| t.matches >= min_matches)
        .map(|((a, b), t)| {
            // player1 is the one whose pseudo sorts first
            let (a, b) = if snapshot.pseudo(a) <= snapshot.pseudo(b) {
                (a, b)
            } else {
                (b, a)
            };
            PairRecord {
                player1_id: a,
                player2_id: b,
                player1_pseudo: snapshot.pseudo(a),
                player2_pseudo: snapshot.pseudo(b),
                total_matches: t.matches,
                wins: t.victories,
                defeats: t.defeats,
                win_rate: t.win_rate,
                loss_rate: t.loss_rate(),
            }
        })
        .collect();
    eligible.sort_by(|a, b| {
        (&a.player1_pseudo, &a.player2_pseudo).cmp(&(&b.player1_pseudo, &b.player2_pseudo))
    });

    let ratio = |p: &PairRecord| Ratio::new(p.wins, p.total_matches);
    Ranking {
        best: leaders(eligible.clone(), |p| (ratio(p), p.total_matches)),
        worst: leaders(eligible, |p| (Reverse(ratio(p)), p.total_matches)),
    }
}
