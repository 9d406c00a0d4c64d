//! Period-scoped award categories.

use crate::models::{Match, PlayerId, Team};
use crate::stats::player_stats::Tally;
use crate::stats::{in_period, leaders, pair_key, Period, Ratio, StatsThresholds};
use crate::store::LedgerSnapshot;
use chrono::{Datelike, FixedOffset, NaiveDate, Timelike, Weekday};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CountRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub match_count: u32,
    pub victories: u32,
    pub win_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Activity {
    pub most_active: Vec<ActivityRecord>,
    pub least_active: Vec<ActivityRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BaseMatchStats {
    /// Most 10-0 wins.
    pub perfect_wins: Vec<CountRecord>,
    /// Most 10-0 defeats.
    pub perfect_losses: Vec<CountRecord>,
    /// Most 10-9 wins.
    pub close_wins: Vec<CountRecord>,
    /// Most 10-9 defeats.
    pub close_losses: Vec<CountRecord>,
    pub activity: Activity,
}

/// Record over the matches played in the lunch window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LunchRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub total_matches: u32,
    pub victories: u32,
    pub defeats: u32,
    pub win_rate: f64,
    pub loss_rate: f64,
}

/// Record over the first match of each Monday.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FirstBloodRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub total_first_matches: u32,
    pub victories: u32,
    pub win_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RevengeRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    /// Rematches against someone who beat this player last time they met.
    pub revenge_opportunities: u32,
    pub revenge_wins: u32,
    pub revenge_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FidelityRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub favorite_partner_id: PlayerId,
    pub favorite_partner_pseudo: String,
    pub matches_together: u32,
    pub victories_together: u32,
    pub total_matches: u32,
    pub fidelity_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CasanovaRecord {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub distinct_partners: u32,
    pub total_matches: u32,
    pub partner_change_rate: f64,
}

/// One side of a classico; `player1` is the one whose pseudo sorts first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassicoSide {
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub player1_pseudo: String,
    pub player2_pseudo: String,
    pub victories: u32,
}

/// A recurring two-against-two matchup.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classico {
    pub team1: ClassicoSide,
    pub team2: ClassicoSide,
    pub total_matches: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HistoricalStats {
    /// Best win rate during the lunch window.
    pub dessert: Vec<LunchRecord>,
    /// Worst loss rate during the lunch window.
    pub dessert_looser: Vec<LunchRecord>,
    /// Best win rate in the first match of a Monday.
    pub first_blood: Vec<FirstBloodRecord>,
    pub monte_cristo: Vec<RevengeRecord>,
    pub fidele: Vec<FidelityRecord>,
    pub casanova: Vec<CasanovaRecord>,
    pub classicos: Vec<Classico>,
}

fn count_leaders(
    snapshot: &LedgerSnapshot,
    counts: HashMap<PlayerId, u32>,
    min: u32,
) -> Vec<CountRecord> {
    let mut records: Vec<CountRecord> = counts
        .into_iter()
        .filter(|(_, n)| *n >= min)
        .map(|(id, count)| CountRecord {
            player_id: id,
            pseudo: snapshot.pseudo(id),
            count,
        })
        .collect();
    records.sort_by(|a, b| a.pseudo.cmp(&b.pseudo));
    leaders(records, |r| r.count)
}

fn bump(counts: &mut HashMap<PlayerId, u32>, ids: impl IntoIterator<Item = PlayerId>) {
    for id in ids {
        *counts.entry(id).or_default() += 1;
    }
}

fn record_seats(
    tallies: &mut HashMap<PlayerId, Tally>,
    m: &Match,
    wanted: &dyn Fn(&PlayerId) -> bool,
) {
    let winner = m.winner();
    for (seat, snap) in m.seats().filter(|(_, snap)| wanted(&snap.player_id)) {
        tallies.entry(snap.player_id).or_default().record(
            seat.team == winner,
            m.score(seat.team),
            m.score(seat.team.opponent()),
        );
    }
}

/// Tallies sorted by pseudo, keeping only samples of at least `min` matches.
fn eligible(
    snapshot: &LedgerSnapshot,
    tallies: HashMap<PlayerId, Tally>,
    min: u32,
) -> Vec<(PlayerId, String, Tally)> {
    let mut rows: Vec<(PlayerId, String, Tally)> = tallies
        .into_iter()
        .filter(|(_, t)| t.matches >= min)
        .map(|(id, t)| (id, snapshot.pseudo(id), t))
        .collect();
    rows.sort_by(|a, b| a.1.cmp(&b.1));
    rows
}

pub fn base_match_stats(snapshot: &LedgerSnapshot, period: &Period) -> BaseMatchStats {
    let matches = in_period(snapshot, period);

    let mut perfect_wins = HashMap::new();
    let mut perfect_losses = HashMap::new();
    let mut close_wins = HashMap::new();
    let mut close_losses = HashMap::new();
    let mut activity: HashMap<PlayerId, Tally> = HashMap::new();
    for m in &matches {
        let winner = m.winner();
        let (won, lost) = (m.team_players(winner), m.team_players(winner.opponent()));
        if m.is_perfect() {
            bump(&mut perfect_wins, won);
            bump(&mut perfect_losses, lost);
        }
        if m.is_close() {
            bump(&mut close_wins, won);
            bump(&mut close_losses, lost);
        }
        record_seats(&mut activity, m, &|_: &PlayerId| true);
    }

    let active: Vec<ActivityRecord> = eligible(snapshot, activity, 1)
        .into_iter()
        .map(|(id, pseudo, t)| ActivityRecord {
            player_id: id,
            pseudo,
            match_count: t.matches,
            victories: t.victories,
            win_rate: t.win_rate,
        })
        .collect();

    BaseMatchStats {
        perfect_wins: count_leaders(snapshot, perfect_wins, 1),
        perfect_losses: count_leaders(snapshot, perfect_losses, 1),
        close_wins: count_leaders(snapshot, close_wins, 1),
        close_losses: count_leaders(snapshot, close_losses, 1),
        activity: Activity {
            most_active: leaders(active.clone(), |r| r.match_count),
            least_active: leaders(active, |r| Reverse(r.match_count)),
        },
    }
}

fn local_minute(m: &Match, offset: FixedOffset) -> u32 {
    let local = m.date.with_timezone(&offset);
    local.hour() * 60 + local.minute()
}

/// With `player` set, only that player's records (and the classicos they
/// took part in) are returned.
pub fn historical_stats(
    snapshot: &LedgerSnapshot,
    period: &Period,
    player: Option<PlayerId>,
) -> HistoricalStats {
    let config = &snapshot.config;
    let thresholds = StatsThresholds::from_config(config);
    let offset = config.utc_offset();
    let lunch = config.count("lunch_start_minute")..config.count("lunch_end_minute");
    let matches = in_period(snapshot, period);
    let wanted = |id: &PlayerId| player.map_or(true, |p| p == *id);

    let mut lunch_tallies = HashMap::new();
    let mut monday_tallies = HashMap::new();
    let mut mondays_seen: HashSet<NaiveDate> = HashSet::new();
    let mut revenge = RevengeTracker::default();
    let mut partners: HashMap<PlayerId, HashMap<PlayerId, Tally>> = HashMap::new();
    let mut meetings: HashMap<[(PlayerId, PlayerId); 2], Meeting> = HashMap::new();

    for m in &matches {
        let winner = m.winner();

        if lunch.contains(&local_minute(m, offset)) {
            record_seats(&mut lunch_tallies, m, &wanted);
        }
        let day = m.date.with_timezone(&offset).date_naive();
        if day.weekday() == Weekday::Mon && mondays_seen.insert(day) {
            record_seats(&mut monday_tallies, m, &wanted);
        }

        revenge.push(m);

        for (seat, snap) in m.seats() {
            partners
                .entry(snap.player_id)
                .or_default()
                .entry(m.seat(seat.partner()).player_id)
                .or_default()
                .record(
                    seat.team == winner,
                    m.score(seat.team),
                    m.score(seat.team.opponent()),
                );
        }

        let white = m.team_players(Team::White);
        let black = m.team_players(Team::Black);
        let (a, b) = (pair_key(white[0], white[1]), pair_key(black[0], black[1]));
        let key = if a <= b { [a, b] } else { [b, a] };
        let meeting = meetings.entry(key).or_default();
        meeting.count += 1;
        let winning_pair = if winner == Team::White { a } else { b };
        if winning_pair == key[0] {
            meeting.first_wins += 1;
        } else {
            meeting.second_wins += 1;
        }
    }

    let (dessert, dessert_looser) = lunch_titles(snapshot, lunch_tallies, thresholds.title);
    let mut stats = HistoricalStats {
        dessert,
        dessert_looser,
        first_blood: first_blood(snapshot, monday_tallies, thresholds.first_blood),
        monte_cristo: revenge.leaders(snapshot, thresholds.revenge, &wanted),
        ..Default::default()
    };
    partner_titles(snapshot, &partners, thresholds.title, &wanted, &mut stats);
    stats.classicos = classicos(snapshot, meetings, thresholds.classico, &wanted);
    stats
}

/// Best win rate and worst loss rate at lunch. A holder needs at least one
/// win (or one defeat) to qualify.
fn lunch_titles(
    snapshot: &LedgerSnapshot,
    tallies: HashMap<PlayerId, Tally>,
    min_matches: u32,
) -> (Vec<LunchRecord>, Vec<LunchRecord>) {
    let records: Vec<LunchRecord> = eligible(snapshot, tallies, min_matches)
        .into_iter()
        .map(|(id, pseudo, t)| LunchRecord {
            player_id: id,
            pseudo,
            total_matches: t.matches,
            victories: t.victories,
            defeats: t.defeats,
            win_rate: t.win_rate,
            loss_rate: t.loss_rate(),
        })
        .collect();
    let winners = records.iter().filter(|r| r.victories > 0).cloned().collect();
    let losers = records.into_iter().filter(|r| r.defeats > 0).collect();
    (
        leaders(winners, |r| {
            (Ratio::new(r.victories, r.total_matches), r.total_matches)
        }),
        leaders(losers, |r| {
            (Ratio::new(r.defeats, r.total_matches), r.total_matches)
        }),
    )
}

fn first_blood(
    snapshot: &LedgerSnapshot,
    tallies: HashMap<PlayerId, Tally>,
    min_matches: u32,
) -> Vec<FirstBloodRecord> {
    let records: Vec<FirstBloodRecord> = eligible(snapshot, tallies, min_matches)
        .into_iter()
        .filter(|(_, _, t)| t.victories > 0)
        .map(|(id, pseudo, t)| FirstBloodRecord {
            player_id: id,
            pseudo,
            total_first_matches: t.matches,
            victories: t.victories,
            win_rate: t.win_rate,
        })
        .collect();
    leaders(records, |r| {
        (Ratio::new(r.victories, r.total_first_matches), r.total_first_matches)
    })
}

/// Per player and opponent, whether the opponent won their last meeting.
#[derive(Default)]
struct RevengeTracker {
    pending: HashSet<(PlayerId, PlayerId)>,
    counts: HashMap<PlayerId, (u32, u32)>,
}

impl RevengeTracker {
    fn push(&mut self, m: &Match) {
        let winner = m.winner();
        for (seat, snap) in m.seats() {
            let me = snap.player_id;
            let won = seat.team == winner;
            let opponents = m.team_players(seat.team.opponent());
            if opponents.iter().any(|o| self.pending.contains(&(me, *o))) {
                let entry = self.counts.entry(me).or_default();
                entry.0 += 1;
                if won {
                    entry.1 += 1;
                }
            }
            for o in opponents {
                if won {
                    self.pending.remove(&(me, o));
                } else {
                    self.pending.insert((me, o));
                }
            }
        }
    }

    fn leaders(
        &self,
        snapshot: &LedgerSnapshot,
        min_opportunities: u32,
        wanted: &dyn Fn(&PlayerId) -> bool,
    ) -> Vec<RevengeRecord> {
        let mut records: Vec<RevengeRecord> = self
            .counts
            .iter()
            .filter(|(id, (chances, _))| wanted(id) && *chances >= min_opportunities)
            .map(|(id, (chances, revenges))| RevengeRecord {
                player_id: *id,
                pseudo: snapshot.pseudo(*id),
                revenge_opportunities: *chances,
                revenge_wins: *revenges,
                revenge_rate: Ratio::new(*revenges, *chances).percent(),
            })
            .collect();
        records.sort_by(|a, b| a.pseudo.cmp(&b.pseudo));
        leaders(records, |r| {
            (
                Ratio::new(r.revenge_wins, r.revenge_opportunities),
                r.revenge_opportunities,
            )
        })
    }
}

fn partner_titles(
    snapshot: &LedgerSnapshot,
    partners: &HashMap<PlayerId, HashMap<PlayerId, Tally>>,
    min_matches: u32,
    wanted: &dyn Fn(&PlayerId) -> bool,
    stats: &mut HistoricalStats,
) {
    let mut fidelity = Vec::new();
    let mut variety = Vec::new();
    for (id, with) in partners.iter().filter(|(id, _)| wanted(id)) {
        let total: u32 = with.values().map(|t| t.matches).sum();
        if total < min_matches {
            continue;
        }
        let pseudo = snapshot.pseudo(*id);
        let favourite = with
            .iter()
            .map(|(p, t)| (t.matches, Reverse(snapshot.pseudo(*p)), *p, t.victories))
            .max();
        if let Some((together, Reverse(partner_pseudo), partner_id, won)) = favourite {
            fidelity.push(FidelityRecord {
                player_id: *id,
                pseudo: pseudo.clone(),
                favorite_partner_id: partner_id,
                favorite_partner_pseudo: partner_pseudo,
                matches_together: together,
                victories_together: won,
                total_matches: total,
                fidelity_rate: Ratio::new(together, total).percent(),
            });
        }
        let distinct = u32::try_from(with.len()).unwrap_or(u32::MAX);
        variety.push(CasanovaRecord {
            player_id: *id,
            pseudo,
            distinct_partners: distinct,
            total_matches: total,
            partner_change_rate: Ratio::new(distinct, total).percent(),
        });
    }
    fidelity.sort_by(|a, b| a.pseudo.cmp(&b.pseudo));
    variety.sort_by(|a, b| a.pseudo.cmp(&b.pseudo));
    stats.fidele = leaders(fidelity, |r| {
        (Ratio::new(r.matches_together, r.total_matches), r.total_matches)
    });
    stats.casanova = leaders(variety, |r| {
        (r.distinct_partners, Ratio::new(r.distinct_partners, r.total_matches))
    });
}

#[derive(Default)]
struct Meeting {
    count: u32,
    first_wins: u32,
    second_wins: u32,
}

fn classicos(
    snapshot: &LedgerSnapshot,
    meetings: HashMap<[(PlayerId, PlayerId); 2], Meeting>,
    min_meetings: u32,
    wanted: &dyn Fn(&PlayerId) -> bool,
) -> Vec<Classico> {
    let side = |(a, b): (PlayerId, PlayerId), victories| {
        let (a, b) = if snapshot.pseudo(a) <= snapshot.pseudo(b) {
            (a, b)
        } else {
            (b, a)
        };
        ClassicoSide {
            player1_id: a,
            player2_id: b,
            player1_pseudo: snapshot.pseudo(a),
            player2_pseudo: snapshot.pseudo(b),
            victories,
        }
    };
    let side_key = |s: &ClassicoSide| (s.player1_pseudo.clone(), s.player2_pseudo.clone());
    let mut found: Vec<Classico> = meetings
        .into_iter()
        .filter(|(key, meeting)| {
            meeting.count >= min_meetings && key.iter().any(|(a, b)| wanted(a) || wanted(b))
        })
        .map(|([first, second], meeting)| {
            let first = side(first, meeting.first_wins);
            let second = side(second, meeting.second_wins);
            let (team1, team2) = if side_key(&first) <= side_key(&second) {
                (first, second)
            } else {
                (second, first)
            };
            Classico {
                team1,
                team2,
                total_matches: meeting.count,
            }
        })
        .collect();
    found.sort_by(|a, b| {
        side_key(&a.team1)
            .cmp(&side_key(&b.team1))
            .then_with(|| side_key(&a.team2).cmp(&side_key(&b.team2)))
    });
    leaders(found, |c| c.total_matches)
}
