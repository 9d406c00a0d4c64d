use crate::models::{PlayerId, Role, Seat, Team};
use crate::stats::{in_period, Period, Ratio, StatsThresholds};
use crate::store::LedgerSnapshot;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Win/loss and goal counts over some set of matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Tally {
    pub matches: u32,
    pub victories: u32,
    pub defeats: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub win_rate: f64,
}

impl Tally {
    pub fn record(&mut self, won: bool, goals_for: u8, goals_against: u8) {
        self.matches += 1;
        if won {
            self.victories += 1;
        } else {
            self.defeats += 1;
        }
        self.goals_for += u32::from(goals_for);
        self.goals_against += u32::from(goals_against);
        self.win_rate = self.ratio().percent();
    }

    pub(crate) fn ratio(&self) -> Ratio {
        Ratio::new(self.victories, self.matches)
    }

    pub fn loss_rate(&self) -> f64 {
        Ratio::new(self.defeats, self.matches).percent()
    }
}

/// How a player fared with (or against) one other player.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Relation {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub matches: u32,
    pub victories: u32,
    pub defeats: u32,
    pub win_rate: f64,
}

/// Serialized flat: totals at the top level, then `<seat>_victories`,
/// `<role>_victories`, ... and `best_partner_id`, `best_partner_pseudo`, ...
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerStats {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub exp: u32,
    pub level: u32,
    pub title: Option<String>,
    /// Net exp change from matches in the period.
    pub exp_gained: i64,
    pub total: Tally,
    pub attacker: Tally,
    pub defender: Tally,
    pub white: Tally,
    pub black: Tally,
    pub white_attacker: Tally,
    pub white_defender: Tally,
    pub black_attacker: Tally,
    pub black_defender: Tally,
    pub best_partner: Option<Relation>,
    pub worst_partner: Option<Relation>,
    pub best_opponent: Option<Relation>,
    pub worst_opponent: Option<Relation>,
}

impl PlayerStats {
    pub fn seat(&self, seat: Seat) -> &Tally {
        match (seat.team, seat.role) {
            (Team::White, Role::Attacker) => &self.white_attacker,
            (Team::White, Role::Defender) => &self.white_defender,
            (Team::Black, Role::Attacker) => &self.black_attacker,
            (Team::Black, Role::Defender) => &self.black_defender,
        }
    }
}

fn tally_entries<M: SerializeMap>(map: &mut M, prefix: &str, t: &Tally) -> Result<(), M::Error> {
    let key = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", prefix, name)
        }
    };
    map.serialize_entry(&key("total_matches"), &t.matches)?;
    map.serialize_entry(&key("victories"), &t.victories)?;
    map.serialize_entry(&key("defeats"), &t.defeats)?;
    map.serialize_entry(&key("goals_for"), &t.goals_for)?;
    map.serialize_entry(&key("goals_against"), &t.goals_against)?;
    map.serialize_entry(&key("win_rate"), &t.win_rate)
}

fn relation_entries<M: SerializeMap>(
    map: &mut M,
    prefix: &str,
    relation: Option<&Relation>,
) -> Result<(), M::Error> {
    map.serialize_entry(&format!("{}_id", prefix), &relation.map(|r| r.player_id))?;
    map.serialize_entry(&format!("{}_pseudo", prefix), &relation.map(|r| &r.pseudo))?;
    map.serialize_entry(&format!("{}_matches", prefix), &relation.map_or(0, |r| r.matches))?;
    map.serialize_entry(
        &format!("{}_victories", prefix),
        &relation.map_or(0, |r| r.victories),
    )?;
    map.serialize_entry(
        &format!("{}_defeats", prefix),
        &relation.map_or(0, |r| r.defeats),
    )
}

impl Serialize for PlayerStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("player_id", &self.player_id)?;
        map.serialize_entry("pseudo", &self.pseudo)?;
        map.serialize_entry("exp", &self.exp)?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("exp_gained", &self.exp_gained)?;
        tally_entries(&mut map, "", &self.total)?;
        for seat in Seat::ALL {
            tally_entries(&mut map, &seat.to_string(), self.seat(seat))?;
        }
        tally_entries(&mut map, "attacker", &self.attacker)?;
        tally_entries(&mut map, "defender", &self.defender)?;
        tally_entries(&mut map, "white", &self.white)?;
        tally_entries(&mut map, "black", &self.black)?;
        relation_entries(&mut map, "best_partner", self.best_partner.as_ref())?;
        relation_entries(&mut map, "worst_partner", self.worst_partner.as_ref())?;
        relation_entries(&mut map, "best_opponent", self.best_opponent.as_ref())?;
        relation_entries(&mut map, "worst_opponent", self.worst_opponent.as_ref())?;
        map.end()
    }
}

#[derive(Default)]
struct Acc {
    exp_gained: i64,
    total: Tally,
    attacker: Tally,
    defender: Tally,
    white: Tally,
    black: Tally,
    seats: HashMap<Seat, Tally>,
    partners: HashMap<PlayerId, Tally>,
    opponents: HashMap<PlayerId, Tally>,
}

/// Per-player totals for the period, sorted by exp (highest first) then pseudo.
///
/// Without a filter the list holds every enabled player plus any disabled one
/// who played in the period. An unknown `player` yields an empty list.
pub fn player_stats(
    snapshot: &LedgerSnapshot,
    period: &Period,
    player: Option<PlayerId>,
) -> Vec<PlayerStats> {
    let thresholds = StatsThresholds::from_config(&snapshot.config);
    let mut acc: HashMap<PlayerId, Acc> = HashMap::new();

    for m in in_period(snapshot, period) {
        let winner = m.winner();
        for (seat, snap) in m.seats() {
            if player.is_some_and(|id| id != snap.player_id) {
                continue;
            }
            let won = seat.team == winner;
            let goals_for = m.score(seat.team);
            let goals_against = m.score(seat.team.opponent());
            let a = acc.entry(snap.player_id).or_default();
            a.exp_gained += snap.exp_gained();
            a.total.record(won, goals_for, goals_against);
            match seat.role {
                Role::Attacker => a.attacker.record(won, goals_for, goals_against),
                Role::Defender => a.defender.record(won, goals_for, goals_against),
            }
            match seat.team {
                Team::White => a.white.record(won, goals_for, goals_against),
                Team::Black => a.black.record(won, goals_for, goals_against),
            }
            a.seats
                .entry(seat)
                .or_default()
                .record(won, goals_for, goals_against);
            a.partners
                .entry(m.seat(seat.partner()).player_id)
                .or_default()
                .record(won, goals_for, goals_against);
            for opponent in m.team_players(seat.team.opponent()) {
                a.opponents
                    .entry(opponent)
                    .or_default()
                    .record(won, goals_for, goals_against);
            }
        }
    }

    let played: HashSet<PlayerId> = acc.keys().copied().collect();
    let mut stats: Vec<PlayerStats> = snapshot
        .players
        .iter()
        .filter(|p| match player {
            Some(id) => p.id == id,
            None => !p.disable || played.contains(&p.id),
        })
        .map(|p| {
            let a = acc.remove(&p.id).unwrap_or_default();
            let level = snapshot.levels.level_for(p.exp).level;
            let partners = relations(snapshot, &a.partners, thresholds.partner);
            let opponents = relations(snapshot, &a.opponents, thresholds.partner);
            let seat = |s: Seat| a.seats.get(&s).copied().unwrap_or_default();
            PlayerStats {
                player_id: p.id,
                pseudo: p.pseudo.clone(),
                exp: p.exp,
                level,
                title: snapshot
                    .levels
                    .display_source(level)
                    .and_then(|l| l.title.clone()),
                exp_gained: a.exp_gained,
                total: a.total,
                attacker: a.attacker,
                defender: a.defender,
                white: a.white,
                black: a.black,
                white_attacker: seat(Seat::WHITE_ATTACKER),
                white_defender: seat(Seat::WHITE_DEFENDER),
                black_attacker: seat(Seat::BLACK_ATTACKER),
                black_defender: seat(Seat::BLACK_DEFENDER),
                best_partner: best(&partners),
                worst_partner: worst(&partners),
                best_opponent: best(&opponents),
                worst_opponent: worst(&opponents),
            }
        })
        .collect();
    stats.sort_by(|a, b| b.exp.cmp(&a.exp).then_with(|| a.pseudo.cmp(&b.pseudo)));
    stats
}

fn relations(
    snapshot: &LedgerSnapshot,
    tallies: &HashMap<PlayerId, Tally>,
    min_matches: u32,
) -> Vec<(Ratio, Relation)> {
    tallies
        .iter()
        .filter(|(_, t)| t.matches >= min_matches)
        .map(|(id, t)| {
            let relation = Relation {
                player_id: *id,
                pseudo: snapshot.pseudo(*id),
                matches: t.matches,
                victories: t.victories,
                defeats: t.defeats,
                win_rate: t.win_rate,
            };
            (t.ratio(), relation)
        })
        .collect()
}

fn best(candidates: &[(Ratio, Relation)]) -> Option<Relation> {
    candidates
        .iter()
        .max_by_key(|(ratio, r)| (*ratio, r.matches, Reverse(r.pseudo.as_str())))
        .map(|(_, r)| r.clone())
}

fn worst(candidates: &[(Ratio, Relation)]) -> Option<Relation> {
    candidates
        .iter()
        .max_by_key(|(ratio, r)| (Reverse(*ratio), r.matches, Reverse(r.pseudo.as_str())))
        .map(|(_, r)| r.clone())
}
