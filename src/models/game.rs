//! Matches: seats, submissions, validated requests and settled records.

use crate::models::player::{PlayerId, Resources};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a match.
pub type MatchId = Uuid;

/// Score a team must reach to win.
pub const WINNING_SCORE: u8 = 10;

/// Table side.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    White,
    Black,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::White => Team::Black,
            Team::Black => Team::White,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::White => write!(f, "white"),
            Team::Black => write!(f, "black"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Attacker,
    Defender,
}

/// One of the four positions at the table.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Seat {
    pub team: Team,
    pub role: Role,
}

impl Seat {
    pub const WHITE_ATTACKER: Seat = Seat {
        team: Team::White,
        role: Role::Attacker,
    };
    pub const WHITE_DEFENDER: Seat = Seat {
        team: Team::White,
        role: Role::Defender,
    };
    pub const BLACK_ATTACKER: Seat = Seat {
        team: Team::Black,
        role: Role::Attacker,
    };
    pub const BLACK_DEFENDER: Seat = Seat {
        team: Team::Black,
        role: Role::Defender,
    };

    /// Canonical seat order, used for every per-seat array in this crate.
    pub const ALL: [Seat; 4] = [
        Seat::WHITE_ATTACKER,
        Seat::WHITE_DEFENDER,
        Seat::BLACK_ATTACKER,
        Seat::BLACK_DEFENDER,
    ];

    fn index(self) -> usize {
        match (self.team, self.role) {
            (Team::White, Role::Attacker) => 0,
            (Team::White, Role::Defender) => 1,
            (Team::Black, Role::Attacker) => 2,
            (Team::Black, Role::Defender) => 3,
        }
    }

    /// The other seat on the same team.
    pub fn partner(self) -> Seat {
        let role = match self.role {
            Role::Attacker => Role::Defender,
            Role::Defender => Role::Attacker,
        };
        Seat {
            team: self.team,
            role,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Attacker => "attacker",
            Role::Defender => "defender",
        };
        write!(f, "{}_{}", self.team, role)
    }
}

/// A match as submitted by a client, before validation.
///
/// Player fields are raw strings so that an empty selection can be reported
/// as such. The `p_`-prefixed names of the RPC arguments are accepted too.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchSubmission {
    #[serde(default, alias = "p_white_attacker")]
    pub white_attacker: String,
    #[serde(default, alias = "p_white_defender")]
    pub white_defender: String,
    #[serde(default, alias = "p_black_attacker")]
    pub black_attacker: String,
    #[serde(default, alias = "p_black_defender")]
    pub black_defender: String,
    #[serde(alias = "p_score_white")]
    pub score_white: i32,
    #[serde(alias = "p_score_black")]
    pub score_black: i32,
    #[serde(default, alias = "p_added_by")]
    pub added_by: Option<PlayerId>,
}

impl MatchSubmission {
    /// Convenience constructor from typed ids.
    pub fn new(players: [PlayerId; 4], score_white: i32, score_black: i32) -> Self {
        Self {
            white_attacker: players[0].to_string(),
            white_defender: players[1].to_string(),
            black_attacker: players[2].to_string(),
            black_defender: players[3].to_string(),
            score_white,
            score_black,
            added_by: None,
        }
    }

    pub fn raw_player(&self, seat: Seat) -> &str {
        match seat.index() {
            0 => &self.white_attacker,
            1 => &self.white_defender,
            2 => &self.black_attacker,
            _ => &self.black_defender,
        }
    }
}

/// A validated match: four distinct players, exactly one team on 10.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    /// Player ids in [`Seat::ALL`] order.
    pub players: [PlayerId; 4],
    pub score_white: u8,
    pub score_black: u8,
    pub added_by: Option<PlayerId>,
}

impl MatchRequest {
    pub fn player(&self, seat: Seat) -> PlayerId {
        self.players[seat.index()]
    }

    pub fn score(&self, team: Team) -> u8 {
        match team {
            Team::White => self.score_white,
            Team::Black => self.score_black,
        }
    }

    pub fn winner(&self) -> Team {
        if self.score_white == WINNING_SCORE {
            Team::White
        } else {
            Team::Black
        }
    }

    /// Goal difference, 1 (10-9) to 10 (10-0).
    pub fn margin(&self) -> u8 {
        self.score_white.abs_diff(self.score_black)
    }
}

/// Per-seat before/after capture stored in the ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub player_id: PlayerId,
    pub before: Resources,
    pub after: Resources,
}

impl SeatSnapshot {
    pub fn exp_gained(&self) -> i64 {
        i64::from(self.after.exp) - i64::from(self.before.exp)
    }
}

/// A settled match. Immutable once written; only a reversal removes it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub date: DateTime<Utc>,
    pub white_attacker: SeatSnapshot,
    pub white_defender: SeatSnapshot,
    pub black_attacker: SeatSnapshot,
    pub black_defender: SeatSnapshot,
    pub score_white: u8,
    pub score_black: u8,
    pub added_by: Option<PlayerId>,
}

impl Match {
    /// Build the record from snapshots given in [`Seat::ALL`] order.
    pub fn new(
        date: DateTime<Utc>,
        seats: [SeatSnapshot; 4],
        request: &MatchRequest,
    ) -> Self {
        let [white_attacker, white_defender, black_attacker, black_defender] = seats;
        Self {
            id: Uuid::new_v4(),
            date,
            white_attacker,
            white_defender,
            black_attacker,
            black_defender,
            score_white: request.score_white,
            score_black: request.score_black,
            added_by: request.added_by,
        }
    }

    pub fn seat(&self, seat: Seat) -> &SeatSnapshot {
        match seat.index() {
            0 => &self.white_attacker,
            1 => &self.white_defender,
            2 => &self.black_attacker,
            _ => &self.black_defender,
        }
    }

    pub fn seats(&self) -> impl Iterator<Item = (Seat, &SeatSnapshot)> + '_ {
        Seat::ALL.into_iter().map(move |s| (s, self.seat(s)))
    }

    pub fn players(&self) -> [PlayerId; 4] {
        Seat::ALL.map(|s| self.seat(s).player_id)
    }

    pub fn seat_of(&self, player: PlayerId) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|s| self.seat(*s).player_id == player)
    }

    pub fn team_players(&self, team: Team) -> [PlayerId; 2] {
        let attacker = Seat {
            team,
            role: Role::Attacker,
        };
        [
            self.seat(attacker).player_id,
            self.seat(attacker.partner()).player_id,
        ]
    }

    pub fn score(&self, team: Team) -> u8 {
        match team {
            Team::White => self.score_white,
            Team::Black => self.score_black,
        }
    }

    pub fn winner(&self) -> Team {
        if self.score_white == WINNING_SCORE {
            Team::White
        } else {
            Team::Black
        }
    }

    pub fn loser_score(&self) -> u8 {
        self.score(self.winner().opponent())
    }

    /// 10-0.
    pub fn is_perfect(&self) -> bool {
        self.loser_score() == 0
    }

    /// 10-9.
    pub fn is_close(&self) -> bool {
        self.loser_score() == WINNING_SCORE - 1
    }

    /// Same players in the same seats with the same score.
    pub fn same_lineup(&self, request: &MatchRequest) -> bool {
        self.players() == request.players
            && self.score_white == request.score_white
            && self.score_black == request.score_black
    }
}

/// One row per affected player, returned by settlement and reversal.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdateResult {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub old_exp: u32,
    pub new_exp: u32,
    pub old_mana: u32,
    pub new_mana: u32,
    pub old_hp: u32,
    pub new_hp: u32,
    pub old_level: u32,
    pub new_level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partners_share_a_team() {
        for (i, seat) in Seat::ALL.into_iter().enumerate() {
            assert_eq!(seat.index(), i);
            let partner = seat.partner();
            assert_eq!(partner.team, seat.team);
            assert_ne!(partner.role, seat.role);
            assert_eq!(partner.partner(), seat);
        }
        assert_eq!(Seat::BLACK_DEFENDER.partner(), Seat::BLACK_ATTACKER);
        assert_eq!(Seat::WHITE_DEFENDER.to_string(), "white_defender");
    }
}
