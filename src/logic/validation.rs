//! Structural and business checks on a submitted match.

use crate::models::{
    MatchRequest, MatchSubmission, Player, PlayerId, Seat, Team, ValidationError, WINNING_SCORE,
};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Validate a raw submission and normalize it into a [`MatchRequest`].
///
/// 1. Every seat must name a player, and the ids must parse.
/// 2. The four players must be distinct.
/// 3. Both scores in 0..=10, exactly one of them 10.
pub fn validate_match(submission: &MatchSubmission) -> Result<MatchRequest, ValidationError> {
    for seat in Seat::ALL {
        if submission.raw_player(seat).trim().is_empty() {
            return Err(ValidationError::MissingPlayer(seat));
        }
    }

    let mut players = [PlayerId::nil(); 4];
    for (slot, seat) in players.iter_mut().zip(Seat::ALL) {
        *slot = Uuid::parse_str(submission.raw_player(seat).trim())
            .map_err(|_| ValidationError::MalformedPlayerId { seat })?;
    }

    let distinct: HashSet<PlayerId> = players.iter().copied().collect();
    if distinct.len() != players.len() {
        return Err(ValidationError::DuplicatePlayer);
    }

    let score_white = checked_score(Team::White, submission.score_white)?;
    let score_black = checked_score(Team::Black, submission.score_black)?;
    match (score_white == WINNING_SCORE, score_black == WINNING_SCORE) {
        (true, true) => return Err(ValidationError::Tie),
        (false, false) => return Err(ValidationError::NoWinningScore),
        _ => {}
    }

    Ok(MatchRequest {
        players,
        score_white,
        score_black,
        added_by: submission.added_by,
    })
}

fn checked_score(team: Team, score: i32) -> Result<u8, ValidationError> {
    u8::try_from(score)
        .ok()
        .filter(|s| *s <= WINNING_SCORE)
        .ok_or(ValidationError::ScoreOutOfRange { team, score })
}

/// Informational flags shown to the submitter; they never block a match.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    NoMana,
    NoHp,
    Disabled,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PlayerWarning {
    pub player_id: PlayerId,
    pub pseudo: String,
    pub warnings: Vec<Warning>,
}

/// Soft warnings for the selected players (only players with at least one).
pub fn match_warnings(players: &[Player]) -> Vec<PlayerWarning> {
    players
        .iter()
        .filter_map(|p| {
            let mut warnings = Vec::new();
            if p.mana == 0 {
                warnings.push(Warning::NoMana);
            }
            if p.hp == 0 {
                warnings.push(Warning::NoHp);
            }
            if p.disable {
                warnings.push(Warning::Disabled);
            }
            (!warnings.is_empty()).then(|| PlayerWarning {
                player_id: p.id,
                pseudo: p.pseudo.clone(),
                warnings,
            })
        })
        .collect()
}
