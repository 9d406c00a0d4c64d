//! Integration tests for match validation.

use babyfoot_league::{validate_match, MatchSubmission, Seat, Team, ValidationError};
use uuid::Uuid;

fn four_ids() -> [Uuid; 4] {
    [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()]
}

#[test]
fn accepts_both_winning_sides() {
    let ids = four_ids();
    let white = validate_match(&MatchSubmission::new(ids, 10, 9)).unwrap();
    assert_eq!(white.winner(), Team::White);
    assert_eq!(white.margin(), 1);
    assert_eq!(white.players, ids);

    let black = validate_match(&MatchSubmission::new(ids, 0, 10)).unwrap();
    assert_eq!(black.winner(), Team::Black);
    assert_eq!(black.margin(), 10);
}

#[test]
fn tie_is_rejected() {
    let err = validate_match(&MatchSubmission::new(four_ids(), 10, 10)).unwrap_err();
    assert_eq!(err, ValidationError::Tie);
}

#[test]
fn a_score_of_ten_is_required() {
    let err = validate_match(&MatchSubmission::new(four_ids(), 7, 7)).unwrap_err();
    assert_eq!(err, ValidationError::NoWinningScore);
    let err = validate_match(&MatchSubmission::new(four_ids(), 9, 3)).unwrap_err();
    assert_eq!(err, ValidationError::NoWinningScore);
}

#[test]
fn scores_outside_range_are_rejected() {
    let err = validate_match(&MatchSubmission::new(four_ids(), 11, 3)).unwrap_err();
    assert_eq!(
        err,
        ValidationError::ScoreOutOfRange {
            team: Team::White,
            score: 11
        }
    );
    let err = validate_match(&MatchSubmission::new(four_ids(), 10, -1)).unwrap_err();
    assert_eq!(
        err,
        ValidationError::ScoreOutOfRange {
            team: Team::Black,
            score: -1
        }
    );
}

#[test]
fn same_player_in_two_seats_is_rejected() {
    let [a, b, c, _] = four_ids();
    let err = validate_match(&MatchSubmission::new([a, b, c, a], 10, 2)).unwrap_err();
    assert_eq!(err, ValidationError::DuplicatePlayer);
}

#[test]
fn empty_and_malformed_seats_are_reported_by_seat() {
    let mut sub = MatchSubmission::new(four_ids(), 10, 2);
    sub.black_defender = "  ".into();
    assert_eq!(
        validate_match(&sub).unwrap_err(),
        ValidationError::MissingPlayer(Seat::BLACK_DEFENDER)
    );

    sub.black_defender = "not-a-uuid".into();
    assert_eq!(
        validate_match(&sub).unwrap_err(),
        ValidationError::MalformedPlayerId {
            seat: Seat::BLACK_DEFENDER
        }
    );
}

#[test]
fn missing_players_are_checked_before_scores() {
    let mut sub = MatchSubmission::new(four_ids(), 10, 10);
    sub.white_attacker.clear();
    assert_eq!(
        validate_match(&sub).unwrap_err(),
        ValidationError::MissingPlayer(Seat::WHITE_ATTACKER)
    );
}

#[test]
fn rpc_argument_names_are_accepted() {
    let ids = four_ids();
    let body = serde_json::json!({
        "p_white_attacker": ids[0],
        "p_white_defender": ids[1],
        "p_black_attacker": ids[2],
        "p_black_defender": ids[3],
        "p_score_white": 4,
        "p_score_black": 10,
    });
    let sub: MatchSubmission = serde_json::from_value(body).unwrap();
    let request = validate_match(&sub).unwrap();
    assert_eq!(request.players, ids);
    assert_eq!(request.score_black, 10);
    assert_eq!(request.added_by, None);
}
