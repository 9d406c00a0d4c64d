//! Integration tests for settlement, reversal, concurrency and the weekly jobs.

use babyfoot_league::config::GameConfig;
use babyfoot_league::logic::Warning;
use babyfoot_league::models::{DecayRecord, MatchId};
use babyfoot_league::store::{PlayerWrite, WriteSet};
use babyfoot_league::{
    ConflictError, League, LeagueError, LedgerEvent, LedgerSnapshot, Ledger, LevelTable, Match,
    MatchSubmission, MemoryStore, Player, PlayerId, Store, ValidationError,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn seeded(config: GameConfig, players: Vec<Player>) -> (League<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::seeded(
        LevelTable::default_curve(),
        config,
        players,
    ));
    (League::new(Arc::clone(&store)), store)
}

fn fresh(name: &str) -> Player {
    Player::new(name, 10, 10)
}

fn league_with_four() -> (League<MemoryStore>, Arc<MemoryStore>, [PlayerId; 4]) {
    let players: Vec<Player> = ["Alice", "Bruno", "Chloe", "Dylan"].map(fresh).into();
    let ids = [players[0].id, players[1].id, players[2].id, players[3].id];
    let (league, store) = seeded(GameConfig::new(), players);
    (league, store, ids)
}

fn row(store: &MemoryStore, id: PlayerId) -> Player {
    store.load_players(&[id]).unwrap().remove(0)
}

#[test]
fn ten_four_win_scales_the_reward_and_consoles_losers() {
    let (league, store, ids) = league_with_four();
    let settlement = league
        .process_match_at(&MatchSubmission::new(ids, 10, 4), at(4, 12))
        .unwrap();

    assert_eq!(settlement.results.len(), 4);
    for r in &settlement.results[..2] {
        // level 1 gives 20 exp; a six-goal margin earns 77% of it
        assert_eq!((r.old_exp, r.new_exp), (0, 15));
        assert_eq!((r.old_mana, r.new_mana), (10, 9));
        assert_eq!((r.old_hp, r.new_hp), (10, 10));
    }
    for r in &settlement.results[2..] {
        assert_eq!((r.old_exp, r.new_exp), (0, 2));
        assert_eq!((r.old_mana, r.new_mana), (10, 9));
        assert_eq!((r.old_hp, r.new_hp), (10, 9));
    }
    assert_eq!(row(&store, ids[0]).exp, 15);
    assert_eq!(row(&store, ids[3]).hp, 9);
    assert_eq!(store.match_count().unwrap(), 1);
}

#[test]
fn perfect_wins_pay_in_full_and_hurt_more() {
    let (league, _, ids) = league_with_four();
    let settlement = league
        .process_match_at(&MatchSubmission::new(ids, 0, 10), at(4, 12))
        .unwrap();
    let by_id = |id: PlayerId| settlement.results.iter().find(|r| r.player_id == id).unwrap();
    assert_eq!(by_id(ids[2]).new_exp, 20);
    assert_eq!(by_id(ids[0]).new_exp, 2);
    assert_eq!(by_id(ids[0]).new_hp, 8);
    assert!(settlement.record.is_perfect());
}

#[test]
fn crossing_a_threshold_levels_up() {
    let mut players: Vec<Player> = ["Alice", "Bruno", "Chloe", "Dylan"].map(fresh).into();
    players[0].exp = 45;
    let ids = [players[0].id, players[1].id, players[2].id, players[3].id];
    let (league, _) = seeded(GameConfig::new(), players);

    let settlement = league
        .process_match_at(&MatchSubmission::new(ids, 10, 0), at(4, 12))
        .unwrap();
    let alice = &settlement.results[0];
    assert_eq!((alice.old_exp, alice.new_exp), (45, 65));
    assert_eq!((alice.old_level, alice.new_level), (1, 2));
    for r in &settlement.results {
        assert!(r.new_level >= r.old_level);
    }
}

#[test]
fn the_match_record_keeps_before_and_after_snapshots() {
    let (league, store, ids) = league_with_four();
    let settlement = league
        .process_match_at(&MatchSubmission::new(ids, 10, 7), at(4, 12))
        .unwrap();
    let record = store.load_match(settlement.record.id).unwrap().unwrap();
    assert_eq!(record, settlement.record);
    assert_eq!(record.players(), ids);
    assert_eq!(record.white_attacker.before.exp, 0);
    assert_eq!(record.white_attacker.after.exp, settlement.results[0].new_exp);
    assert_eq!(record.black_defender.after.hp, 9);
}

#[test]
fn reversal_restores_every_player_and_drops_the_record() {
    let (league, store, ids) = league_with_four();
    league
        .process_match_at(&MatchSubmission::new(ids, 10, 3), at(4, 10))
        .unwrap();
    let before: Vec<_> = ids.iter().map(|id| row(&store, *id).resources()).collect();

    let last = league
        .process_match_at(&MatchSubmission::new(ids, 6, 10), at(4, 11))
        .unwrap();
    let reversal = league.delete_game(last.record.id, Some(ids[0])).unwrap();

    assert_eq!(reversal.match_id, last.record.id);
    assert_eq!(reversal.restored.len(), 4);
    let after: Vec<_> = ids.iter().map(|id| row(&store, *id).resources()).collect();
    assert_eq!(before, after);
    assert_eq!(store.match_count().unwrap(), 1);
    assert!(store.load_match(last.record.id).unwrap().is_none());
}

#[test]
fn deleting_an_unknown_match_is_not_found() {
    let (league, _, _) = league_with_four();
    let missing = MatchId::new_v4();
    assert!(matches!(
        league.delete_game(missing, None),
        Err(LeagueError::MatchNotFound(id)) if id == missing
    ));
}

#[test]
fn unknown_players_are_a_reference_error() {
    let (league, store, ids) = league_with_four();
    let stranger = PlayerId::new_v4();
    let err = league
        .process_match_at(
            &MatchSubmission::new([ids[0], ids[1], ids[2], stranger], 10, 5),
            at(4, 12),
        )
        .unwrap_err();
    assert!(matches!(err, LeagueError::UnknownPlayer(id) if id == stranger));
    assert!(!err.is_retryable());
    assert_eq!(row(&store, ids[0]).exp, 0);
    assert_eq!(store.match_count().unwrap(), 0);
}

#[test]
fn resubmitting_the_same_match_is_a_conflict() {
    let (league, store, ids) = league_with_four();
    let sub = MatchSubmission::new(ids, 10, 5);
    let first = league.process_match_at(&sub, at(4, 12)).unwrap();
    let err = league
        .process_match_at(&sub, at(4, 12) + Duration::seconds(20))
        .unwrap_err();
    assert!(matches!(
        err,
        LeagueError::Conflict(ConflictError::DuplicateMatch(id)) if id == first.record.id
    ));
    assert!(err.is_retryable());

    // outside the window it is simply another match
    league
        .process_match_at(&sub, at(4, 12) + Duration::minutes(5))
        .unwrap();
    assert_eq!(store.match_count().unwrap(), 2);
}

#[test]
fn invalid_submissions_change_nothing() {
    let (league, store, ids) = league_with_four();
    let err = league
        .process_match_at(&MatchSubmission::new(ids, 10, 10), at(4, 12))
        .unwrap_err();
    assert!(matches!(err, LeagueError::Validation(ValidationError::Tie)));
    assert_eq!(store.match_count().unwrap(), 0);
}

#[test]
fn empty_gauges_warn_but_do_not_block() {
    let mut players: Vec<Player> = ["Alice", "Bruno", "Chloe", "Dylan"].map(fresh).into();
    players[1].mana = 0;
    players[2].hp = 0;
    let ids = [players[0].id, players[1].id, players[2].id, players[3].id];
    let (league, store) = seeded(GameConfig::new(), players);

    let warnings = league.match_warnings(&ids).unwrap();
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0].player_id, ids[1]);
    assert_eq!(warnings[0].warnings, vec![Warning::NoMana]);
    assert_eq!(warnings[1].warnings, vec![Warning::NoHp]);

    league
        .process_match_at(&MatchSubmission::new(ids, 10, 8), at(4, 12))
        .unwrap();
    assert_eq!(row(&store, ids[1]).mana, 0);
    assert_eq!(row(&store, ids[2]).hp, 0);
    assert_eq!(row(&store, ids[2]).mana, 9);
}

/// Delegates to a [`MemoryStore`], but the first `stale_commits` commits are
/// rejected as stale and, when `broken`, every commit fails outright.
struct FlakyStore {
    inner: MemoryStore,
    stale_commits: AtomicU32,
    broken: bool,
}

impl FlakyStore {
    fn new(inner: MemoryStore, stale_commits: u32) -> Self {
        Self {
            inner,
            stale_commits: AtomicU32::new(stale_commits),
            broken: false,
        }
    }
}

impl Store for FlakyStore {
    fn load_players(&self, ids: &[PlayerId]) -> Result<Vec<Player>, LeagueError> {
        self.inner.load_players(ids)
    }

    fn load_match(&self, id: MatchId) -> Result<Option<Match>, LeagueError> {
        self.inner.load_match(id)
    }

    fn recent_matches(&self, since: DateTime<Utc>) -> Result<Vec<Match>, LeagueError> {
        self.inner.recent_matches(since)
    }

    fn levels(&self) -> Result<LevelTable, LeagueError> {
        self.inner.levels()
    }

    fn game_config(&self) -> Result<GameConfig, LeagueError> {
        self.inner.game_config()
    }

    fn commit(&self, writes: WriteSet) -> Result<(), LeagueError> {
        if self.broken {
            return Err(LeagueError::Storage("disk full".into()));
        }
        let left = self.stale_commits.load(Ordering::SeqCst);
        if left > 0 {
            self.stale_commits.store(left - 1, Ordering::SeqCst);
            let id = writes.players[0].player.id;
            return Err(ConflictError::StaleWrite(id).into());
        }
        self.inner.commit(writes)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, LeagueError> {
        self.inner.snapshot()
    }
}

fn flaky_league(
    stale_commits: u32,
    attempts: u32,
) -> (League<FlakyStore>, Arc<FlakyStore>, [PlayerId; 4]) {
    let players: Vec<Player> = ["Alice", "Bruno", "Chloe", "Dylan"].map(fresh).into();
    let ids = [players[0].id, players[1].id, players[2].id, players[3].id];
    let inner = MemoryStore::seeded(LevelTable::default_curve(), GameConfig::new(), players);
    let store = Arc::new(FlakyStore::new(inner, stale_commits));
    let ledger = Ledger::new(Arc::clone(&store)).with_retry(attempts, 0);
    (League::with_ledger(ledger), store, ids)
}

#[test]
fn stale_commits_are_retried() {
    let (league, store, ids) = flaky_league(2, 3);
    let settlement = league
        .process_match_at(&MatchSubmission::new(ids, 10, 4), at(4, 12))
        .unwrap();
    assert_eq!(settlement.results[0].new_exp, 15);
    assert_eq!(store.inner.match_count().unwrap(), 1);
}

#[test]
fn retries_are_bounded() {
    let (league, store, ids) = flaky_league(5, 3);
    let err = league
        .process_match_at(&MatchSubmission::new(ids, 10, 4), at(4, 12))
        .unwrap_err();
    assert!(matches!(
        err,
        LeagueError::Conflict(ConflictError::RetriesExhausted(3))
    ));
    assert_eq!(store.inner.match_count().unwrap(), 0);
    assert_eq!(store.inner.load_players(&ids).unwrap()[0].exp, 0);
}

#[test]
fn a_failed_commit_leaves_no_trace() {
    let players: Vec<Player> = ["Alice", "Bruno", "Chloe", "Dylan"].map(fresh).into();
    let ids = [players[0].id, players[1].id, players[2].id, players[3].id];
    let inner = MemoryStore::seeded(LevelTable::default_curve(), GameConfig::new(), players);
    let store = Arc::new(FlakyStore {
        inner,
        stale_commits: AtomicU32::new(0),
        broken: true,
    });
    let league = League::new(Arc::clone(&store));

    let err = league
        .process_match_at(&MatchSubmission::new(ids, 10, 4), at(4, 12))
        .unwrap_err();
    assert!(matches!(err, LeagueError::Storage(_)));
    let snapshot = store.snapshot().unwrap();
    assert!(snapshot.matches.is_empty());
    assert!(snapshot.players.iter().all(|p| p.exp == 0 && p.mana == 10));
}

#[test]
fn one_stale_row_rejects_the_whole_write_set() {
    let (league, store, ids) = league_with_four();
    let rows = store.load_players(&ids).unwrap();
    league.update_pseudo(ids[3], "Dylan2").unwrap();

    let writes = rows
        .into_iter()
        .map(|mut p| {
            p.exp += 10;
            PlayerWrite::update(p)
        })
        .collect();
    let err = store
        .commit(WriteSet {
            players: writes,
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        LeagueError::Conflict(ConflictError::StaleWrite(id)) if id == ids[3]
    ));
    assert_eq!(row(&store, ids[0]).exp, 0);
}

#[test]
fn concurrent_settlements_apply_every_delta() {
    let names = ["Alice", "Bruno", "Chloe", "Dylan", "Emile"];
    let players: Vec<Player> = names.map(fresh).into();
    let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
    let config = GameConfig::new().with("duplicate_window_secs", 0);
    let store = Arc::new(MemoryStore::seeded(
        LevelTable::default_curve(),
        config,
        players,
    ));
    let league = League::with_ledger(Ledger::new(Arc::clone(&store)).with_retry(100, 1));

    std::thread::scope(|s| {
        for t in 0..4usize {
            let league = &league;
            let ids = &ids;
            s.spawn(move || {
                for i in 0..10usize {
                    let lineup = [
                        ids[(t + i) % 5],
                        ids[(t + i + 1) % 5],
                        ids[(t + i + 2) % 5],
                        ids[(t + i + 3) % 5],
                    ];
                    let score = u8::try_from(i % 10).unwrap();
                    league
                        .process_match_at(
                            &MatchSubmission::new(lineup, 10, i32::from(score)),
                            at(4, 12) + Duration::seconds((t * 100 + i) as i64),
                        )
                        .unwrap();
                }
            });
        }
    });

    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.matches.len(), 40);
    for p in &snapshot.players {
        let gained: i64 = snapshot
            .matches
            .iter()
            .filter_map(|m| m.seat_of(p.id).map(|seat| m.seat(seat).exp_gained()))
            .sum();
        assert_eq!(i64::from(p.exp), gained, "{}", p.pseudo);
        assert!(p.mana <= 10 && p.hp <= 10);
    }
}

#[test]
fn settlements_are_published() {
    let (league, _, ids) = league_with_four();
    let mut events = league.subscribe();
    let settlement = league
        .process_match_at(&MatchSubmission::new(ids, 10, 4), at(4, 12))
        .unwrap();
    assert_eq!(
        events.try_recv().unwrap(),
        LedgerEvent::MatchSettled {
            match_id: settlement.record.id,
            players: ids,
        }
    );
    league.delete_game(settlement.record.id, None).unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        LedgerEvent::MatchReversed { .. }
    ));
}

#[test]
fn weekly_decay_regenerates_and_decays_the_idle() {
    let mut players: Vec<Player> = ["Alice", "Bruno", "Chloe", "Dylan", "Emile", "Fanny"]
        .map(fresh)
        .into();
    // level 6 starts at 750 exp
    players[4].exp = 1000;
    players[4].mana = 3;
    players[5].exp = 760;
    let ids = [players[0].id, players[1].id, players[2].id, players[3].id];
    let (idle, near_floor) = (players[4].id, players[5].id);
    let (league, store) = seeded(GameConfig::new(), players);

    league
        .process_match_at(&MatchSubmission::new(ids, 10, 4), at(4, 12))
        .unwrap();
    let records: Vec<DecayRecord> = league.weekly_decay(at(8, 12)).unwrap();

    let idle_row = row(&store, idle);
    assert_eq!(idle_row.exp, 950);
    assert_eq!(idle_row.mana, 10);
    assert_eq!(row(&store, near_floor).exp, 750);

    let alice = row(&store, ids[0]);
    assert_eq!(alice.exp, 15);
    assert_eq!(alice.mana, 10);

    let record = records.iter().find(|r| r.player_id == idle).unwrap();
    assert_eq!((record.exp_before, record.exp_after), (1000, 950));
    assert_eq!(record.mana_added, 7);
    assert_eq!(record.matches_played, 0);
    assert_eq!(store.decay_history().unwrap().len(), records.len());
}

#[test]
fn reset_refills_every_gauge() {
    let (league, store, ids) = league_with_four();
    league
        .process_match_at(&MatchSubmission::new(ids, 10, 0), at(4, 12))
        .unwrap();
    assert_eq!(league.reset_hp_mana().unwrap(), 4);
    for id in ids {
        let p = row(&store, id);
        assert_eq!((p.hp, p.mana), (10, 10));
    }
    assert_eq!(league.reset_hp_mana().unwrap(), 0);
}

#[test]
fn pseudos_are_unique_ignoring_case() {
    let (league, _, ids) = league_with_four();
    let err = league.register_player("  alice ").unwrap_err();
    assert!(matches!(
        err,
        LeagueError::Validation(ValidationError::PseudoTaken(_))
    ));
    let err = league.register_player("Al").unwrap_err();
    assert!(matches!(
        err,
        LeagueError::Validation(ValidationError::PseudoLength { len: 2 })
    ));

    let gaspard = league.register_player("Gaspard").unwrap();
    assert_eq!((gaspard.exp, gaspard.hp, gaspard.mana), (0, 10, 10));
    assert!(league.update_pseudo(ids[1], "GASPARD").is_err());
    let renamed = league.update_pseudo(ids[1], "Bruno B.").unwrap();
    assert_eq!(renamed.pseudo, "Bruno B.");

    let disabled = league.set_disabled(ids[2], true).unwrap();
    assert!(disabled.disable);
    let levels = league.get_players_level(false).unwrap();
    assert!(levels.iter().all(|l| l.player_id != ids[2]));
    assert_eq!(league.get_players_level(true).unwrap().len(), 5);
}
