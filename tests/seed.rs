//! Integration tests for CSV seeding and store urls.

use babyfoot_league::config::GameConfig;
use babyfoot_league::store::{read_config, read_levels, read_players};
use babyfoot_league::{open_store, LeagueError, Store, StoreUrl, ValidationError};
use std::fs;
use uuid::Uuid;

const LEVELS: &str = "\
level,min_exp,exp_given,title,description,illustration
1,0,20,Rookie,First steps,rookie.png
2,40,25,,,
3,100,30,Striker,Scores from anywhere,
";

#[test]
fn levels_inherit_display_metadata() {
    let table = read_levels(LEVELS.as_bytes()).unwrap();
    assert_eq!(table.levels().len(), 3);
    assert_eq!(table.level_for(39).level, 1);
    assert_eq!(table.level_for(40).level, 2);
    assert_eq!(table.level_for(5000).level, 3);

    let info = table.with_info();
    assert_eq!(info[1].display_title.as_deref(), Some("Rookie"));
    assert_eq!(info[1].display_illustration.as_deref(), Some("rookie.png"));
    assert_eq!(info[1].source_level, Some(1));
    assert_eq!(info[2].display_title.as_deref(), Some("Striker"));
    assert_eq!(info[2].display_illustration, None);
}

#[test]
fn thresholds_must_increase() {
    let csv = "level,min_exp,exp_given\n1,0,20\n2,50,25\n3,50,30\n";
    assert!(matches!(
        read_levels(csv.as_bytes()),
        Err(LeagueError::InvalidLevelTable(_))
    ));
    let gap = "level,min_exp,exp_given\n1,0,20\n3,50,25\n";
    assert!(matches!(
        read_levels(gap.as_bytes()),
        Err(LeagueError::InvalidLevelTable(_))
    ));
}

#[test]
fn players_default_to_full_gauges() {
    let id = Uuid::new_v4();
    let csv = format!(
        "id,pseudo,exp,hp,mana,disable\n{},  Alice ,120,4,,\n,Bruno,,,99,true\n",
        id
    );
    let config = GameConfig::new();
    let players = read_players(csv.as_bytes(), &config).unwrap();
    assert_eq!(players.len(), 2);

    let alice = &players[0];
    assert_eq!((alice.id, alice.pseudo.as_str()), (id, "Alice"));
    assert_eq!((alice.exp, alice.hp, alice.mana), (120, 4, 10));
    assert!(!alice.disable);

    let bruno = &players[1];
    assert_eq!((bruno.exp, bruno.hp, bruno.mana), (0, 10, 10));
    assert!(bruno.disable);
}

#[test]
fn duplicate_pseudos_are_rejected() {
    let csv = "id,pseudo,exp,hp,mana,disable\n,Alice,,,,\n,ALICE,,,,\n";
    assert!(matches!(
        read_players(csv.as_bytes(), &GameConfig::new()),
        Err(LeagueError::Validation(ValidationError::PseudoTaken(_)))
    ));
}

#[test]
fn duplicate_ids_are_rejected() {
    let id = Uuid::new_v4();
    let csv = format!("id,pseudo,exp,hp,mana,disable\n{id},Alice,,,,\n{id},Bruno,,,,\n");
    let err = read_players(csv.as_bytes(), &GameConfig::new()).unwrap_err();
    assert!(matches!(&err, LeagueError::Config(msg) if msg.contains(&id.to_string())));

    // rows without an id each get a fresh one
    let csv = "id,pseudo,exp,hp,mana,disable\n,Alice,,,,\n,Bruno,,,,\n";
    let players = read_players(csv.as_bytes(), &GameConfig::new()).unwrap();
    assert_ne!(players[0].id, players[1].id);
}

#[test]
fn config_rows_override_defaults() {
    let csv = "key,value,description\nmax_hp,5,Shorter season\nmin_pair_matches,4,\n";
    let config = read_config(csv.as_bytes()).unwrap();
    assert_eq!(config.max_hp(), 5);
    assert_eq!(config.count("min_pair_matches"), 4);
    // untouched keys keep their documented default
    assert_eq!(config.max_mana(), 10);
}

#[test]
fn csv_directory_seeds_a_store() {
    let dir = std::env::temp_dir().join(format!("babyfoot-seed-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("levels.csv"), LEVELS).unwrap();
    fs::write(dir.join("game_config.csv"), "key,value,description\nmax_mana,6,\n").unwrap();
    fs::write(
        dir.join("players.csv"),
        "id,pseudo,exp,hp,mana,disable\n,Alice,,,,\n,Bruno,50,,,\n",
    )
    .unwrap();

    let url = StoreUrl::parse(&format!("csv://{}", dir.display())).unwrap();
    let store = open_store(&url).unwrap();
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.levels.levels().len(), 3);
    assert_eq!(snapshot.config.max_mana(), 6);
    assert_eq!(snapshot.players.len(), 2);
    assert!(snapshot.players.iter().all(|p| p.mana == 6));
    assert_eq!(snapshot.players[1].exp, 50);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_seed_directory_is_a_config_error() {
    let url = StoreUrl::Csv(std::env::temp_dir().join(format!("missing-{}", Uuid::new_v4())));
    assert!(matches!(open_store(&url), Err(LeagueError::Config(_))));
    assert!(StoreUrl::parse("postgres://db").is_err());
    assert_eq!(StoreUrl::parse("memory://").unwrap(), StoreUrl::Memory);
}
