//! CSV seed files: `levels.csv`, `players.csv`, `game_config.csv`.

use super::MemoryStore;
use crate::config::{ConfigEntry, GameConfig, StoreUrl};
use crate::models::{
    normalize_pseudo, LeagueError, Level, LevelTable, Player, PlayerId, ValidationError,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use uuid::Uuid;

/// `level,min_exp,exp_given,title,description,illustration`
pub fn read_levels<R: Read>(reader: R) -> Result<LevelTable, LeagueError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let levels = rdr
        .deserialize::<Level>()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|l| Level {
            title: non_blank(l.title),
            description: non_blank(l.description),
            illustration: non_blank(l.illustration),
            ..l
        })
        .collect();
    LevelTable::new(levels)
}

fn non_blank(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct PlayerRow {
    #[serde(default)]
    id: Option<PlayerId>,
    pseudo: String,
    #[serde(default)]
    exp: Option<u32>,
    #[serde(default)]
    hp: Option<u32>,
    #[serde(default)]
    mana: Option<u32>,
    #[serde(default)]
    disable: Option<bool>,
}

/// `id,pseudo,exp,hp,mana,disable`; everything but the pseudo may be left empty.
/// Missing gauges start full; gauges above the configured max are clamped.
pub fn read_players<R: Read>(reader: R, config: &GameConfig) -> Result<Vec<Player>, LeagueError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut seen = HashSet::new();
    let mut ids = HashSet::new();
    let mut players = Vec::new();
    for row in rdr.deserialize::<PlayerRow>() {
        let row = row?;
        let pseudo = normalize_pseudo(&row.pseudo)?;
        if !seen.insert(pseudo.to_lowercase()) {
            return Err(ValidationError::PseudoTaken(pseudo).into());
        }
        let id = row.id.unwrap_or_else(Uuid::new_v4);
        if !ids.insert(id) {
            return Err(LeagueError::Config(format!("player id {} appears twice", id)));
        }
        players.push(Player {
            id,
            pseudo,
            exp: row.exp.unwrap_or(0),
            hp: row.hp.unwrap_or(config.max_hp()).min(config.max_hp()),
            mana: row.mana.unwrap_or(config.max_mana()).min(config.max_mana()),
            disable: row.disable.unwrap_or(false),
            created_at: Utc::now(),
            version: 0,
        });
    }
    Ok(players)
}

#[derive(Debug, Deserialize)]
struct ConfigRow {
    key: String,
    value: i64,
    #[serde(default)]
    description: Option<String>,
}

/// `key,value,description`
pub fn read_config<R: Read>(reader: R) -> Result<GameConfig, LeagueError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut config = GameConfig::new();
    for row in rdr.deserialize::<ConfigRow>() {
        let row = row?;
        config.insert(
            row.key.trim(),
            ConfigEntry {
                value: row.value,
                description: non_blank(row.description),
            },
        );
    }
    Ok(config)
}

fn open(path: &Path) -> Result<std::fs::File, LeagueError> {
    std::fs::File::open(path)
        .map_err(|e| LeagueError::Storage(format!("{}: {}", path.display(), e)))
}

pub fn load_levels_csv(path: &Path) -> Result<LevelTable, LeagueError> {
    read_levels(open(path)?)
}

pub fn load_players_csv(path: &Path, config: &GameConfig) -> Result<Vec<Player>, LeagueError> {
    read_players(open(path)?, config)
}

pub fn load_config_csv(path: &Path) -> Result<GameConfig, LeagueError> {
    read_config(open(path)?)
}

/// Build the store named by the url. Seed files missing from a csv
/// directory fall back to defaults.
pub fn open_store(url: &StoreUrl) -> Result<MemoryStore, LeagueError> {
    match url {
        StoreUrl::Memory => Ok(MemoryStore::default()),
        StoreUrl::Csv(dir) => {
            if !dir.is_dir() {
                return Err(LeagueError::Config(format!(
                    "seed directory {} does not exist",
                    dir.display()
                )));
            }
            let config_path = dir.join("game_config.csv");
            let config = if config_path.exists() {
                load_config_csv(&config_path)?
            } else {
                GameConfig::new()
            };
            let levels_path = dir.join("levels.csv");
            let levels = if levels_path.exists() {
                load_levels_csv(&levels_path)?
            } else {
                log::info!("No levels.csv in {}, using default curve", dir.display());
                LevelTable::default_curve()
            };
            let players_path = dir.join("players.csv");
            let players = if players_path.exists() {
                load_players_csv(&players_path, &config)?
            } else {
                Vec::new()
            };
            log::info!(
                "Seeded store from {}: {} levels, {} players",
                dir.display(),
                levels.levels().len(),
                players.len()
            );
            Ok(MemoryStore::seeded(levels, config, players))
        }
    }
}
