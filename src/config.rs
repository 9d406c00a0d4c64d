//! Tunable game constants and process configuration.
//!
//! `GameConfig` is the small key-value table read by settlement, decay and
//! the aggregator. Every key has a documented default so an empty table is
//! a complete configuration. `AppConfig` is what the binary reads from the
//! environment.

use crate::models::LeagueError;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// `(key, default, description)` for every known game constant.
pub const DEFAULTS: &[(&str, i64, &str)] = &[
    ("max_hp", 10, "Upper bound of the HP gauge"),
    ("max_mana", 10, "Upper bound of the mana gauge"),
    ("min_reward_pct", 50, "Share of exp_given granted for a 10-9 win (100% at 10-0)"),
    ("consolation_pct", 10, "Share of exp_given granted to each loser"),
    ("mana_cost", 1, "Mana spent by every participant"),
    ("hp_cost_defeat", 1, "HP lost by each loser"),
    ("hp_cost_perfect_defeat", 2, "HP lost by each loser of a 10-0"),
    ("duplicate_window_secs", 60, "Identical lineup and score inside this window is a duplicate"),
    ("min_partner_matches", 2, "Matches together before a partner/opponent is ranked"),
    ("min_pair_matches", 3, "Matches before a pair is ranked"),
    ("min_position_matches", 3, "Matches in a role before a player is ranked in it"),
    ("min_title_matches", 3, "Matches before a player qualifies for rate-based titles"),
    ("min_streak_length", 2, "Shortest streak that can hold a streak title"),
    ("min_revenge_opportunities", 2, "Rematches before the revenge title applies"),
    ("min_classico_matches", 2, "Meetings before a team matchup is a classic"),
    ("min_first_blood_matches", 1, "Week-opening matches before first-blood ranking"),
    ("weekly_mana_regen", 10, "Mana restored by the weekly job"),
    ("weekly_hp_regen", 10, "HP restored by the weekly job"),
    ("min_weekly_matches", 1, "Players below this many matches in a week decay"),
    ("decay_pct", 5, "Share of exp lost by inactive players each week"),
    ("utc_offset_minutes", 0, "Local time offset used by time-of-day titles"),
    ("lunch_start_minute", 720, "Start of the lunch window, minutes after midnight"),
    ("lunch_end_minute", 870, "End of the lunch window (exclusive)"),
];

fn default_value(key: &str) -> Option<i64> {
    DEFAULTS.iter().find(|(k, _, _)| *k == key).map(|(_, v, _)| *v)
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub value: i64,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    entries: BTreeMap<String, ConfigEntry>,
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known key materialised with its default (for display).
    pub fn with_defaults() -> Self {
        let mut config = Self::new();
        for (key, value, description) in DEFAULTS {
            config.entries.insert(
                key.to_string(),
                ConfigEntry {
                    value: *value,
                    description: Some(description.to_string()),
                },
            );
        }
        config
    }

    pub fn set(&mut self, key: impl Into<String>, value: i64) {
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                self.entries.insert(key, ConfigEntry { value, description: None });
            }
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: ConfigEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Builder form of [`GameConfig::set`].
    pub fn with(mut self, key: impl Into<String>, value: i64) -> Self {
        self.set(key, value);
        self
    }

    /// Stored value, falling back to the default; unknown keys read as 0.
    pub fn get(&self, key: &str) -> i64 {
        self.entries
            .get(key)
            .map(|e| e.value)
            .or_else(|| default_value(key))
            .unwrap_or(0)
    }

    /// Value read as a count; negative values clamp to 0.
    pub fn count(&self, key: &str) -> u32 {
        self.get(key).clamp(0, i64::from(u32::MAX)) as u32
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn max_hp(&self) -> u32 {
        self.count("max_hp")
    }

    pub fn max_mana(&self) -> u32 {
        self.count("max_mana")
    }

    pub fn duplicate_window_secs(&self) -> i64 {
        self.get("duplicate_window_secs").max(0)
    }

    /// Offset for local-time titles; out-of-range values fall back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        let secs = self.get("utc_offset_minutes").saturating_mul(60);
        i32::try_from(secs)
            .ok()
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Where the league's tables come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreUrl {
    /// Empty league with the default level curve.
    Memory,
    /// Seed files read from a directory.
    Csv(PathBuf),
}

impl StoreUrl {
    pub fn parse(raw: &str) -> Result<Self, LeagueError> {
        let raw = raw.trim();
        if raw == "memory://" || raw == "memory" {
            return Ok(StoreUrl::Memory);
        }
        if let Some(path) = raw.strip_prefix("csv://") {
            if path.is_empty() {
                return Err(LeagueError::Config("csv:// store url needs a directory".into()));
            }
            return Ok(StoreUrl::Csv(PathBuf::from(path)));
        }
        Err(LeagueError::Config(format!(
            "unsupported store url '{}' (expected memory:// or csv://<dir>)",
            raw
        )))
    }
}

pub const STORE_URL_VAR: &str = "BABYFOOT_STORE_URL";
pub const ACCESS_KEY_VAR: &str = "BABYFOOT_ACCESS_KEY";
pub const DECAY_INTERVAL_VAR: &str = "BABYFOOT_DECAY_INTERVAL_HOURS";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

const DEFAULT_DECAY_INTERVAL_HOURS: u64 = 7 * 24;

/// Process configuration read at startup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_url: StoreUrl,
    pub access_key: String,
    /// 0 disables the background decay job.
    pub decay_interval_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, LeagueError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Store url and access key are required; everything else has a default.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, LeagueError> {
        let required = |name: &str| -> Result<String, LeagueError> {
            var(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| LeagueError::Config(format!("{} is not set", name)))
        };
        let store_url = StoreUrl::parse(&required(STORE_URL_VAR)?)?;
        let access_key = required(ACCESS_KEY_VAR)?;
        let host = var("HOST").unwrap_or_else(default_host);
        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(default_port);
        let decay_interval_hours = var(DECAY_INTERVAL_VAR)
            .and_then(|h| h.parse().ok())
            .unwrap_or(DEFAULT_DECAY_INTERVAL_HOURS);
        Ok(Self {
            host,
            port,
            store_url,
            access_key,
            decay_interval_hours,
        })
    }
}
