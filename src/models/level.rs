//! Level table: exp thresholds, rewards and display metadata.

use crate::models::error::LeagueError;
use serde::{Deserialize, Serialize};

/// One row of the level table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub level: u32,
    /// Exp needed to reach this level.
    pub min_exp: u32,
    /// Reward for a win played at this level.
    pub exp_given: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub illustration: Option<String>,
}

/// A row of the `levels_with_info` view: display metadata is inherited from
/// the closest level at or below that has a title.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LevelWithInfo {
    pub level: u32,
    pub required_exp: u32,
    pub exp_given: u32,
    pub display_title: Option<String>,
    pub display_description: Option<String>,
    pub display_illustration: Option<String>,
    pub source_level: Option<u32>,
}

/// Where a given exp total sits in the table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub required_exp: u32,
    pub next_level_exp: Option<u32>,
    /// Percentage of the way to the next level (100 at the top level).
    pub progress: f64,
}

/// Validated, immutable level table.
///
/// Levels are contiguous from 1, level 1 starts at 0 exp and `min_exp` is
/// strictly increasing, so every exp total maps to exactly one level.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LevelTable {
    levels: Vec<Level>,
}

const CURVE_LEVELS: u32 = 20;

impl LevelTable {
    pub fn new(mut levels: Vec<Level>) -> Result<Self, LeagueError> {
        if levels.is_empty() {
            return Err(LeagueError::InvalidLevelTable("no levels".into()));
        }
        levels.sort_by_key(|l| l.level);
        for (i, l) in levels.iter().enumerate() {
            let expected = i as u32 + 1;
            if l.level != expected {
                return Err(LeagueError::InvalidLevelTable(format!(
                    "expected level {} but found {}",
                    expected, l.level
                )));
            }
        }
        if levels[0].min_exp != 0 {
            return Err(LeagueError::InvalidLevelTable(
                "level 1 must start at 0 exp".into(),
            ));
        }
        for pair in levels.windows(2) {
            if pair[1].min_exp <= pair[0].min_exp {
                return Err(LeagueError::InvalidLevelTable(format!(
                    "min_exp of level {} ({}) is not above level {} ({})",
                    pair[1].level, pair[1].min_exp, pair[0].level, pair[0].min_exp
                )));
            }
        }
        Ok(Self { levels })
    }

    /// Table used when no level seed is provided.
    pub fn default_curve() -> Self {
        let titled = |level: u32| -> Option<(&'static str, &'static str)> {
            match level {
                1 => Some(("Rookie", "Still learning which rod is which")),
                5 => Some(("Wall Player", "Nothing gets past the goalie bar")),
                10 => Some(("Snake Shooter", "Wrist-roll shots from the five bar")),
                15 => Some(("Pull-Shot Master", "Reads the defence and pulls through it")),
                20 => Some(("Table Legend", "Their name is carved under the table")),
                _ => None,
            }
        };
        let levels = (1..=CURVE_LEVELS)
            .map(|l| {
                let meta = titled(l);
                Level {
                    level: l,
                    min_exp: 25 * (l - 1) * l,
                    exp_given: 20 + 5 * (l - 1),
                    title: meta.map(|(t, _)| t.to_string()),
                    description: meta.map(|(_, d)| d.to_string()),
                    illustration: meta.map(|_| format!("/assets/levels/{}.png", l)),
                }
            })
            .collect();
        Self { levels }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Largest level whose `min_exp` is at most `exp`.
    pub fn level_for(&self, exp: u32) -> &Level {
        let idx = self.levels.partition_point(|l| l.min_exp <= exp);
        // level 1 starts at 0, so idx >= 1
        &self.levels[idx.saturating_sub(1)]
    }

    pub fn next_after(&self, level: &Level) -> Option<&Level> {
        self.levels.get(level.level as usize)
    }

    pub fn progress(&self, exp: u32) -> LevelProgress {
        let current = self.level_for(exp);
        let next = self.next_after(current);
        let progress = match next {
            Some(n) => {
                let span = f64::from(n.min_exp - current.min_exp);
                f64::from(exp - current.min_exp) / span * 100.0
            }
            None => 100.0,
        };
        LevelProgress {
            level: current.level,
            required_exp: current.min_exp,
            next_level_exp: next.map(|n| n.min_exp),
            progress: (progress * 100.0).round() / 100.0,
        }
    }

    /// Nearest level at or below `level` that carries a title.
    pub fn display_source(&self, level: u32) -> Option<&Level> {
        self.levels
            .iter()
            .rev()
            .filter(|l| l.level <= level)
            .find(|l| l.title.is_some())
    }

    pub fn with_info(&self) -> Vec<LevelWithInfo> {
        self.levels
            .iter()
            .map(|l| {
                let source = self.display_source(l.level);
                LevelWithInfo {
                    level: l.level,
                    required_exp: l.min_exp,
                    exp_given: l.exp_given,
                    display_title: source.and_then(|s| s.title.clone()),
                    display_description: source.and_then(|s| s.description.clone()),
                    display_illustration: source.and_then(|s| s.illustration.clone()),
                    source_level: source.map(|s| s.level),
                }
            })
            .collect()
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::default_curve()
    }
}
