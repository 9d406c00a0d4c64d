//! Player rows and the exp/hp/mana resource triple.

use crate::models::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player (used in matches and lookups).
pub type PlayerId = Uuid;

pub const PSEUDO_MIN_LEN: usize = 3;
pub const PSEUDO_MAX_LEN: usize = 20;

/// The three gauges a settlement mutates.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub exp: u32,
    pub hp: u32,
    pub mana: u32,
}

/// A registered league player.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub pseudo: String,
    pub exp: u32,
    pub hp: u32,
    pub mana: u32,
    /// Excluded from new-match selection; never hard-deleted.
    #[serde(default)]
    pub disable: bool,
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every committed write.
    #[serde(default)]
    pub version: u64,
}

impl Player {
    /// Create a fresh player with full gauges and no experience.
    pub fn new(pseudo: impl Into<String>, max_hp: u32, max_mana: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            pseudo: pseudo.into(),
            exp: 0,
            hp: max_hp,
            mana: max_mana,
            disable: false,
            created_at: Utc::now(),
            version: 0,
        }
    }

    pub fn resources(&self) -> Resources {
        Resources {
            exp: self.exp,
            hp: self.hp,
            mana: self.mana,
        }
    }

    /// Overwrite the three gauges (settlement, reversal and decay all go through here).
    pub fn set_resources(&mut self, r: Resources) {
        self.exp = r.exp;
        self.hp = r.hp;
        self.mana = r.mana;
    }
}

/// Trim a requested pseudo and check its length (counted in characters).
pub fn normalize_pseudo(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if !(PSEUDO_MIN_LEN..=PSEUDO_MAX_LEN).contains(&len) {
        return Err(ValidationError::PseudoLength { len });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_is_trimmed_and_bounded() {
        assert_eq!(normalize_pseudo("  Zizou ").unwrap(), "Zizou");
        assert_eq!(
            normalize_pseudo("ab"),
            Err(ValidationError::PseudoLength { len: 2 })
        );
        assert!(normalize_pseudo(&"x".repeat(21)).is_err());
        // multi-byte characters count once each
        assert!(normalize_pseudo("ééé").is_ok());
    }

    #[test]
    fn new_player_starts_full() {
        let p = Player::new("Gaby", 10, 8);
        let expected = Resources {
            exp: 0,
            hp: 10,
            mana: 8,
        };
        assert_eq!(p.resources(), expected);
        assert!(!p.disable);
    }
}
