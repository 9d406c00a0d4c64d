//! Exp decay history rows written by the weekly job.

use crate::models::player::PlayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DecayRecord {
    pub id: Uuid,
    pub player_id: PlayerId,
    pub decay_date: DateTime<Utc>,
    pub exp_before: u32,
    pub exp_after: u32,
    pub mana_added: u32,
    pub hp_added: u32,
    /// Matches in the seven days before `decay_date`.
    pub matches_played: u32,
}
