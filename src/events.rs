//! Ledger change notifications.
//!
//! Published on a `tokio::sync::broadcast` channel after every committed
//! mutation; consumers (the stats cache, the server's event log) refetch
//! instead of reloading.

use crate::models::{MatchId, PlayerId};
use serde::Serialize;
use tokio::sync::broadcast;

pub const EVENT_CAPACITY: usize = 256;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    MatchSettled {
        match_id: MatchId,
        players: [PlayerId; 4],
    },
    MatchReversed {
        match_id: MatchId,
        players: [PlayerId; 4],
    },
    PlayerChanged {
        player_id: PlayerId,
    },
    GaugesReset {
        players: usize,
    },
    DecayApplied {
        players: usize,
    },
}

pub fn channel() -> broadcast::Sender<LedgerEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}
