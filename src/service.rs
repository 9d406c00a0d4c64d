//! `League`: the RPC operations by name, over a ledger, an event channel and
//! the stats cache.

use crate::config::GameConfig;
use crate::events::{self, LedgerEvent};
use crate::logic::{match_warnings, validate_match, Ledger, PlayerWarning, Reversal, Settlement};
use crate::models::{
    DecayRecord, LeagueError, LevelWithInfo, MatchId, MatchSubmission, Player, PlayerId,
};
use crate::stats::{
    base_match_stats, complex_stats, historical_stats, match_history, player_stats, players_level,
    BaseMatchStats, ComplexStats, HistoricalStats, MatchHistoryPage, Period, PlayerLevel,
    PlayerStats, StatsCache,
};
use crate::store::{LedgerSnapshot, Store};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct League<S> {
    ledger: Ledger<S>,
    events: broadcast::Sender<LedgerEvent>,
    cache: StatsCache,
}

impl<S: Store> League<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_ledger(Ledger::new(store))
    }

    pub fn with_ledger(ledger: Ledger<S>) -> Self {
        let events = events::channel();
        let cache = StatsCache::new(events.subscribe());
        Self {
            ledger,
            events,
            cache,
        }
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    /// Receiver for every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: LedgerEvent) {
        if self.events.send(event).is_err() {
            log::debug!("no event subscribers");
        }
    }

    fn cached<T>(
        &self,
        key: String,
        compute: impl FnOnce(&LedgerSnapshot) -> T,
    ) -> Result<Arc<T>, LeagueError>
    where
        T: Send + Sync + 'static,
    {
        self.cache.get_or_compute(&key, || {
            let snapshot = self.ledger.store().snapshot()?;
            Ok(compute(&snapshot))
        })
    }

    /// Validate, settle and record a match dated now.
    pub fn process_match(&self, submission: &MatchSubmission) -> Result<Settlement, LeagueError> {
        self.process_match_at(submission, Utc::now())
    }

    pub fn process_match_at(
        &self,
        submission: &MatchSubmission,
        date: DateTime<Utc>,
    ) -> Result<Settlement, LeagueError> {
        let request = validate_match(submission)?;
        let settlement = self.ledger.settle(&request, date)?;
        log::info!(
            "Match {} recorded: {}-{}",
            settlement.record.id,
            settlement.record.score_white,
            settlement.record.score_black
        );
        self.publish(LedgerEvent::MatchSettled {
            match_id: settlement.record.id,
            players: settlement.record.players(),
        });
        Ok(settlement)
    }

    pub fn delete_game(
        &self,
        match_id: MatchId,
        requested_by: Option<PlayerId>,
    ) -> Result<Reversal, LeagueError> {
        let reversal = self.ledger.reverse(match_id)?;
        match requested_by {
            Some(by) => log::info!("Match {} deleted by {}", match_id, by),
            None => log::info!("Match {} deleted", match_id),
        }
        let players = reversal.restored.iter().map(|r| r.player_id).collect::<Vec<_>>();
        if let Ok(players) = <[PlayerId; 4]>::try_from(players) {
            self.publish(LedgerEvent::MatchReversed { match_id, players });
        }
        Ok(reversal)
    }

    /// Stats for everyone (or one player), over a `YYYY-MM` month or all time.
    pub fn get_player_stats(
        &self,
        player: Option<PlayerId>,
        month: Option<&str>,
    ) -> Result<Arc<Vec<PlayerStats>>, LeagueError> {
        let period = month.map(Period::parse_month).transpose()?.unwrap_or_default();
        self.cached(format!("player_stats:{:?}:{:?}", player, period), |s| {
            player_stats(s, &period, player)
        })
    }

    pub fn get_players_level(
        &self,
        include_disabled: bool,
    ) -> Result<Arc<Vec<PlayerLevel>>, LeagueError> {
        self.cached(format!("players_level:{}", include_disabled), |s| {
            players_level(s, include_disabled)
        })
    }

    /// `date` selects its month; otherwise `start`/`end` bound the period.
    pub fn get_base_match_stats(
        &self,
        date: Option<NaiveDate>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Arc<BaseMatchStats>, LeagueError> {
        let period = match date {
            Some(d) => Period::month_of(d),
            None => Period::between(start, end)?,
        };
        self.cached(format!("base_match_stats:{:?}", period), |s| {
            base_match_stats(s, &period)
        })
    }

    pub fn get_complex_stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        player: Option<PlayerId>,
    ) -> Result<Arc<ComplexStats>, LeagueError> {
        let period = Period::between(start, end)?;
        self.cached(format!("complex_stats:{:?}:{:?}", period, player), |s| {
            complex_stats(s, &period, player)
        })
    }

    pub fn get_historical_stats(
        &self,
        player: Option<PlayerId>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Arc<HistoricalStats>, LeagueError> {
        let period = Period::between(start, end)?;
        self.cached(format!("historical_stats:{:?}:{:?}", period, player), |s| {
            historical_stats(s, &period, player)
        })
    }

    pub fn get_level_info(&self) -> Result<Vec<LevelWithInfo>, LeagueError> {
        Ok(self.ledger.store().levels()?.with_info())
    }

    pub fn get_match_history(
        &self,
        player: Option<PlayerId>,
        page: usize,
        per_page: usize,
    ) -> Result<Arc<MatchHistoryPage>, LeagueError> {
        self.cached(
            format!("match_history:{:?}:{}:{}", player, page, per_page),
            |s| match_history(s, player, page, per_page),
        )
    }

    /// Soft warnings for a prospective lineup.
    pub fn match_warnings(&self, players: &[PlayerId]) -> Result<Vec<PlayerWarning>, LeagueError> {
        let rows = self.ledger.store().load_players(players)?;
        Ok(match_warnings(&rows))
    }

    pub fn register_player(&self, pseudo: &str) -> Result<Player, LeagueError> {
        let player = self.ledger.register_player(pseudo)?;
        self.publish(LedgerEvent::PlayerChanged {
            player_id: player.id,
        });
        Ok(player)
    }

    pub fn update_pseudo(&self, id: PlayerId, pseudo: &str) -> Result<Player, LeagueError> {
        let player = self.ledger.rename_player(id, pseudo)?;
        self.publish(LedgerEvent::PlayerChanged { player_id: id });
        Ok(player)
    }

    pub fn set_disabled(&self, id: PlayerId, disable: bool) -> Result<Player, LeagueError> {
        let player = self.ledger.set_disabled(id, disable)?;
        self.publish(LedgerEvent::PlayerChanged { player_id: id });
        Ok(player)
    }

    pub fn weekly_decay(&self, now: DateTime<Utc>) -> Result<Vec<DecayRecord>, LeagueError> {
        let records = self.ledger.weekly_decay(now)?;
        if !records.is_empty() {
            self.publish(LedgerEvent::DecayApplied {
                players: records.len(),
            });
        }
        Ok(records)
    }

    pub fn reset_hp_mana(&self) -> Result<usize, LeagueError> {
        let count = self.ledger.reset_hp_mana()?;
        if count > 0 {
            self.publish(LedgerEvent::GaugesReset { players: count });
        }
        Ok(count)
    }

    pub fn game_config(&self) -> Result<GameConfig, LeagueError> {
        self.ledger.store().game_config()
    }
}
