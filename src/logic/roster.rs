//! Player registration and profile changes.

use crate::logic::ledger::Ledger;
use crate::models::{normalize_pseudo, LeagueError, Player, PlayerId};
use crate::store::{PlayerWrite, Store, WriteSet};

impl<S: Store> Ledger<S> {
    /// Register a new player with full gauges. Pseudos are unique, ignoring case.
    pub fn register_player(&self, pseudo: &str) -> Result<Player, LeagueError> {
        let pseudo = normalize_pseudo(pseudo)?;
        let config = self.store().game_config()?;
        let player = Player::new(pseudo, config.max_hp(), config.max_mana());
        self.store().commit(WriteSet {
            players: vec![PlayerWrite::insert(player.clone())],
            ..Default::default()
        })?;
        log::info!("Registered player {} ({})", player.pseudo, player.id);
        Ok(player)
    }

    pub fn rename_player(&self, id: PlayerId, pseudo: &str) -> Result<Player, LeagueError> {
        let pseudo = normalize_pseudo(pseudo)?;
        self.update_player("rename_player", id, |p| p.pseudo = pseudo.clone())
    }

    /// Soft-remove (or bring back) a player; their history is untouched.
    pub fn set_disabled(&self, id: PlayerId, disable: bool) -> Result<Player, LeagueError> {
        self.update_player("set_disabled", id, |p| p.disable = disable)
    }

    fn update_player(
        &self,
        op: &str,
        id: PlayerId,
        change: impl Fn(&mut Player),
    ) -> Result<Player, LeagueError> {
        self.retry(op, || {
            let mut player = self
                .store()
                .load_players(&[id])?
                .pop()
                .ok_or(LeagueError::UnknownPlayer(id))?;
            change(&mut player);
            self.store().commit(WriteSet {
                players: vec![PlayerWrite::update(player.clone())],
                ..Default::default()
            })?;
            player.version += 1;
            Ok(player)
        })
    }
}
