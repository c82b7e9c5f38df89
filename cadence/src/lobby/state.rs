use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use super::{ArenaPlayer, LobbyStatus, PlayerMap};

/// The lobby phase as seen by this client. `Idle` means not in a lobby.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    #[default]
    Idle,
    Waiting,
    Countdown,
    Racing,
    Finished,
}

impl From<LobbyStatus> for MatchStatus {
    fn from(status: LobbyStatus) -> Self {
        match status {
            LobbyStatus::Waiting => Self::Waiting,
            LobbyStatus::Countdown => Self::Countdown,
            LobbyStatus::Racing => Self::Racing,
            LobbyStatus::Finished => Self::Finished,
        }
    }
}

/// Local view of the lobby this client is in
#[derive(Debug, Default, Clone)]
pub struct MultiplayerState {
    lobby_id: Option<String>,
    is_host: bool,
    match_status: MatchStatus,
    players: PlayerMap,
}

impl MultiplayerState {
    /// Enter a lobby, starting from an empty player set
    pub fn set_lobby(&mut self, id: impl Into<String>, is_host: bool) {
        self.lobby_id = Some(id.into());
        self.is_host = is_host;
        self.match_status = MatchStatus::Waiting;
        self.players.replace(BTreeMap::new());
    }

    pub fn leave_lobby(&mut self) {
        self.lobby_id = None;
        self.is_host = false;
        self.match_status = MatchStatus::Idle;
        self.players.replace(BTreeMap::new());
    }

    /// Returns true if the status changed
    pub fn update_match_status(&mut self, status: MatchStatus) -> bool {
        let changed = self.match_status != status;
        self.match_status = status;
        changed
    }

    /// Apply `change` to a known player
    pub fn update_player(&mut self, uid: &str, change: impl FnOnce(&mut ArenaPlayer)) -> bool {
        self.players.update(uid, change)
    }

    pub fn upsert_player(&mut self, player: ArenaPlayer) -> bool {
        self.players.upsert(player)
    }

    pub fn set_players(&mut self, players: BTreeMap<String, ArenaPlayer>) -> bool {
        self.players.replace(players)
    }

    pub fn lobby_id(&self) -> Option<&str> {
        self.lobby_id.as_deref()
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn match_status(&self) -> MatchStatus {
        self.match_status
    }

    pub fn players(&self) -> &PlayerMap {
        &self.players
    }

    pub fn get_self(&self, uid: &str) -> Option<&ArenaPlayer> {
        self.players.get(uid)
    }

    pub fn get_opponents(&self, uid: &str) -> Vec<&ArenaPlayer> {
        self.players.iter().filter(|player| player.uid != uid).collect()
    }
}
