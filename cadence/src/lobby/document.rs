use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::Timestamp;

/// Lobby phase, written by the host only. Moves forward within a race, back to
/// [LobbyStatus::Waiting] on restart.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyStatus {
    Waiting,
    Countdown,
    Racing,
    Finished,
}

/// Player phase within one race. Only ever moves forward until the race restarts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Joining,
    Ready,
    Racing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaPlayer {
    pub uid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub status: PlayerStatus,
    /// 0 - 100
    pub progress: u8,
    pub wpm: u32,
    /// Finishing position, only set once finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl ArenaPlayer {
    pub fn joining(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            avatar: None,
            status: PlayerStatus::Joining,
            progress: 0,
            wpm: 0,
            rank: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == PlayerStatus::Finished
    }

    /// Finished with a position. A failed session finishes without one.
    pub fn is_placed(&self) -> bool {
        self.is_finished() && self.rank.is_some()
    }

    /// Fold a possibly older copy of this entry over it, within one race.
    ///
    /// Status and progress keep their furthest value and a recorded rank is never dropped.
    /// Everything else comes from `incoming`, except the speed of a copy that is behind.
    pub fn merged(&self, incoming: &ArenaPlayer) -> ArenaPlayer {
        let behind = incoming.status < self.status || incoming.progress < self.progress;
        ArenaPlayer {
            status: self.status.max(incoming.status),
            progress: self.progress.max(incoming.progress),
            wpm: if behind { self.wpm } else { incoming.wpm },
            rank: self.rank.or(incoming.rank),
            ..incoming.clone()
        }
    }
}

/// The shared lobby document at `lobbies/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyDocument {
    pub id: String,
    pub host_id: String,
    pub status: LobbyStatus,
    pub text_id: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub players: BTreeMap<String, ArenaPlayer>,
}
