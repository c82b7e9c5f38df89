//! # Lobby Module - Multiplayer race protocol
//!
//! Clients coordinate a race through one shared document at `lobbies/{id}` in a
//! [RealtimeStore]. Nobody owns the whole document:
//!
//! - the host writes the lobby-level `status` and `textId`
//! - every player writes only its own `players/{uid}` subtree
//!
//! ## Lifecycle
//!
#![doc = simple_mermaid::mermaid!("../diagrams/lobby_lifecycle.mmd")]
//!
//! ## Consistency
//!
//! Snapshots arrive through a subscription and are applied by [LobbyClient::pump]. Applying the
//! same snapshot twice changes nothing, and a stale echo of this client's own earlier write
//! never rolls back its local progress or status. Within a race, peer entries are merged with
//! [ArenaPlayer::merged], so a delayed older snapshot cannot move a peer backwards either. Only
//! a restart or a peer removing itself does.
//!
//! Progress is written at most once per [Configuration::lobby_sync_interval_ms]. The finish
//! update bypasses the throttle and is written once: its rank counts the opponents this client
//! had already seen finish with a rank, and rank 1 wins. Two players finishing together may both
//! win, as there is no global order. A failed session is published as finished without a rank
//! and never wins.
//!
//! Transport failures during a race are logged and absorbed. The client keeps typing on local
//! state and retries pending writes on the next [LobbyClient::tick].

mod countdown;
mod document;
mod players;
mod state;

pub use countdown::Countdown;
pub use document::{ArenaPlayer, LobbyDocument, LobbyStatus, PlayerStatus};
pub use players::PlayerMap;
pub use state::{MatchStatus, MultiplayerState};

use std::{collections::BTreeMap, rc::Rc};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::LobbyError;
use crate::realtime::RealtimeStore;
use crate::session::{SessionStatus, TypingSession};
use crate::store::{self, Identity, Subscription};
use crate::Timestamp;

const LOBBY_CODE_LEN: usize = 6;

fn lobby_path(id: &str) -> String {
    format!("lobbies/{id}")
}

fn player_path(id: &str, uid: &str) -> String {
    format!("lobbies/{id}/players/{uid}")
}

/// A fresh, human-typeable lobby id
pub fn generate_lobby_code() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(LOBBY_CODE_LEN)
        .collect::<String>()
        .to_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceOutcome {
    pub rank: u32,
    pub winner: bool,
}

/// Something this client observed, returned from [LobbyClient::pump]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    StatusChanged(LobbyStatus),
    TextChanged(String),
    PlayersChanged,
    /// This client's own finish was recorded
    RaceFinished(RaceOutcome),
    /// This client's session failed, it is done without a placing
    RaceFailed,
    /// The lobby document disappeared
    Closed,
}

/// Everything tied to one lobby, dropped as a whole on leave
#[derive(Debug)]
struct Membership {
    lobby_path: String,
    player_path: String,
    subscription: Subscription<Option<Value>>,
    last_document: Option<LobbyDocument>,
    /// Authoritative copy of this client's own player entry
    own: ArenaPlayer,
    last_sync: Option<Timestamp>,
    dirty: bool,
    /// The entry vanished remotely, presence cleanup has to be registered again
    presence_lost: bool,
    /// The finish was written. Later writes only restore an entry lost to presence cleanup.
    finish_sent: bool,
    countdown: Option<Countdown>,
    /// Host only: the RACING write owed once the countdown ends
    racing_due: bool,
}

impl Membership {
    fn push_own(&mut self, transport: &dyn RealtimeStore, now: Timestamp) -> bool {
        let rearm = if self.presence_lost {
            transport.on_disconnect_remove(&self.player_path)
        } else {
            Ok(())
        };
        let result = rearm
            .and_then(|()| store::encode(&self.own))
            .and_then(|player| transport.set(&self.player_path, player));

        match result {
            Ok(()) => {
                self.last_sync = Some(now);
                self.dirty = false;
                self.presence_lost = false;
                true
            }
            Err(error) => {
                warn!(%error, path = %self.player_path, "failed to write player state");
                self.dirty = true;
                false
            }
        }
    }

    fn throttled(&self, now: Timestamp, interval_ms: u64) -> bool {
        self.last_sync
            .is_some_and(|last| now.saturating_sub(last) < interval_ms)
    }

    /// A new race instance in the same lobby
    fn restart_own(&mut self) {
        self.own.status = self.own.status.min(PlayerStatus::Ready);
        self.own.progress = 0;
        self.own.wpm = 0;
        self.own.rank = None;
        self.finish_sent = false;
        self.dirty = true;
        self.countdown = None;
        self.racing_due = false;
    }
}

/// One client's side of the lobby protocol
#[derive(Debug)]
pub struct LobbyClient {
    transport: Rc<dyn RealtimeStore>,
    identity: Identity,
    config: Configuration,
    state: MultiplayerState,
    membership: Option<Membership>,
    events: Vec<LobbyEvent>,
}

impl LobbyClient {
    pub fn new(transport: Rc<dyn RealtimeStore>, identity: Identity, config: Configuration) -> Self {
        Self {
            transport,
            identity,
            config,
            state: MultiplayerState::default(),
            membership: None,
            events: Vec::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> &MultiplayerState {
        &self.state
    }

    pub fn lobby_id(&self) -> Option<&str> {
        self.state.lobby_id()
    }

    pub fn is_host(&self) -> bool {
        self.state.is_host()
    }

    pub fn match_status(&self) -> MatchStatus {
        self.state.match_status()
    }

    /// The text the lobby races on, once observed
    pub fn text_id(&self) -> Option<&str> {
        self.membership
            .as_ref()
            .and_then(|membership| membership.last_document.as_ref())
            .map(|document| document.text_id.as_str())
    }

    pub fn own_player(&self) -> Option<&ArenaPlayer> {
        self.membership.as_ref().map(|membership| &membership.own)
    }

    pub fn opponents(&self) -> Vec<&ArenaPlayer> {
        self.state.get_opponents(&self.identity.uid)
    }

    /// Whole seconds left on the local countdown
    pub fn countdown_remaining(&self, now: Timestamp) -> Option<u64> {
        self.membership
            .as_ref()
            .and_then(|membership| membership.countdown)
            .map(|countdown| countdown.remaining_secs(now))
    }

    /// Create a lobby racing on `text_id` and join it as host. Returns the lobby id.
    pub fn host(&mut self, text_id: &str, now: Timestamp) -> Result<String, LobbyError> {
        let lobby_id = generate_lobby_code();
        self.enter(&lobby_id, Some(text_id), now)?;
        Ok(lobby_id)
    }

    /// Join an existing lobby
    pub fn join(&mut self, lobby_id: &str, now: Timestamp) -> Result<(), LobbyError> {
        self.enter(lobby_id, None, now)
    }

    fn enter(
        &mut self,
        lobby_id: &str,
        host_text: Option<&str>,
        now: Timestamp,
    ) -> Result<(), LobbyError> {
        self.leave();

        let player_path = player_path(lobby_id, &self.identity.uid);

        // Presence before any other write, so a crash from here on converges
        self.transport.on_disconnect_remove(&player_path)?;

        match self.try_enter(lobby_id, &player_path, host_text, now) {
            Ok((membership, is_host)) => {
                info!(lobby = lobby_id, is_host, "entered lobby");
                self.state.set_lobby(lobby_id, is_host);
                self.state.upsert_player(membership.own.clone());
                self.membership = Some(membership);
                Ok(())
            }
            Err(error) => {
                warn!(%error, lobby = lobby_id, "failed to enter lobby");
                if let Err(error) = self.transport.cancel_on_disconnect(&player_path) {
                    debug!(%error, "could not cancel presence cleanup");
                }
                Err(error)
            }
        }
    }

    fn try_enter(
        &self,
        lobby_id: &str,
        player_path: &str,
        host_text: Option<&str>,
        now: Timestamp,
    ) -> Result<(Membership, bool), LobbyError> {
        let lobby_path = lobby_path(lobby_id);

        if let Some(text_id) = host_text {
            let document = LobbyDocument {
                id: lobby_id.to_string(),
                host_id: self.identity.uid.clone(),
                status: LobbyStatus::Waiting,
                text_id: text_id.to_string(),
                created_at: now,
                players: BTreeMap::new(),
            };
            // Rejoining an existing lobby must not reset it
            if !self
                .transport
                .set_if_absent(&lobby_path, store::encode(&document)?)?
            {
                debug!(lobby = lobby_id, "lobby already exists, rejoining");
            }
        }

        let existing = self
            .transport
            .get(&lobby_path)?
            .ok_or_else(|| LobbyError::NotFound(lobby_id.to_string()))?;
        let document: LobbyDocument = store::decode(existing)?;

        let mut own = ArenaPlayer::joining(&self.identity.uid, &self.identity.display_name);
        own.avatar = self.identity.photo_url.clone();
        self.transport.set(player_path, store::encode(&own)?)?;

        let subscription = self.transport.subscribe(&lobby_path)?;

        let membership = Membership {
            lobby_path,
            player_path: player_path.to_string(),
            subscription,
            last_document: None,
            own,
            last_sync: Some(now),
            dirty: false,
            presence_lost: false,
            finish_sent: false,
            countdown: None,
            racing_due: false,
        };
        Ok((membership, document.host_id == self.identity.uid))
    }

    /// Leave gracefully: cancel the presence cleanup, then remove our own entry
    pub fn leave(&mut self) {
        let Some(membership) = self.membership.take() else {
            return;
        };

        if let Err(error) = self.transport.cancel_on_disconnect(&membership.player_path) {
            warn!(%error, "failed to cancel presence cleanup");
        }
        if let Err(error) = self.transport.remove(&membership.player_path) {
            warn!(%error, "failed to remove player entry");
        }

        info!(lobby = ?self.state.lobby_id(), "left lobby");
        self.state.leave_lobby();
        self.events.clear();
    }

    pub fn mark_ready(&mut self, now: Timestamp) -> Result<(), LobbyError> {
        let membership = self.membership.as_mut().ok_or(LobbyError::NotInLobby)?;
        if membership.own.status >= PlayerStatus::Ready {
            return Ok(());
        }

        membership.own.status = PlayerStatus::Ready;
        membership.push_own(self.transport.as_ref(), now);
        self.state.upsert_player(membership.own.clone());
        Ok(())
    }

    /// Publish this client's race progress.
    ///
    /// Returns whether a write went out. Progress never moves backwards within a race.
    pub fn sync_progress(
        &mut self,
        progress: u8,
        wpm: u32,
        session_status: SessionStatus,
        now: Timestamp,
    ) -> Result<bool, LobbyError> {
        let membership = self.membership.as_mut().ok_or(LobbyError::NotInLobby)?;
        if membership.finish_sent {
            return Ok(false);
        }

        let finished = session_status.is_terminal();
        let placed = session_status == SessionStatus::Finished;
        let status = match session_status {
            _ if finished => PlayerStatus::Finished,
            SessionStatus::Running => PlayerStatus::Racing,
            _ => PlayerStatus::Ready,
        };

        let before = membership.own.clone();
        let own = &mut membership.own;
        own.status = own.status.max(status);
        own.progress = own.progress.max(progress.min(100));
        own.wpm = wpm;

        if placed && own.rank.is_none() {
            let placed_opponents = self
                .state
                .get_opponents(&self.identity.uid)
                .into_iter()
                .filter(|player| player.is_placed())
                .count() as u32;
            own.rank = Some(placed_opponents + 1);
        }

        membership.dirty |= membership.own != before;
        if !membership.dirty {
            return Ok(false);
        }

        if finished {
            return Ok(self.send_finish(now));
        }

        if membership.throttled(now, self.config.lobby_sync_interval_ms) {
            return Ok(false);
        }

        let sent = membership.push_own(self.transport.as_ref(), now);
        self.state.upsert_player(membership.own.clone());
        Ok(sent)
    }

    /// [LobbyClient::sync_progress] from a live session
    pub fn sync_session(
        &mut self,
        session: &TypingSession,
        now: Timestamp,
    ) -> Result<bool, LobbyError> {
        self.sync_progress(session.progress(), session.wpm(), session.status(), now)
    }

    fn send_finish(&mut self, now: Timestamp) -> bool {
        let Some(membership) = self.membership.as_mut() else {
            return false;
        };

        let sent = membership.push_own(self.transport.as_ref(), now);
        self.state.upsert_player(membership.own.clone());
        if sent {
            membership.finish_sent = true;
            match membership.own.rank {
                Some(rank) => {
                    let outcome = RaceOutcome {
                        rank,
                        winner: rank == 1,
                    };
                    info!(rank, winner = outcome.winner, "finished race");
                    self.events.push(LobbyEvent::RaceFinished(outcome));
                }
                None => {
                    info!("race session failed");
                    self.events.push(LobbyEvent::RaceFailed);
                }
            }
        }
        sent
    }

    /// Timer work: flush throttled progress, and as host end the countdown
    pub fn tick(&mut self, now: Timestamp) {
        let Some(membership) = self.membership.as_mut() else {
            return;
        };

        if membership.dirty {
            if membership.finish_sent {
                // Restores the finished entry once, no second finish event
                membership.push_own(self.transport.as_ref(), now);
                self.state.upsert_player(membership.own.clone());
            } else if membership.own.is_finished() {
                self.send_finish(now);
            } else if !membership.throttled(now, self.config.lobby_sync_interval_ms) {
                membership.push_own(self.transport.as_ref(), now);
                self.state.upsert_player(membership.own.clone());
            }
        }

        let Some(membership) = self.membership.as_mut() else {
            return;
        };
        let countdown_over = membership
            .countdown
            .is_some_and(|countdown| countdown.is_elapsed(now));

        if membership.racing_due && countdown_over {
            match self
                .transport
                .update(&membership.lobby_path, json!({ "status": LobbyStatus::Racing }))
            {
                Ok(()) => {
                    debug!("countdown over, race started");
                    membership.racing_due = false;
                }
                Err(error) => warn!(%error, "failed to start race"),
            }
        }
    }

    fn host_membership(&mut self) -> Result<&mut Membership, LobbyError> {
        if !self.state.is_host() {
            return Err(LobbyError::NotHost);
        }
        self.membership.as_mut().ok_or(LobbyError::NotInLobby)
    }

    /// Host: announce the countdown. RACING follows from [LobbyClient::tick].
    pub fn start_countdown(&mut self, now: Timestamp) -> Result<(), LobbyError> {
        let countdown_ms = self.config.countdown_ms;
        let waiting = self.state.match_status() == MatchStatus::Waiting;
        let transport = self.transport.clone();
        let membership = self.host_membership()?;
        if !waiting {
            return Ok(());
        }

        transport.update(
            &membership.lobby_path,
            json!({ "status": LobbyStatus::Countdown }),
        )?;
        membership.countdown = Some(Countdown::new(now, countdown_ms));
        membership.racing_due = true;
        Ok(())
    }

    /// Host: switch the lobby to a different text
    pub fn set_text(&mut self, text_id: &str) -> Result<(), LobbyError> {
        let transport = self.transport.clone();
        let membership = self.host_membership()?;
        transport.update(&membership.lobby_path, json!({ "textId": text_id }))?;
        Ok(())
    }

    /// Host: back to WAITING for another race. Players reset themselves on observing it.
    pub fn restart(&mut self) -> Result<(), LobbyError> {
        let transport = self.transport.clone();
        let membership = self.host_membership()?;
        transport.update(
            &membership.lobby_path,
            json!({ "status": LobbyStatus::Waiting }),
        )?;
        membership.countdown = None;
        membership.racing_due = false;
        Ok(())
    }

    /// Apply every queued lobby snapshot and return what changed since the last call
    pub fn pump(&mut self, now: Timestamp) -> Vec<LobbyEvent> {
        let snapshots = match &self.membership {
            Some(membership) => membership.subscription.drain(),
            None => Vec::new(),
        };

        for snapshot in snapshots {
            if self.membership.is_none() {
                break;
            }
            self.apply(snapshot, now);
        }

        self.finish_lobby_if_done();
        std::mem::take(&mut self.events)
    }

    fn apply(&mut self, snapshot: Option<Value>, now: Timestamp) {
        let Some(value) = snapshot else {
            self.close();
            return;
        };

        let mut document: LobbyDocument = match store::decode(value) {
            Ok(document) => document,
            Err(error) => {
                warn!(%error, "ignoring malformed lobby snapshot");
                return;
            }
        };

        let Self {
            membership: Some(membership),
            state,
            events,
            config,
            identity,
            ..
        } = self
        else {
            return;
        };

        // Only a restart moves the lobby backwards
        if let Some(current) = membership.last_document.as_ref().map(|last| last.status)
            && document.status != LobbyStatus::Waiting
            && document.status < current
        {
            debug!(stale = %document.status, %current, "ignoring stale lobby status");
            document.status = current;
        }

        if membership.last_document.as_ref() == Some(&document) {
            return;
        }
        let previous = membership.last_document.replace(document.clone());
        let previous_status = previous.as_ref().map(|previous| previous.status);

        if previous_status != Some(document.status) {
            debug!(status = %document.status, "lobby status changed");
            state.update_match_status(document.status.into());
            events.push(LobbyEvent::StatusChanged(document.status));

            match document.status {
                LobbyStatus::Countdown => {
                    if membership.countdown.is_none() {
                        membership.countdown = Some(Countdown::new(now, config.countdown_ms));
                    }
                }
                LobbyStatus::Racing | LobbyStatus::Finished => membership.countdown = None,
                LobbyStatus::Waiting => {
                    if previous_status.is_some() {
                        membership.restart_own();
                    }
                }
            }
        }

        if previous.as_ref().map(|previous| &previous.text_id) != Some(&document.text_id) {
            events.push(LobbyEvent::TextChanged(document.text_id.clone()));
        }

        let mut players = document.players;
        if document.status != LobbyStatus::Waiting {
            for (uid, incoming) in players.iter_mut() {
                if let Some(known) = state.players().get(uid) {
                    *incoming = known.merged(incoming);
                }
            }
        }

        // Local copy wins over any echo of an earlier write, and is re-asserted on the next tick
        match players.insert(identity.uid.clone(), membership.own.clone()) {
            None => {
                membership.dirty = true;
                membership.presence_lost = true;
            }
            Some(_) if membership.finish_sent => {}
            Some(echo) => membership.dirty = echo != membership.own,
        }

        if state.set_players(players) {
            events.push(LobbyEvent::PlayersChanged);
        }
    }

    /// The host closes the race once everybody finished
    fn finish_lobby_if_done(&mut self) {
        if !self.state.is_host() || self.state.match_status() != MatchStatus::Racing {
            return;
        }
        let players = self.state.players();
        if players.is_empty() || !players.iter().all(ArenaPlayer::is_finished) {
            return;
        }

        let Some(membership) = &self.membership else {
            return;
        };
        if let Err(error) = self.transport.update(
            &membership.lobby_path,
            json!({ "status": LobbyStatus::Finished }),
        ) {
            warn!(%error, "failed to close race");
        }
    }

    fn close(&mut self) {
        let Some(membership) = self.membership.take() else {
            return;
        };
        info!(lobby = ?self.state.lobby_id(), "lobby closed");

        if let Err(error) = self.transport.cancel_on_disconnect(&membership.player_path) {
            debug!(%error, "could not cancel presence cleanup");
        }
        self.state.leave_lobby();
        self.events.push(LobbyEvent::Closed);
    }
}

impl Drop for LobbyClient {
    fn drop(&mut self) {
        self.leave();
    }
}
