use std::{collections::BTreeMap, rc::Rc};

use super::ArenaPlayer;

/// Players keyed by uid, copy-on-write.
///
/// Clones are cheap snapshots. Every effective change bumps [PlayerMap::version]; writes that
/// leave the map as it was do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerMap {
    version: u64,
    players: Rc<BTreeMap<String, ArenaPlayer>>,
}

impl PlayerMap {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, uid: &str) -> Option<&ArenaPlayer> {
        self.players.get(uid)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArenaPlayer> {
        self.players.values()
    }

    /// Insert or replace a player
    pub fn upsert(&mut self, player: ArenaPlayer) -> bool {
        if self.players.get(&player.uid) == Some(&player) {
            return false;
        }
        Rc::make_mut(&mut self.players).insert(player.uid.clone(), player);
        self.version += 1;
        true
    }

    /// Apply `change` to an existing player
    pub fn update(&mut self, uid: &str, change: impl FnOnce(&mut ArenaPlayer)) -> bool {
        let Some(existing) = self.players.get(uid) else {
            return false;
        };

        let mut player = existing.clone();
        change(&mut player);
        self.upsert(player)
    }

    pub fn remove(&mut self, uid: &str) -> Option<ArenaPlayer> {
        if !self.players.contains_key(uid) {
            return None;
        }
        self.version += 1;
        Rc::make_mut(&mut self.players).remove(uid)
    }

    /// Replace every player at once
    pub fn replace(&mut self, players: BTreeMap<String, ArenaPlayer>) -> bool {
        if *self.players == players {
            return false;
        }
        self.players = Rc::new(players);
        self.version += 1;
        true
    }
}
