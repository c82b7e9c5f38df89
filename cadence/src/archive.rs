//! Session history and leaderboard persistence.
//!
//! Signed-in users get their sessions saved to `users/{uid}/sessions` and their leaderboard
//! entry upserted. Without an identity, or when the remote store rejects the session, sessions
//! go to a capped local list instead, newest first. Once the session itself is stored remotely,
//! a failed leaderboard upsert is only logged, so no session is ever kept in both places.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, StoreError};
use crate::session::{SessionType, TypingSession};
use crate::store::{self, AuthProvider, DocumentStore, Identity, LocalCache};
use crate::{Timestamp, analytics};

pub const LEADERBOARD: &str = "leaderboard";
pub const HISTORY_KEY: &str = "history";

fn sessions_collection(uid: &str) -> String {
    format!("users/{uid}/sessions")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub wpm: u32,
    pub accuracy: f64,
    pub error_count: usize,
    pub consistency: f64,
    pub weakest_keys: Vec<char>,
    /// Milliseconds since the unix epoch
    pub timestamp: Timestamp,
    pub mode: SessionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_race: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_winner: Option<bool>,
}

impl SessionRecord {
    pub fn from_session(session: &TypingSession, timestamp: Timestamp) -> Self {
        Self {
            wpm: session.wpm(),
            accuracy: session.accuracy(),
            error_count: session.error_count(),
            consistency: session.consistency(),
            weakest_keys: analytics::weakest_keys(session.keystrokes()),
            timestamp,
            mode: session.session_type(),
            lesson_id: session.lesson_id().map(str::to_string),
            is_race: session.is_race().then_some(true),
            is_winner: None,
        }
    }

    pub fn with_winner(mut self, is_winner: bool) -> Self {
        self.is_winner = Some(is_winner);
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaderboardRecord {
    pub highest_wpm: u32,
    pub last_wpm: u32,
    pub total_races: u64,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl LeaderboardRecord {
    /// This record after `session` was saved by `identity`
    pub fn updated(mut self, identity: &Identity, session: &SessionRecord) -> Self {
        self.highest_wpm = self.highest_wpm.max(session.wpm);
        self.last_wpm = session.wpm;
        if session.is_race == Some(true) {
            self.total_races += 1;
        }
        self.display_name = identity.display_name.clone();
        self.photo_url = identity.photo_url.clone();
        self
    }
}

/// Where a session ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Archived {
    Remote(String),
    Local,
    /// Neither store accepted it
    Dropped,
}

#[derive(Debug, Clone)]
pub struct SessionArchive {
    documents: Rc<dyn DocumentStore>,
    auth: Rc<dyn AuthProvider>,
    cache: Rc<dyn LocalCache>,
    history_limit: usize,
}

impl SessionArchive {
    pub fn new(
        documents: Rc<dyn DocumentStore>,
        auth: Rc<dyn AuthProvider>,
        cache: Rc<dyn LocalCache>,
        history_limit: usize,
    ) -> Self {
        Self {
            documents,
            auth,
            cache,
            history_limit,
        }
    }

    pub fn save(&self, record: SessionRecord) -> Archived {
        if let Some(identity) = self.auth.current_user() {
            match self.save_remote(&identity, &record) {
                Ok(id) => return Archived::Remote(id),
                Err(error) => warn!(%error, uid = %identity.uid, "remote save failed, keeping session locally"),
            }
        }

        match self.save_local(record) {
            Ok(()) => Archived::Local,
            Err(error) => {
                warn!(%error, "failed to save session locally");
                Archived::Dropped
            }
        }
    }

    fn save_remote(&self, identity: &Identity, record: &SessionRecord) -> Result<String, StoreError> {
        let id = self
            .documents
            .add(&sessions_collection(&identity.uid), store::encode(record)?)?;
        debug!(uid = %identity.uid, %id, "session archived");

        if let Err(error) = self.update_leaderboard(identity, record) {
            warn!(%error, uid = %identity.uid, "failed to update leaderboard entry");
        }
        Ok(id)
    }

    fn update_leaderboard(
        &self,
        identity: &Identity,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        let leaderboard = match self.documents.get(LEADERBOARD, &identity.uid)? {
            Some(existing) => store::decode::<LeaderboardRecord>(existing)?,
            None => LeaderboardRecord::default(),
        }
        .updated(identity, record);
        self.documents
            .set(LEADERBOARD, &identity.uid, store::encode(&leaderboard)?)
    }

    fn save_local(&self, record: SessionRecord) -> Result<(), CacheError> {
        let mut history = self.local_history();
        history.insert(0, record);
        history.truncate(self.history_limit);
        store::save(self.cache.as_ref(), HISTORY_KEY, &history)
    }

    /// Device-local sessions, newest first
    pub fn local_history(&self) -> Vec<SessionRecord> {
        store::load(self.cache.as_ref(), HISTORY_KEY)
            .unwrap_or_else(|error| {
                warn!(%error, "discarding unreadable local history");
                None
            })
            .unwrap_or_default()
    }

    /// The signed-in user's sessions, newest first, or the local ones without an identity
    pub fn history(&self) -> Vec<SessionRecord> {
        let Some(identity) = self.auth.current_user() else {
            return self.local_history();
        };

        let remote = self
            .documents
            .list(&sessions_collection(&identity.uid))
            .and_then(|documents| {
                documents
                    .into_iter()
                    .map(|(_, document)| store::decode::<SessionRecord>(document))
                    .collect::<Result<Vec<_>, _>>()
            });

        match remote {
            Ok(mut sessions) => {
                sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                sessions
            }
            Err(error) => {
                warn!(%error, "failed to list remote sessions, showing local history");
                self.local_history()
            }
        }
    }

    pub fn leaderboard_entry(&self, uid: &str) -> Option<LeaderboardRecord> {
        self.documents
            .get(LEADERBOARD, uid)
            .and_then(|document| document.map(store::decode).transpose())
            .unwrap_or_else(|error| {
                warn!(%error, uid, "failed to read leaderboard entry");
                None
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::store::{MemoryCache, MemoryDocumentStore, StaticAuth, Subscription};

    /// Accepts sessions but rejects every leaderboard call
    #[derive(Debug)]
    struct NoLeaderboard(MemoryDocumentStore);

    impl NoLeaderboard {
        fn check(collection: &str) -> Result<(), StoreError> {
            if collection == LEADERBOARD {
                Err(StoreError::Rejected {
                    path: collection.to_string(),
                    reason: "permission denied".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl DocumentStore for NoLeaderboard {
        fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
            Self::check(collection)?;
            self.0.get(collection, id)
        }

        fn set(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
            Self::check(collection)?;
            self.0.set(collection, id, value)
        }

        fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
            Self::check(collection)?;
            self.0.update(collection, id, fields)
        }

        fn add(&self, collection: &str, value: Value) -> Result<String, StoreError> {
            Self::check(collection)?;
            self.0.add(collection, value)
        }

        fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
            Self::check(collection)?;
            self.0.list(collection)
        }

        fn subscribe(
            &self,
            collection: &str,
            id: &str,
        ) -> Result<Subscription<Option<Value>>, StoreError> {
            Self::check(collection)?;
            self.0.subscribe(collection, id)
        }
    }

    struct Fixture {
        documents: MemoryDocumentStore,
        auth: StaticAuth,
        archive: SessionArchive,
    }

    fn fixture(limit: usize) -> Fixture {
        let documents = MemoryDocumentStore::new();
        let auth = StaticAuth::new();
        let archive = SessionArchive::new(
            Rc::new(documents.clone()),
            Rc::new(auth.clone()),
            Rc::new(MemoryCache::new()),
            limit,
        );
        Fixture {
            documents,
            auth,
            archive,
        }
    }

    fn record(wpm: u32, timestamp: Timestamp, is_race: bool) -> SessionRecord {
        SessionRecord {
            wpm,
            accuracy: 97.5,
            error_count: 2,
            consistency: 0.2,
            weakest_keys: vec!['q'],
            timestamp,
            mode: SessionType::Practice,
            lesson_id: None,
            is_race: is_race.then_some(true),
            is_winner: None,
        }
    }

    #[test]
    fn local_history_is_capped_newest_first() {
        let Fixture { archive, .. } = fixture(3);
        for i in 0..5 {
            assert_eq!(archive.save(record(40 + i, u64::from(i), false)), Archived::Local);
        }

        let history: Vec<_> = archive.history().iter().map(|r| r.timestamp).collect();
        assert_eq!(history, vec![4, 3, 2]);
    }

    #[test]
    fn leaderboard_keeps_the_max() {
        let Fixture { auth, archive, .. } = fixture(50);
        auth.sign_in(Identity::new("u1", "Ada"));

        archive.save(record(80, 1, true));
        archive.save(record(60, 2, false));
        archive.save(record(70, 3, true));

        let entry = archive.leaderboard_entry("u1").unwrap();
        assert_eq!(entry.highest_wpm, 80);
        assert_eq!(entry.last_wpm, 70);
        assert_eq!(entry.total_races, 2);
        assert_eq!(entry.display_name, "Ada");

        let history: Vec<_> = archive.history().iter().map(|r| r.timestamp).collect();
        assert_eq!(history, vec![3, 2, 1]);
        assert!(archive.local_history().is_empty());
    }

    #[test]
    fn remote_failure_falls_back_to_local() {
        let Fixture {
            documents,
            auth,
            archive,
        } = fixture(50);
        auth.sign_in(Identity::new("u1", "Ada"));
        documents.set_offline(true);

        assert_eq!(archive.save(record(50, 1, false)), Archived::Local);
        assert_eq!(archive.history().len(), 1);
    }

    #[test]
    fn leaderboard_failure_keeps_the_remote_session() {
        let documents = MemoryDocumentStore::new();
        let auth = StaticAuth::new();
        let archive = SessionArchive::new(
            Rc::new(NoLeaderboard(documents.clone())),
            Rc::new(auth.clone()),
            Rc::new(MemoryCache::new()),
            50,
        );
        auth.sign_in(Identity::new("u1", "Ada"));

        assert!(matches!(archive.save(record(50, 1, true)), Archived::Remote(_)));
        assert_eq!(documents.list("users/u1/sessions").unwrap().len(), 1);
        assert!(archive.local_history().is_empty());
        assert_eq!(archive.history().len(), 1);
        assert_eq!(archive.leaderboard_entry("u1"), None);
    }

    #[test]
    fn records_use_camel_case_on_the_wire() {
        let json = serde_json::to_value(record(50, 1, true).with_winner(true)).unwrap();
        assert_eq!(json["errorCount"], 2);
        assert_eq!(json["weakestKeys"][0], "q");
        assert_eq!(json["mode"], "practice");
        assert_eq!(json["isWinner"], true);
        assert!(json.get("lessonId").is_none());
    }
}
