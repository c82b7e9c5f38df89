//! Cross-device reconciliation of the [ProgressLedger].
//!
//! When an identity appears, the remote copy at `users/{uid}/progress/main` is adopted through
//! [ProgressLedger::hydrate]. If there is none, the local ledger is authoritative and pushed.
//! After that, local changes are pushed whenever XP or the badge count moved. This is last write
//! wins: two devices writing at once can lose an update.

use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::ledger::{ProgressLedger, ProgressRecord};
use crate::store::{self, AuthProvider, DocumentStore, Identity, Subscription};

pub const PROGRESS_ID: &str = "main";

fn progress_collection(uid: &str) -> String {
    format!("users/{uid}/progress")
}

/// Cheap fingerprint of what is worth pushing
fn fingerprint(ledger: &ProgressLedger) -> (u64, usize) {
    let progress = ledger.progress();
    (progress.xp(), progress.badges().len())
}

#[derive(Debug)]
pub struct ProgressSync {
    documents: Rc<dyn DocumentStore>,
    auth_changes: Subscription<Option<Identity>>,
    identity: Option<Identity>,
    last_pushed: Option<(u64, usize)>,
}

impl ProgressSync {
    pub fn new(documents: Rc<dyn DocumentStore>, auth: &dyn AuthProvider) -> Self {
        Self {
            documents,
            auth_changes: auth.subscribe(),
            identity: None,
            last_pushed: None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Apply queued sign-in/sign-out changes. Returns true if `ledger` was hydrated.
    pub fn pump(&mut self, ledger: &mut ProgressLedger) -> bool {
        let Some(identity) = self.auth_changes.latest() else {
            return false;
        };

        if identity.as_ref().map(|i| &i.uid) == self.identity.as_ref().map(|i| &i.uid) {
            return false;
        }

        self.last_pushed = None;
        self.identity = identity;

        match self.identity.clone() {
            Some(identity) => self.reconcile(&identity, ledger),
            None => {
                debug!("signed out, progress sync paused");
                false
            }
        }
    }

    fn reconcile(&mut self, identity: &Identity, ledger: &mut ProgressLedger) -> bool {
        let remote = self
            .documents
            .get(&progress_collection(&identity.uid), PROGRESS_ID)
            .and_then(|document| document.map(store::decode::<ProgressRecord>).transpose());

        match remote {
            Ok(Some(record)) => {
                self.last_pushed = Some((record.xp, record.badges.len()));
                ledger.hydrate(record);
                // Merged badges may exceed what the remote has
                self.push_if_changed(ledger);
                true
            }
            Ok(None) => {
                info!(uid = %identity.uid, "no remote progress, pushing local ledger");
                self.push_if_changed(ledger);
                false
            }
            Err(error) => {
                warn!(%error, uid = %identity.uid, "failed to fetch remote progress, keeping local");
                false
            }
        }
    }

    /// Push `ledger` if XP or the badge count changed since the last push.
    /// Returns true when a write went out.
    pub fn push_if_changed(&mut self, ledger: &ProgressLedger) -> bool {
        let Some(identity) = &self.identity else {
            return false;
        };

        let current = fingerprint(ledger);
        if self.last_pushed == Some(current) {
            return false;
        }

        match self.push(&identity.uid, &ledger.to_record()) {
            Ok(()) => {
                debug!(xp = current.0, badges = current.1, "progress pushed");
                self.last_pushed = Some(current);
                true
            }
            Err(error) => {
                warn!(%error, "failed to push progress");
                false
            }
        }
    }

    fn push(&self, uid: &str, record: &ProgressRecord) -> Result<(), StoreError> {
        self.documents
            .set(&progress_collection(uid), PROGRESS_ID, store::encode(record)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::gamification::SessionStats;
    use crate::store::{MemoryDocumentStore, StaticAuth};

    fn session(ledger: &mut ProgressLedger, wpm: u32) {
        let now = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        ledger.add_session(
            &SessionStats {
                wpm,
                accuracy: 90.0,
                ..Default::default()
            },
            now,
        );
    }

    fn remote(documents: &MemoryDocumentStore, uid: &str) -> Option<ProgressRecord> {
        documents
            .get(&progress_collection(uid), PROGRESS_ID)
            .unwrap()
            .map(|document| serde_json::from_value(document).unwrap())
    }

    #[test]
    fn pushes_local_ledger_when_remote_is_empty() {
        let documents = MemoryDocumentStore::new();
        let auth = StaticAuth::new();
        let mut sync = ProgressSync::new(Rc::new(documents.clone()), &auth);
        let mut ledger = ProgressLedger::new();
        session(&mut ledger, 30);

        assert!(!sync.pump(&mut ledger));
        auth.sign_in(Identity::new("u1", "Ada"));
        assert!(!sync.pump(&mut ledger));

        assert_eq!(remote(&documents, "u1"), Some(ledger.to_record()));
    }

    #[test]
    fn hydrates_from_remote() {
        let documents = MemoryDocumentStore::new();
        documents
            .set(
                &progress_collection("u1"),
                PROGRESS_ID,
                json!({
                    "xp": 1_000,
                    "level": 17,
                    "badges": ["god_hand"],
                    "lifetimeStats": {"totalSessions": 3, "totalKeystrokes": 900, "maxWpm": 101}
                }),
            )
            .unwrap();
        let auth = StaticAuth::signed_in(Identity::new("u1", "Ada"));
        let mut sync = ProgressSync::new(Rc::new(documents.clone()), &auth);

        let mut ledger = ProgressLedger::new();
        session(&mut ledger, 30);
        assert!(sync.pump(&mut ledger));

        assert_eq!(ledger.progress().xp(), 1_000);
        assert!(ledger.progress().badges().contains("god_hand"));
        assert!(ledger.progress().badges().contains("init_link"));

        // The merged badge set went back up
        let pushed = remote(&documents, "u1").unwrap();
        assert!(pushed.badges.contains(&"init_link".to_string()));
    }

    #[test]
    fn only_pushes_on_change() {
        let documents = MemoryDocumentStore::new();
        let auth = StaticAuth::signed_in(Identity::new("u1", "Ada"));
        let mut sync = ProgressSync::new(Rc::new(documents.clone()), &auth);
        let mut ledger = ProgressLedger::new();
        sync.pump(&mut ledger);

        assert!(!sync.push_if_changed(&ledger));
        session(&mut ledger, 30);
        assert!(sync.push_if_changed(&ledger));
        assert!(!sync.push_if_changed(&ledger));
    }

    #[test]
    fn transport_failures_keep_local_state() {
        let documents = MemoryDocumentStore::new();
        let auth = StaticAuth::signed_in(Identity::new("u1", "Ada"));
        let mut sync = ProgressSync::new(Rc::new(documents.clone()), &auth);
        let mut ledger = ProgressLedger::new();
        documents.set_offline(true);

        session(&mut ledger, 30);
        let before = ledger.clone();
        assert!(!sync.pump(&mut ledger));
        assert!(!sync.push_if_changed(&ledger));
        assert_eq!(ledger, before);

        documents.set_offline(false);
        assert!(sync.push_if_changed(&ledger));
    }

    #[test]
    fn sign_out_stops_pushing() {
        let documents = MemoryDocumentStore::new();
        let auth = StaticAuth::signed_in(Identity::new("u1", "Ada"));
        let mut sync = ProgressSync::new(Rc::new(documents.clone()), &auth);
        let mut ledger = ProgressLedger::new();
        sync.pump(&mut ledger);

        auth.sign_out();
        sync.pump(&mut ledger);
        session(&mut ledger, 30);
        assert!(!sync.push_if_changed(&ledger));
        assert!(sync.identity().is_none());
    }
}
