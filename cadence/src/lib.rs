//! # Cadence
//!
//! The engine behind a typing trainer: per-keystroke session tracking, rhythm analytics,
//! XP/level/badge progression and a multiplayer race protocol over a shared real-time store.
//!
//! All local computation is total. Only the boundary traits in [store] and [realtime] can fail,
//! and the components that call them log and absorb those failures.

pub mod analytics;
pub mod archive;
pub mod coach;
pub mod config;
pub mod error;
pub mod gamification;
pub mod keystroke;
pub mod ledger;
pub mod lobby;
pub mod missions;
pub mod realtime;
pub mod session;
pub mod store;
pub mod sync;

pub use config::Configuration;
pub use error::{CacheError, LobbyError, StoreError};
pub use keystroke::KeyStroke;
pub use session::{SessionStatus, SessionType, TypingSession};

use web_time::{SystemTime, UNIX_EPOCH};

const AVERAGE_WORD_LENGTH: f64 = 5.0;
const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Milliseconds since the unix epoch
pub type Timestamp = u64;

/// Current wall-clock time as a [Timestamp]
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Timestamp)
        .unwrap_or_default()
}
