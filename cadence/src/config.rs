//! # Configuration Module - Runtime Behavior Settings
//!
//! Tunables for the session engine, the lobby protocol and local persistence. Every setting has
//! a default matching the published behavior of the trainer, so most applications only touch
//! this through [Configuration::default].
//!
//! ## Usage
//!
//! ```rust
//! use cadence::config::Configuration;
//!
//! // Use default configuration
//! let config = Configuration::default();
//! assert_eq!(config.recompute_interval_ms, 500);
//!
//! // Custom configuration
//! let config = Configuration {
//!     lobby_sync_interval_ms: 100,
//!     ..Configuration::default()
//! };
//! ```
//!
//! ## Performance Considerations
//!
//! - **Recompute Interval**: WPM and consistency are recomputed at most this often while
//!   typing. Lower values make the live display smoother but put the full keystroke scan back on
//!   the input path.
//! - **Lobby Sync Interval**: Bounds how often a racer writes its progress to the shared lobby.

use serde::{Deserialize, Serialize};

/// Runtime configuration for sessions, races and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Minimum time between two WPM/consistency recomputations while typing.
    ///
    /// The keystroke that finishes a text is never throttled.
    ///
    /// **Default**: 500 ms
    pub recompute_interval_ms: u64,

    /// Characters an exam may type before the accuracy requirement applies
    ///
    /// **Default**: 20
    pub exam_grace_chars: usize,

    /// Rolling accuracy an exam must stay at once past the grace buffer
    ///
    /// **Default**: 95.0
    pub exam_min_accuracy: f64,

    /// Inter-key gaps at or above this are treated as pauses by consistency analysis
    ///
    /// **Default**: 2000 ms
    pub pause_threshold_ms: u64,

    /// Minimum time between two progress writes to a lobby.
    ///
    /// The finishing write is always delivered immediately.
    ///
    /// **Default**: 250 ms
    pub lobby_sync_interval_ms: u64,

    /// Length of the pre-race countdown
    ///
    /// **Default**: 3000 ms
    pub countdown_ms: u64,

    /// Sessions kept in the device-local history when nobody is signed in
    ///
    /// **Default**: 50
    pub local_history_limit: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            recompute_interval_ms: 500,
            exam_grace_chars: 20,
            exam_min_accuracy: 95.0,
            pause_threshold_ms: crate::analytics::PAUSE_THRESHOLD_MS,
            lobby_sync_interval_ms: 250,
            countdown_ms: 3_000,
            local_history_limit: 50,
        }
    }
}
