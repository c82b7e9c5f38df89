use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// A single key press, and its release once the key comes back up.
///
/// Keystrokes are appended in the order they are pressed and are never removed, not even when
/// the typed character is deleted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStroke {
    /// The character that was typed
    pub key: char,
    /// The character the text expected at the cursor
    pub expected: char,
    pub press_time: Timestamp,
    pub release_time: Option<Timestamp>,
    pub is_correct: bool,
}

impl KeyStroke {
    pub const fn new(key: char, expected: char, press_time: Timestamp) -> Self {
        Self {
            key,
            expected,
            press_time,
            release_time: None,
            is_correct: key == expected,
        }
    }

    pub const fn is_released(&self) -> bool {
        self.release_time.is_some()
    }

    /// How long the key was held down, if it has been released
    pub fn dwell_ms(&self) -> Option<u64> {
        self.release_time
            .map(|release| release.saturating_sub(self.press_time))
    }
}

/// Stamps the most recent unreleased keystroke for `key` with `release_time`.
///
/// Returns false when every keystroke for `key` has already been released.
pub fn release(keystrokes: &mut [KeyStroke], key: char, release_time: Timestamp) -> bool {
    keystrokes
        .iter_mut()
        .rev()
        .find(|stroke| stroke.key == key && stroke.release_time.is_none())
        .map(|stroke| stroke.release_time = Some(release_time))
        .is_some()
}
