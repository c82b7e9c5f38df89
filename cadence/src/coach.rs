//! # Coach Module - What to practice next
//!
//! Finds the keys a typist struggles with, either because they are mistyped or because they
//! take long to reach, and points at the lesson that drills the worst of them hardest.
//!
//! ```rust
//! use cadence::{KeyStroke, coach};
//!
//! let strokes: Vec<KeyStroke> = (0..6)
//!     .map(|i| KeyStroke::new(if i % 2 == 0 { 'w' } else { 'q' }, 'q', i * 100))
//!     .collect();
//!
//! let weak = coach::analyze_weaknesses(&strokes);
//! assert_eq!(weak[0].key, 'q');
//!
//! let lessons = [("home-row", "asdf jkl;"), ("pangrams", "the quick brown fox")];
//! let advice = coach::recommend(&weak, lessons).unwrap();
//! assert_eq!(advice.lesson_id.as_deref(), Some("pangrams"));
//! ```

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::KeyStroke;
use crate::analytics::{PAUSE_THRESHOLD_MS, fold_case, math};

/// Fewer attempts than this say nothing about a key
pub const MIN_SAMPLES: usize = 5;

/// Share of mistyped attempts above which a key is weak
pub const ERROR_RATE_THRESHOLD: f64 = 0.1;

/// Average press-to-press latency above which a key is weak
pub const LATENCY_THRESHOLD_MS: f64 = 300.0;

/// How many weak keys a [Recommendation] names
pub const FOCUS_KEY_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakKey {
    /// Expected character, lower-cased
    pub key: char,
    /// 0.0 - 1.0
    pub error_rate: f64,
    pub avg_latency_ms: f64,
}

/// Keys whose error rate or average latency crosses a threshold, worst error rate first.
///
/// Latency is measured from the previous press. Gaps of [PAUSE_THRESHOLD_MS] or more are pauses
/// and give no latency sample. Keys attempted fewer than [MIN_SAMPLES] times are skipped.
pub fn analyze_weaknesses(keystrokes: &[KeyStroke]) -> Vec<WeakKey> {
    #[derive(Default)]
    struct Tally {
        attempts: usize,
        errors: usize,
        latencies: Vec<f64>,
    }

    let mut tallies: BTreeMap<char, Tally> = BTreeMap::new();

    for (i, stroke) in keystrokes.iter().enumerate() {
        let tally = tallies.entry(fold_case(stroke.expected)).or_default();
        tally.attempts += 1;
        if !stroke.is_correct {
            tally.errors += 1;
        }

        let latency = i
            .checked_sub(1)
            .map(|prev| stroke.press_time.saturating_sub(keystrokes[prev].press_time))
            .filter(|&latency| latency < PAUSE_THRESHOLD_MS);
        if let Some(latency) = latency {
            tally.latencies.push(latency as f64);
        }
    }

    let mut weak: Vec<WeakKey> = tallies
        .into_iter()
        .filter(|(_, tally)| tally.attempts >= MIN_SAMPLES)
        .map(|(key, tally)| WeakKey {
            key,
            error_rate: tally.errors as f64 / tally.attempts as f64,
            avg_latency_ms: math::mean(&tally.latencies),
        })
        .filter(|weak| {
            weak.error_rate > ERROR_RATE_THRESHOLD || weak.avg_latency_ms > LATENCY_THRESHOLD_MS
        })
        .collect();

    weak.sort_by(|a, b| {
        b.error_rate
            .total_cmp(&a.error_rate)
            .then(b.avg_latency_ms.total_cmp(&a.avg_latency_ms))
    });
    weak
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Worst first, at most [FOCUS_KEY_COUNT]
    pub focus_keys: Vec<char>,
    /// None when no lesson contains the worst key
    pub lesson_id: Option<String>,
}

impl Recommendation {
    pub fn worst_key(&self) -> Option<char> {
        self.focus_keys.first().copied()
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .focus_keys
            .iter()
            .map(|key| format!("'{}'", key.to_uppercase()))
            .collect();
        write!(f, "Focus on {}", keys.join(" "))?;
        if let Some(lesson) = &self.lesson_id {
            write!(f, ", try lesson {lesson}")?;
        }
        Ok(())
    }
}

/// Advice for `weaknesses` as returned by [analyze_weaknesses], or None when nothing is weak.
///
/// `lessons` yields `(id, text)` pairs. The lesson where the worst key makes up the largest
/// share of the text is suggested, the first one on a tie.
pub fn recommend<'a>(
    weaknesses: &[WeakKey],
    lessons: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Option<Recommendation> {
    let worst = weaknesses.first()?.key;

    let mut best: Option<(&str, f64)> = None;
    for (id, text) in lessons {
        let total = text.chars().count();
        let hits = text.chars().filter(|&c| fold_case(c) == worst).count();
        if hits == 0 {
            continue;
        }
        let density = hits as f64 / total as f64;
        if best.is_none_or(|(_, top)| density > top) {
            best = Some((id, density));
        }
    }

    Some(Recommendation {
        focus_keys: weaknesses
            .iter()
            .take(FOCUS_KEY_COUNT)
            .map(|weak| weak.key)
            .collect(),
        lesson_id: best.map(|(id, _)| id.to_string()),
    })
}
