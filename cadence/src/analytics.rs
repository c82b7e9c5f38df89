//! # Analytics Module - Keystroke Stream Metrics
//!
//! Pure functions over a recorded stream of [KeyStroke]s. Nothing in here holds state or
//! performs I/O, and every function is total: empty streams, zero durations and streams made
//! only of pauses all have a defined, finite result.
//!
//! ## Metrics
//!
//! - **WPM**: gross words per minute, counting every keystroke as typed (5 characters = 1 word)
//! - **Consistency**: coefficient of variation of inter-key latency. 0 is a perfectly steady
//!   rhythm, larger values are more erratic.
//! - **Weakest keys**: expected characters that were mistyped most often
//!
//! ## Usage
//!
//! ```rust
//! use cadence::analytics;
//! use cadence::KeyStroke;
//!
//! let strokes: Vec<KeyStroke> = "hello"
//!     .chars()
//!     .enumerate()
//!     .map(|(i, c)| KeyStroke::new(c, c, i as u64 * 100))
//!     .collect();
//!
//! assert_eq!(analytics::calculate_wpm(&strokes, 1_000), 60);
//! assert_eq!(analytics::calculate_consistency(&strokes), 0.0);
//! ```

pub mod math;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{AVERAGE_WORD_LENGTH, KeyStroke, MILLIS_PER_MINUTE};

/// Inter-key gaps at or above this are voluntary pauses, not rhythm
pub const PAUSE_THRESHOLD_MS: u64 = 2_000;

/// How many keys [weakest_keys] reports at most
pub const WEAKEST_KEY_COUNT: usize = 3;

/// Default window for [burst_wpm]
pub const BURST_WINDOW: usize = 10;

/// Gross words per minute over `total_time_ms`.
///
/// Every keystroke counts, correct or not. Returns 0 for an empty stream or a non-positive
/// duration.
pub fn calculate_wpm(keystrokes: &[KeyStroke], total_time_ms: i64) -> u32 {
    if total_time_ms <= 0 || keystrokes.is_empty() {
        return 0;
    }

    let minutes = total_time_ms as f64 / MILLIS_PER_MINUTE;
    let words = keystrokes.len() as f64 / AVERAGE_WORD_LENGTH;

    (words / minutes).round() as u32
}

/// Coefficient of variation of inter-key latency, using the default pause threshold.
pub fn calculate_consistency(keystrokes: &[KeyStroke]) -> f64 {
    consistency_with_threshold(keystrokes, PAUSE_THRESHOLD_MS)
}

/// Coefficient of variation of inter-key latency.
///
/// Latencies at or above `pause_threshold_ms` are discarded. Fewer than 3 keystrokes, or no
/// latencies left after filtering, yields 0.
pub fn consistency_with_threshold(keystrokes: &[KeyStroke], pause_threshold_ms: u64) -> f64 {
    if keystrokes.len() < 3 {
        return 0.0;
    }

    let latencies: Vec<f64> = keystrokes
        .windows(2)
        .map(|pair| pair[1].press_time.saturating_sub(pair[0].press_time))
        .filter(|&latency| latency < pause_threshold_ms)
        .map(|latency| latency as f64)
        .collect();

    if latencies.is_empty() {
        return 0.0;
    }

    math::coefficient_of_variation(&latencies)
}

/// Up to three expected characters with the most errors, most errors first.
///
/// Characters are compared case-insensitively. Ties keep the order in which the character was
/// first mistyped.
pub fn weakest_keys(keystrokes: &[KeyStroke]) -> Vec<char> {
    let mut tally: Vec<(char, usize)> = Vec::new();

    for stroke in keystrokes.iter().filter(|stroke| !stroke.is_correct) {
        let key = fold_case(stroke.expected);
        match tally.iter_mut().find(|(seen, _)| *seen == key) {
            Some((_, count)) => *count += 1,
            None => tally.push((key, 1)),
        }
    }

    // Stable sort keeps first-seen order among equal counts
    tally.sort_by(|(_, a), (_, b)| b.cmp(a));

    tally
        .into_iter()
        .take(WEAKEST_KEY_COUNT)
        .map(|(key, _)| key)
        .collect()
}

/// WPM over the last `window` keystrokes.
///
/// The span is measured between the first and last press inside the window, so a burst of
/// fast typing after a long pause is reported at its own speed.
pub fn burst_wpm(keystrokes: &[KeyStroke], window: usize) -> u32 {
    if window == 0 || keystrokes.len() < window {
        return 0;
    }

    let recent = &keystrokes[keystrokes.len() - window..];
    let span = recent[window - 1].press_time as i64 - recent[0].press_time as i64;

    calculate_wpm(recent, span)
}

/// Length of the longest run of consecutive correct keystrokes
pub fn longest_combo(keystrokes: &[KeyStroke]) -> usize {
    keystrokes
        .iter()
        .fold((0, 0), |(best, current), stroke| {
            if stroke.is_correct {
                (best.max(current + 1), current + 1)
            } else {
                (best, 0)
            }
        })
        .0
}

/// Per-key timing profile used for biometric analysis
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTiming {
    /// Average press-to-release time
    pub avg_dwell_ms: u64,
    /// Average time between releasing the previous key and pressing this one
    pub avg_flight_ms: u64,
    pub errors: usize,
}

/// Dwell and flight times per expected character (lower-cased).
///
/// Keystrokes that were never released contribute no dwell sample, and a keystroke following
/// an unreleased one contributes no flight sample.
pub fn temporal_map(keystrokes: &[KeyStroke]) -> BTreeMap<char, KeyTiming> {
    #[derive(Default)]
    struct Samples {
        dwell: Vec<f64>,
        flight: Vec<f64>,
        errors: usize,
    }

    let mut samples: BTreeMap<char, Samples> = BTreeMap::new();

    for (i, stroke) in keystrokes.iter().enumerate() {
        let entry = samples.entry(fold_case(stroke.expected)).or_default();

        if let Some(dwell) = stroke.dwell_ms() {
            entry.dwell.push(dwell as f64);
        }

        if !stroke.is_correct {
            entry.errors += 1;
        }

        let previous_release = i
            .checked_sub(1)
            .and_then(|prev| keystrokes[prev].release_time);
        if let Some(released) = previous_release {
            // Rollover typing can press the next key before releasing the previous one
            let flight = stroke.press_time as f64 - released as f64;
            entry.flight.push(flight.max(0.0));
        }
    }

    samples
        .into_iter()
        .map(|(key, samples)| {
            let timing = KeyTiming {
                avg_dwell_ms: math::mean(&samples.dwell).round() as u64,
                avg_flight_ms: math::mean(&samples.flight).round() as u64,
                errors: samples.errors,
            };
            (key, timing)
        })
        .collect()
}

/// Difficulty band of a text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Phase {
    Idle,
    Foundation,
    Accuracy,
    Speed,
    Flow,
}

/// How demanding a text is to type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    /// 0 - 100
    pub score: u8,
    pub phase: Phase,
    pub symbol_density: f64,
    pub cap_ratio: f64,
    pub avg_word_length: f64,
}

/// Scores a text by symbol density, capitalization and word length
pub fn text_complexity(text: &str) -> Complexity {
    let length = text.chars().count();
    if length == 0 {
        return Complexity {
            score: 0,
            phase: Phase::Idle,
            symbol_density: 0.0,
            cap_ratio: 0.0,
            avg_word_length: 0.0,
        };
    }

    let symbols = text
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
        .count();
    let caps = text.chars().filter(char::is_ascii_uppercase).count();
    let word_lengths: Vec<f64> = text
        .split_whitespace()
        .map(|word| word.chars().count() as f64)
        .collect();
    let avg_word_length = math::mean(&word_lengths);

    let raw = symbols as f64 * 5.0 + caps as f64 * 2.0 + avg_word_length * 4.0;
    let score = raw.round().min(100.0) as u8;

    let phase = match score {
        81.. => Phase::Flow,
        61..=80 => Phase::Speed,
        36..=60 => Phase::Accuracy,
        _ => Phase::Foundation,
    };

    Complexity {
        score,
        phase,
        symbol_density: symbols as f64 / length as f64,
        cap_ratio: caps as f64 / length as f64,
        avg_word_length,
    }
}

pub(crate) fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}
