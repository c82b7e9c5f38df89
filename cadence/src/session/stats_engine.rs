//! Pluggable computation of the live session metrics.
//!
//! A session always runs its own state machine. What it delegates is the number crunching
//! behind the displayed `wpm`, `accuracy` and `consistency`: either in-process
//! ([LocalStats]) or through an external engine ([NativeStats]) whose results are reconciled
//! into the session.

use std::fmt;

use crate::{KeyStroke, Timestamp, analytics, MILLIS_PER_MINUTE};

/// The data a [StatsEngine] gets to look at
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub keystrokes: &'a [KeyStroke],
    pub input_len: usize,
    pub error_count: usize,
    pub elapsed_ms: i64,
    pub pause_threshold_ms: u64,
}

/// Throttled speed metrics
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Speed {
    pub wpm: u32,
    pub consistency: f64,
}

/// Strategy for computing live session metrics
pub trait StatsEngine: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Called whenever the session installs a new text or resets
    fn reset(&mut self, _target_text: &str) {}

    /// Called once per ingested keystroke, before any metric is read
    fn record(&mut self, _keystroke: &KeyStroke) {}

    /// Accuracy after the latest keystroke. Called on every input.
    fn accuracy(&self, sample: &Sample<'_>) -> f64;

    /// WPM and consistency. Only called when the session decides a recompute is due.
    fn speed(&mut self, sample: &Sample<'_>) -> Speed;
}

/// Rolling accuracy: the share of the current input that was not an error, floored at 0
pub fn rolling_accuracy(input_len: usize, error_count: usize) -> f64 {
    if input_len == 0 {
        return 100.0;
    }

    (100.0 - (error_count as f64 / input_len as f64) * 100.0).max(0.0)
}

/// Pure in-process computation
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStats;

impl StatsEngine for LocalStats {
    fn name(&self) -> &'static str {
        "local"
    }

    fn accuracy(&self, sample: &Sample<'_>) -> f64 {
        rolling_accuracy(sample.input_len, sample.error_count)
    }

    fn speed(&mut self, sample: &Sample<'_>) -> Speed {
        Speed {
            wpm: analytics::calculate_wpm(sample.keystrokes, sample.elapsed_ms),
            consistency: analytics::consistency_with_threshold(
                sample.keystrokes,
                sample.pause_threshold_ms,
            ),
        }
    }
}

/// What an external engine reports after each keystroke
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeReport {
    pub wpm: f64,
    pub accuracy: f64,
}

/// An external, faster statistics engine
pub trait NativeEngine: fmt::Debug {
    fn reset(&mut self, target_text: &str);
    fn process(&mut self, key: char, at: Timestamp) -> NativeReport;
}

/// Delegates WPM and accuracy to a [NativeEngine] and reconciles the reports.
///
/// The external engine has no notion of rhythm, so consistency is still computed locally.
#[derive(Debug)]
pub struct NativeStats<E> {
    engine: E,
    last: Option<NativeReport>,
}

impl<E: NativeEngine> NativeStats<E> {
    pub const fn new(engine: E) -> Self {
        Self { engine, last: None }
    }
}

impl<E: NativeEngine> StatsEngine for NativeStats<E> {
    fn name(&self) -> &'static str {
        "native"
    }

    fn reset(&mut self, target_text: &str) {
        self.last = None;
        self.engine.reset(target_text);
    }

    fn record(&mut self, keystroke: &KeyStroke) {
        self.last = Some(self.engine.process(keystroke.key, keystroke.press_time));
    }

    fn accuracy(&self, _sample: &Sample<'_>) -> f64 {
        self.last
            .map_or(100.0, |report| report.accuracy.clamp(0.0, 100.0))
    }

    fn speed(&mut self, sample: &Sample<'_>) -> Speed {
        let wpm = self
            .last
            .map(|report| report.wpm)
            .filter(|wpm| wpm.is_finite() && *wpm > 0.0)
            .unwrap_or(0.0);

        Speed {
            wpm: wpm.round() as u32,
            consistency: analytics::consistency_with_threshold(
                sample.keystrokes,
                sample.pause_threshold_ms,
            ),
        }
    }
}

/// Counter-based engine implementing the native contract.
///
/// Net WPM subtracts errors per minute from gross WPM; accuracy is the share of keystrokes
/// that matched the text.
#[derive(Debug, Default, Clone)]
pub struct CounterEngine {
    target: Vec<char>,
    typed: usize,
    errors: usize,
    started_at: Option<Timestamp>,
}

impl NativeEngine for CounterEngine {
    fn reset(&mut self, target_text: &str) {
        *self = Self {
            target: target_text.chars().collect(),
            ..Self::default()
        };
    }

    fn process(&mut self, key: char, at: Timestamp) -> NativeReport {
        let started_at = *self.started_at.get_or_insert(at);

        if self.target.get(self.typed).is_some_and(|&expected| expected != key) {
            self.errors += 1;
        }
        self.typed += 1;

        let minutes = at.saturating_sub(started_at) as f64 / MILLIS_PER_MINUTE;
        let wpm = if minutes > 0.0 {
            let gross = (self.typed as f64 / 5.0) / minutes;
            (gross - self.errors as f64 / minutes).max(0.0)
        } else {
            0.0
        };

        NativeReport {
            wpm,
            accuracy: 100.0 * (1.0 - self.errors as f64 / self.typed as f64),
        }
    }
}

/// Picks the native path when an external engine is available, the local one otherwise
pub fn select_stats_engine<E: NativeEngine + 'static>(native: Option<E>) -> Box<dyn StatsEngine> {
    match native {
        Some(engine) => {
            tracing::debug!("Using native statistics engine");
            Box::new(NativeStats::new(engine))
        }
        None => Box::new(LocalStats),
    }
}
