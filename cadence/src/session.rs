//! # Session Module - Per-Keystroke Typing Session Engine
//!
//! A [TypingSession] owns one training, exam or race attempt. It ingests characters, advances
//! the cursor, tags every keystroke correct or incorrect and decides when the attempt is over.
//!
//! ## Session Lifecycle
//!
#![doc = simple_mermaid::mermaid!("../diagrams/session_lifecycle.mmd")]
//!
//! ## Throttling
//!
//! Accuracy is cheap and recomputed on every keystroke. WPM and consistency scan the whole
//! keystroke history, so they are recomputed at most once per
//! [Configuration::recompute_interval_ms], except on the keystroke that ends the session: the
//! final numbers always reflect the true finish state.
//!
//! ## Exam Failure
//!
//! In [SessionType::Exam], once more than [Configuration::exam_grace_chars] characters are
//! typed, a rolling accuracy below [Configuration::exam_min_accuracy] fails the session. Failure
//! is evaluated before completion, so a keystroke that both completes the text and breaks the
//! accuracy requirement fails the exam.
//!
//! ## Usage
//!
//! ```rust
//! use cadence::session::{SessionStatus, SessionType, TypingSession};
//!
//! let mut session = TypingSession::default();
//! session.set_text("Test", SessionType::Practice, None, false);
//!
//! for (i, c) in "Test".chars().enumerate() {
//!     session.input_char(c, Some(i as u64 * 150));
//! }
//!
//! assert_eq!(session.status(), SessionStatus::Finished);
//! assert!(session.is_finished());
//! assert_eq!(session.cursor_index(), 4);
//! ```

mod feedback;
pub mod stats_engine;

pub use feedback::{Feedback, FeedbackSink, Silent};
pub use stats_engine::{
    CounterEngine, LocalStats, NativeEngine, NativeReport, NativeStats, StatsEngine,
    select_stats_engine,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::Configuration;
use crate::gamification::SessionStats;
use crate::keystroke::{self, KeyStroke};
use crate::{Timestamp, analytics};
use stats_engine::{Sample, rolling_accuracy};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionType {
    #[default]
    Practice,
    Exam,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Finished,
    Failed,
}

impl SessionStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Externally visible state of a [TypingSession]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub target_text: String,
    pub user_input: String,
    pub cursor_index: usize,
    pub session_type: SessionType,
    pub lesson_id: Option<String>,
    pub is_race: bool,
    pub keystrokes: Vec<KeyStroke>,
    pub start_time: Option<Timestamp>,
    pub wpm: u32,
    pub accuracy: f64,
    pub consistency: f64,
    pub error_count: usize,
    pub status: SessionStatus,
    pub is_finished: bool,
}

/// Complete typing session state machine
#[derive(Debug)]
pub struct TypingSession {
    target: Vec<char>,
    input: Vec<char>,
    session_type: SessionType,
    lesson_id: Option<String>,
    is_race: bool,
    keystrokes: Vec<KeyStroke>,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    last_recompute: Option<Timestamp>,
    wpm: u32,
    accuracy: f64,
    consistency: f64,
    error_count: usize,
    status: SessionStatus,
    config: Configuration,
    stats: Box<dyn StatsEngine>,
    feedback: Box<dyn FeedbackSink>,
}

impl Default for TypingSession {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl TypingSession {
    /// Create an idle session without any text
    pub fn new(config: Configuration) -> Self {
        Self {
            target: Vec::new(),
            input: Vec::new(),
            session_type: SessionType::default(),
            lesson_id: None,
            is_race: false,
            keystrokes: Vec::new(),
            start_time: None,
            end_time: None,
            last_recompute: None,
            wpm: 0,
            accuracy: 100.0,
            consistency: 0.0,
            error_count: 0,
            status: SessionStatus::Idle,
            config,
            stats: Box::new(LocalStats),
            feedback: Box::new(Silent),
        }
    }

    /// Use a different statistics strategy (builder pattern)
    pub fn with_stats_engine(mut self, stats: Box<dyn StatsEngine>) -> Self {
        self.stats = stats;
        self.stats.reset(&self.target_text());
        self
    }

    /// Deliver feedback signals to `sink` (builder pattern)
    pub fn with_feedback(mut self, sink: Box<dyn FeedbackSink>) -> Self {
        self.feedback = sink;
        self
    }

    pub const fn config(&self) -> &Configuration {
        &self.config
    }

    /// Install a new text. Always resets the session first.
    pub fn set_text(
        &mut self,
        text: &str,
        session_type: SessionType,
        lesson_id: Option<&str>,
        is_race: bool,
    ) {
        self.reset();
        self.target = text.chars().collect();
        self.session_type = session_type;
        self.lesson_id = lesson_id.map(str::to_string);
        self.is_race = is_race;
        self.stats.reset(text);
        tracing::debug!(
            length = self.target.len(),
            %session_type,
            is_race,
            "Installed session text"
        );
    }

    /// Return to [SessionStatus::Idle], discarding all input but keeping the text
    pub fn reset(&mut self) {
        self.input.clear();
        self.keystrokes.clear();
        self.start_time = None;
        self.end_time = None;
        self.last_recompute = None;
        self.wpm = 0;
        self.accuracy = 100.0;
        self.consistency = 0.0;
        self.error_count = 0;
        self.status = SessionStatus::Idle;
        self.stats.reset(&self.target_text());
    }

    /// Type a character.
    ///
    /// Returns the feedback for the keypress, or `None` when the session no longer accepts
    /// input (finished, failed, or without text). `press_time` defaults to now.
    pub fn input_char(&mut self, char: char, press_time: Option<Timestamp>) -> Option<Feedback> {
        if self.is_finished() {
            return None;
        }

        let expected = *self.target.get(self.input.len())?;
        let press_time = press_time.unwrap_or_else(crate::now);
        let start_time = *self.start_time.get_or_insert(press_time);
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Running;
        }

        let stroke = KeyStroke::new(char, expected, press_time);
        self.keystrokes.push(stroke);
        self.stats.record(&stroke);
        self.input.push(char);
        if !stroke.is_correct {
            self.error_count += 1;
        }

        // Field-level borrows: `self.stats` is borrowed mutably below
        let sample = Sample {
            keystrokes: &self.keystrokes,
            input_len: self.input.len(),
            error_count: self.error_count,
            elapsed_ms: press_time as i64 - start_time as i64,
            pause_threshold_ms: self.config.pause_threshold_ms,
        };
        self.accuracy = self.stats.accuracy(&sample);

        let outcome = self.evaluate_outcome();
        let last_recompute = *self.last_recompute.get_or_insert(start_time);
        let recompute_due =
            press_time.saturating_sub(last_recompute) >= self.config.recompute_interval_ms;

        if outcome.is_some() || recompute_due {
            let speed = self.stats.speed(&sample);
            self.wpm = speed.wpm;
            self.consistency = speed.consistency;
            self.last_recompute = Some(press_time);
        }

        let feedback = if stroke.is_correct {
            Feedback::Correct
        } else {
            Feedback::Incorrect
        };
        self.feedback.signal(feedback);

        if let Some(status) = outcome {
            self.status = status;
            self.end_time = Some(press_time);
            let terminal = if status == SessionStatus::Failed {
                Feedback::Failed
            } else {
                Feedback::Completed
            };
            self.feedback.signal(terminal);
            tracing::info!(
                %status,
                wpm = self.wpm,
                accuracy = self.accuracy,
                errors = self.error_count,
                "Session ended"
            );
        }

        Some(feedback)
    }

    /// Delete the last typed character.
    ///
    /// The keystroke record stays, so the mistake history survives visual corrections.
    pub fn backspace(&mut self) -> Option<char> {
        if self.is_finished() {
            return None;
        }

        self.input.pop()
    }

    /// Record the release of `char`, stamping the most recent unreleased press of it.
    ///
    /// Returns false when there was nothing to stamp or the session is over.
    pub fn release_char(&mut self, char: char, release_time: Option<Timestamp>) -> bool {
        if self.is_finished() {
            return false;
        }

        let release_time = release_time.unwrap_or_else(crate::now);
        keystroke::release(&mut self.keystrokes, char, release_time)
    }

    /// Failure is checked before completion
    fn evaluate_outcome(&self) -> Option<SessionStatus> {
        let typed = self.input.len();
        let local_accuracy = rolling_accuracy(typed, self.error_count);

        if self.session_type == SessionType::Exam
            && typed > self.config.exam_grace_chars
            && local_accuracy < self.config.exam_min_accuracy
        {
            return Some(SessionStatus::Failed);
        }

        (typed == self.target.len()).then_some(SessionStatus::Finished)
    }

    pub fn target_text(&self) -> String {
        self.target.iter().collect()
    }

    pub fn user_input(&self) -> String {
        self.input.iter().collect()
    }

    /// Always equal to the length of the user input
    pub fn cursor_index(&self) -> usize {
        self.input.len()
    }

    pub fn text_len(&self) -> usize {
        self.target.len()
    }

    /// The character awaiting input, if any
    pub fn current_character(&self) -> Option<char> {
        self.target.get(self.input.len()).copied()
    }

    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    pub const fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub const fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn lesson_id(&self) -> Option<&str> {
        self.lesson_id.as_deref()
    }

    pub const fn is_race(&self) -> bool {
        self.is_race
    }

    pub const fn wpm(&self) -> u32 {
        self.wpm
    }

    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub const fn consistency(&self) -> f64 {
        self.consistency
    }

    pub const fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn keystrokes(&self) -> &[KeyStroke] {
        &self.keystrokes
    }

    pub const fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    /// Typed share of the text in whole percent
    pub fn progress(&self) -> u8 {
        if self.target.is_empty() {
            return 0;
        }

        ((self.input.len() as f64 / self.target.len() as f64) * 100.0).round() as u8
    }

    /// Time since the first keystroke, frozen once the session ended
    pub fn elapsed_ms(&self, now: Timestamp) -> u64 {
        self.start_time.map_or(0, |start| {
            self.end_time.unwrap_or(now).saturating_sub(start)
        })
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            target_text: self.target_text(),
            user_input: self.user_input(),
            cursor_index: self.cursor_index(),
            session_type: self.session_type,
            lesson_id: self.lesson_id.clone(),
            is_race: self.is_race,
            keystrokes: self.keystrokes.clone(),
            start_time: self.start_time,
            wpm: self.wpm,
            accuracy: self.accuracy,
            consistency: self.consistency,
            error_count: self.error_count,
            status: self.status,
            is_finished: self.is_finished(),
        }
    }

    /// Summarize the session for progression and archiving
    pub fn session_stats(&self, now: Timestamp) -> SessionStats {
        SessionStats {
            wpm: self.wpm,
            accuracy: self.accuracy,
            duration_secs: self.elapsed_ms(now) as f64 / 1_000.0,
            mistakes: self.error_count,
            is_perfect: self.error_count == 0 && self.status == SessionStatus::Finished,
            combo: analytics::longest_combo(&self.keystrokes),
            consistency: self.consistency,
            chars: self.keystrokes.len(),
            weakest_keys: analytics::weakest_keys(&self.keystrokes),
        }
    }
}
