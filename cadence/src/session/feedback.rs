use std::fmt;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Signals for the audio/visual feedback layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Feedback {
    /// A correct keypress
    Correct,
    /// An incorrect keypress
    Incorrect,
    /// The text was completed
    Completed,
    /// The exam was failed
    Failed,
}

/// Consumer of [Feedback] signals
pub trait FeedbackSink: fmt::Debug {
    fn signal(&mut self, feedback: Feedback);
}

/// Discards every signal
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl FeedbackSink for Silent {
    fn signal(&mut self, _feedback: Feedback) {}
}

impl FeedbackSink for Sender<Feedback> {
    fn signal(&mut self, feedback: Feedback) {
        // The receiving side going away only means nobody is listening anymore
        let _ = self.send(feedback);
    }
}
