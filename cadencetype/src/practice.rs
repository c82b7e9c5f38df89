use std::io::{self, Stdout, Write, stdout};
use std::time::Duration;

use cadence::session::{Feedback, SessionType};
use cadence::{Timestamp, TypingSession};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::{execute, queue, terminal};

use crate::app::App;
use crate::error::AppError;
use crate::report;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a typing loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Completed,
    Aborted,
}

/// What a terminal event means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Type(char),
    Release(char),
    Backspace,
    Abort,
    Ignore,
}

pub fn action(event: &Event) -> Action {
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind,
        ..
    }) = event
    else {
        return Action::Ignore;
    };

    match (code, *kind) {
        (KeyCode::Esc, KeyEventKind::Press) => Action::Abort,
        (KeyCode::Char('c' | 'q'), KeyEventKind::Press)
            if modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Action::Abort
        }
        (KeyCode::Backspace, KeyEventKind::Press) => Action::Backspace,
        (KeyCode::Char(c), KeyEventKind::Press | KeyEventKind::Repeat) => Action::Type(*c),
        (KeyCode::Char(c), KeyEventKind::Release) => Action::Release(*c),
        _ => Action::Ignore,
    }
}

/// Raw mode for the lifetime of the guard. Release events are requested where the terminal
/// supports them.
struct RawMode {
    enhanced: bool,
}

impl RawMode {
    fn enter(out: &mut Stdout) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut guard = Self { enhanced: false };

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            guard.enhanced = true;
        }

        tracing::debug!(release_events = guard.enhanced, "entered raw mode");
        Ok(guard)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = terminal::disable_raw_mode();
    }
}

fn echo(out: &mut impl Write, typed: char, feedback: Feedback) -> io::Result<()> {
    match feedback {
        Feedback::Incorrect if typed == ' ' => queue!(out, PrintStyledContent('_'.red())),
        Feedback::Incorrect => queue!(out, PrintStyledContent(typed.red())),
        _ => queue!(out, PrintStyledContent(typed.green())),
    }
}

/// Drive `session` from the keyboard until it ends or the user aborts.
///
/// `on_tick` runs after every poll, with or without input.
pub fn drive(
    session: &mut TypingSession,
    mut on_tick: impl FnMut(&TypingSession, Timestamp),
) -> Result<Exit, AppError> {
    let mut out = stdout();
    let _raw = RawMode::enter(&mut out)?;

    queue!(
        out,
        PrintStyledContent(session.target_text().dim()),
        Print("\r\n")
    )?;
    out.flush()?;

    loop {
        if event::poll(POLL_INTERVAL)? {
            let event = event::read()?;
            let now = cadence::now();

            match action(&event) {
                Action::Type(typed) => {
                    if let Some(feedback) = session.input_char(typed, Some(now)) {
                        echo(&mut out, typed, feedback)?;
                    }
                }
                Action::Release(released) => {
                    session.release_char(released, Some(now));
                }
                Action::Backspace => {
                    if session.backspace().is_some() {
                        queue!(out, Print("\u{8} \u{8}"))?;
                    }
                }
                Action::Abort => {
                    queue!(out, Print("\r\n"))?;
                    out.flush()?;
                    return Ok(Exit::Aborted);
                }
                Action::Ignore => {}
            }
            out.flush()?;
        }

        on_tick(session, cadence::now());

        if session.is_finished() {
            queue!(out, Print("\r\n"))?;
            out.flush()?;
            return Ok(Exit::Completed);
        }
    }
}

pub fn run(app: &mut App, lesson_id: Option<&str>, exam: bool) -> Result<(), AppError> {
    let lesson = app.lesson(lesson_id)?;
    let session_type = if exam {
        SessionType::Exam
    } else {
        SessionType::Practice
    };

    println!("{} ({session_type}) - <ESC> to quit", lesson.title.as_str().bold());
    let mut session = app.new_session(&lesson, session_type, false);

    if drive(&mut session, |_, _| {})? == Exit::Aborted {
        println!("Session abandoned");
        return Ok(());
    }

    let summary = app.record(&session, None);
    report::summary(&mut stdout(), &summary)?;
    Ok(())
}
