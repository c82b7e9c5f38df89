use std::rc::Rc;

use cadence::archive::{Archived, SessionArchive, SessionRecord};
use cadence::coach::{self, Recommendation};
use cadence::gamification::SessionStats;
use cadence::ledger::{ProgressLedger, ProgressStore, SessionReward};
use cadence::session::{CounterEngine, SessionStatus, SessionType, select_stats_engine};
use cadence::store::{FileCache, LocalCache, MemoryDocumentStore, StaticAuth};
use cadence::TypingSession;
use chrono::Local;
use tracing::info;

use crate::config::{Config, Engine};
use crate::error::AppError;
use crate::lessons::{DEFAULT_LESSON, Lesson};

pub const CACHE_DIR: &str = "cache";

/// Everything a finished session produced
#[derive(Debug)]
pub struct Summary {
    pub status: SessionStatus,
    pub stats: SessionStats,
    pub reward: SessionReward,
    pub archived: Archived,
    /// None when no key stood out
    pub recommendation: Option<Recommendation>,
}

/// Services shared by every command, constructed once at start-up
#[derive(Debug)]
pub struct App {
    config: Config,
    progress: ProgressStore,
    ledger: ProgressLedger,
    archive: SessionArchive,
}

impl App {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let cache: Rc<dyn LocalCache> =
            Rc::new(FileCache::new(config.data_dir.join(CACHE_DIR))?);

        let progress = ProgressStore::new(cache.clone());
        let ledger = progress.load();

        // No account backend in the terminal, sessions land in the local history
        let archive = SessionArchive::new(
            Rc::new(MemoryDocumentStore::new()),
            Rc::new(StaticAuth::new()),
            cache,
            config.settings.session.local_history_limit,
        );

        info!(
            xp = ledger.progress().xp(),
            level = ledger.progress().level(),
            engine = %config.settings.engine,
            "started"
        );

        Ok(Self {
            config,
            progress,
            ledger,
            archive,
        })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub const fn archive(&self) -> &SessionArchive {
        &self.archive
    }

    pub fn lesson(&self, id: Option<&str>) -> Result<Lesson, AppError> {
        let id = id.unwrap_or(DEFAULT_LESSON);
        self.config
            .lessons
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::UnknownLesson(id.to_string()))
    }

    pub fn new_session(&self, lesson: &Lesson, session_type: SessionType, is_race: bool) -> TypingSession {
        let stats = match self.config.settings.engine {
            Engine::Local => select_stats_engine::<CounterEngine>(None),
            Engine::Native => select_stats_engine(Some(CounterEngine::default())),
        };

        let mut session =
            TypingSession::new(self.config.settings.session.clone()).with_stats_engine(stats);
        session.set_text(&lesson.text, session_type, Some(&lesson.id), is_race);
        session
    }

    /// Fold a finished session into progression, persist it and archive it
    pub fn record(&mut self, session: &TypingSession, winner: Option<bool>) -> Summary {
        let now = cadence::now();
        let local_time = Local::now().naive_local();
        let stats = session.session_stats(now);

        self.ledger.check_streak(local_time);
        let reward = self.ledger.add_session(&stats, local_time);
        self.progress.save(&self.ledger);

        let mut record = SessionRecord::from_session(session, now);
        if let Some(winner) = winner {
            record = record.with_winner(winner);
        }
        let archived = self.archive.save(record);

        let weaknesses = coach::analyze_weaknesses(session.keystrokes());
        let lessons = self
            .config
            .lessons
            .iter()
            .map(|lesson| (lesson.id.as_str(), lesson.text.as_str()));
        let recommendation = coach::recommend(&weaknesses, lessons);

        Summary {
            status: session.status(),
            stats,
            reward,
            archived,
            recommendation,
        }
    }
}
