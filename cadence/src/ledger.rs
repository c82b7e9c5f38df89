//! # Ledger Module - Durable progression state
//!
//! [ProgressLedger] is the single mutable aggregate of a user's XP, level, streak, badges and
//! daily missions. It only changes through [ProgressLedger::add_session], [ProgressLedger::check_streak]
//! and cross-device [ProgressLedger::hydrate], each one a complete transition on `&mut self`.
//!
//! The level is never stored independently: it is recomputed from XP after every change, and XP
//! only grows locally, so neither can regress outside of hydration.
//!
//! [ProgressStore] is the persistence boundary: load once at start-up, save after every
//! mutating call.

use std::{collections::BTreeSet, rc::Rc};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::gamification::{self, Badge, SessionStats};
use crate::missions::{self, Mission};
use crate::store::{self, LocalCache};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeStats {
    pub total_sessions: u64,
    pub total_keystrokes: u64,
    pub max_wpm: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProgress {
    xp: u64,
    level: u32,
    current_streak: u32,
    best_streak: u32,
    last_practice_date: Option<NaiveDateTime>,
    badges: BTreeSet<String>,
    daily_xp: u64,
    missions_date: Option<NaiveDate>,
    daily_missions: Vec<Mission>,
    lifetime: LifetimeStats,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            current_streak: 0,
            best_streak: 0,
            last_practice_date: None,
            badges: BTreeSet::new(),
            daily_xp: 0,
            missions_date: None,
            daily_missions: Vec::new(),
            lifetime: LifetimeStats::default(),
        }
    }
}

impl UserProgress {
    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    pub fn last_practice_date(&self) -> Option<NaiveDateTime> {
        self.last_practice_date
    }

    pub fn badges(&self) -> &BTreeSet<String> {
        &self.badges
    }

    pub fn daily_xp(&self) -> u64 {
        self.daily_xp
    }

    pub fn daily_missions(&self) -> &[Mission] {
        &self.daily_missions
    }

    pub fn lifetime(&self) -> &LifetimeStats {
        &self.lifetime
    }
}

/// The remote copy of a user's progress, as stored at `users/{uid}/progress/main`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub xp: u64,
    pub level: u32,
    pub badges: Vec<String>,
    pub lifetime_stats: LifetimeStats,
}

/// What a single session earned
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReward {
    /// XP from the session itself
    pub session_xp: u64,
    /// XP from missions the session completed
    pub mission_xp: u64,
    pub level_before: u32,
    pub level_after: u32,
    pub new_badges: Vec<&'static Badge>,
    pub completed_missions: Vec<String>,
}

impl SessionReward {
    pub fn total_xp(&self) -> u64 {
        self.session_xp + self.mission_xp
    }

    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgressLedger {
    progress: UserProgress,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_progress(progress: UserProgress) -> Self {
        Self { progress }
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn level_info(&self) -> gamification::LevelInfo {
        gamification::level_info(self.progress.xp)
    }

    /// Fold a finished session into the ledger.
    ///
    /// Session XP, mission XP, badge unlocks, mission progress and lifetime stats are applied
    /// together. `now` is local wall-clock time, used to roll daily missions over.
    pub fn add_session(&mut self, stats: &SessionStats, now: NaiveDateTime) -> SessionReward {
        self.roll_missions(now.date());

        let level_before = self.progress.level;
        let session_xp = gamification::calculate_session_xp(stats);

        let new_badges = gamification::check_badges(stats, &self.progress.badges);
        self.progress
            .badges
            .extend(new_badges.iter().map(|badge| badge.id.to_string()));

        let mut mission_xp = 0;
        let mut completed_missions = Vec::new();
        for mission in &mut self.progress.daily_missions {
            if mission.apply(stats) {
                mission_xp += mission.xp_reward;
                completed_missions.push(mission.id.clone());
            }
        }

        let gained = session_xp + mission_xp;
        self.progress.xp += gained;
        self.progress.daily_xp += gained;
        self.progress.level = gamification::level_for(self.progress.xp);

        let lifetime = &mut self.progress.lifetime;
        lifetime.total_sessions += 1;
        lifetime.total_keystrokes += stats.chars as u64;
        lifetime.max_wpm = lifetime.max_wpm.max(stats.wpm);

        let reward = SessionReward {
            session_xp,
            mission_xp,
            level_before,
            level_after: self.progress.level,
            new_badges,
            completed_missions,
        };

        debug!(
            xp = self.progress.xp,
            gained,
            badges = reward.new_badges.len(),
            missions = reward.completed_missions.len(),
            "session added to ledger"
        );
        if reward.leveled_up() {
            info!(level = reward.level_after, "level up");
        }

        reward
    }

    /// Update the practice streak for a session at `now`, by calendar day
    pub fn check_streak(&mut self, now: NaiveDateTime) {
        let progress = &mut self.progress;

        let elapsed_days = progress
            .last_practice_date
            .map(|last| (now.date() - last.date()).num_days());

        match elapsed_days {
            // Clock moved backwards
            Some(days) if days < 0 => return,
            Some(0) => {}
            Some(1) => progress.current_streak += 1,
            _ => progress.current_streak = 1,
        }

        progress.best_streak = progress.best_streak.max(progress.current_streak);
        progress.last_practice_date = Some(now);
    }

    /// Replace the daily missions when the calendar day changed
    pub fn roll_missions(&mut self, today: NaiveDate) {
        if self.progress.missions_date == Some(today) {
            return;
        }

        debug!(%today, "rolling daily missions");
        self.progress.missions_date = Some(today);
        self.progress.daily_missions = missions::generate_daily_missions(today);
        self.progress.daily_xp = 0;
    }

    /// Adopt a remote copy of the ledger.
    ///
    /// Last write wins for XP, level and lifetime stats. Badges are merged, never removed.
    pub fn hydrate(&mut self, remote: ProgressRecord) {
        info!(
            local_xp = self.progress.xp,
            remote_xp = remote.xp,
            "hydrating ledger from remote"
        );

        self.progress.xp = remote.xp;
        self.progress.level = remote.level.max(1);
        self.progress.lifetime = remote.lifetime_stats;
        self.progress.badges.extend(remote.badges);
    }

    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord {
            xp: self.progress.xp,
            level: self.progress.level,
            badges: self.progress.badges.iter().cloned().collect(),
            lifetime_stats: self.progress.lifetime,
        }
    }
}

/// Serialize-on-change, deserialize-on-start boundary for the ledger
#[derive(Debug, Clone)]
pub struct ProgressStore {
    cache: Rc<dyn LocalCache>,
}

impl ProgressStore {
    pub const KEY: &str = "progress";

    pub fn new(cache: Rc<dyn LocalCache>) -> Self {
        Self { cache }
    }

    /// The persisted ledger, or a fresh one when nothing usable is stored
    pub fn load(&self) -> ProgressLedger {
        match store::load::<UserProgress>(self.cache.as_ref(), Self::KEY) {
            Ok(Some(progress)) => ProgressLedger::from_progress(progress),
            Ok(None) => ProgressLedger::new(),
            Err(error) => {
                warn!(%error, "failed to load progress, starting fresh");
                ProgressLedger::new()
            }
        }
    }

    /// Persist `ledger`. Failures are logged and the in-memory ledger stays authoritative.
    pub fn save(&self, ledger: &ProgressLedger) -> bool {
        match store::save(self.cache.as_ref(), Self::KEY, ledger.progress()) {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "failed to persist progress");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;
    use crate::store::{FileCache, MemoryCache};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn stats(wpm: u32, accuracy: f64, duration_secs: f64) -> SessionStats {
        SessionStats {
            wpm,
            accuracy,
            duration_secs,
            mistakes: usize::from(accuracy < 100.0),
            is_perfect: accuracy >= 100.0,
            chars: 50,
            ..Default::default()
        }
    }

    #[test]
    fn add_session_pays_out_and_levels() {
        let mut ledger = ProgressLedger::new();
        let reward = ledger.add_session(&stats(45, 98.5, 30.0), at(1, 9));

        assert_eq!(reward.session_xp, 65);
        assert_eq!(reward.level_before, 1);
        assert!(reward.new_badges.iter().any(|badge| badge.id == "velocity_mk1"));

        let progress = ledger.progress();
        assert_eq!(progress.xp(), reward.total_xp());
        assert_eq!(progress.level(), gamification::level_for(progress.xp()));
        assert_eq!(progress.daily_xp(), reward.total_xp());
        assert_eq!(progress.lifetime().total_sessions, 1);
        assert_eq!(progress.lifetime().max_wpm, 45);
        assert!(progress.badges().contains("velocity_mk1"));
    }

    #[test]
    fn badges_are_only_awarded_once() {
        let mut ledger = ProgressLedger::new();
        ledger.add_session(&stats(45, 98.5, 30.0), at(1, 9));
        let again = ledger.add_session(&stats(45, 98.5, 30.0), at(1, 10));

        assert!(again.new_badges.is_empty());
    }

    #[test]
    fn missions_roll_over_with_the_day() {
        let mut ledger = ProgressLedger::new();
        ledger.add_session(&stats(20, 90.0, 10.0), at(1, 9));
        let first_day: Vec<_> = ledger
            .progress()
            .daily_missions()
            .iter()
            .map(|mission| mission.id.clone())
            .collect();
        assert_eq!(first_day.len(), missions::DAILY_MISSION_COUNT);

        ledger.add_session(&stats(20, 90.0, 10.0), at(2, 9));
        assert_eq!(
            ledger.progress().daily_missions(),
            {
                let mut fresh = missions::generate_daily_missions(at(2, 9).date());
                for mission in &mut fresh {
                    mission.apply(&stats(20, 90.0, 10.0));
                }
                fresh
            }
            .as_slice()
        );
    }

    #[test]
    fn completed_missions_grant_xp() {
        let mut ledger = ProgressLedger::new();
        let reward = ledger.add_session(&stats(200, 100.0, 600.0), at(1, 9));

        let expected: u64 = ledger
            .progress()
            .daily_missions()
            .iter()
            .filter(|mission| mission.completed)
            .map(|mission| mission.xp_reward)
            .sum();
        assert_eq!(reward.mission_xp, expected);
        assert_eq!(ledger.progress().xp(), reward.session_xp + expected);
    }

    #[test]
    fn streak_counts_calendar_days() {
        let mut ledger = ProgressLedger::new();

        ledger.check_streak(at(1, 23));
        assert_eq!(ledger.progress().current_streak(), 1);

        // Same day, later
        ledger.check_streak(at(1, 23));
        assert_eq!(ledger.progress().current_streak(), 1);

        // Next calendar day, only an hour later
        ledger.check_streak(at(2, 0));
        assert_eq!(ledger.progress().current_streak(), 2);
        assert_eq!(ledger.progress().best_streak(), 2);
        assert_eq!(ledger.progress().last_practice_date(), Some(at(2, 0)));

        // Skipped a day
        ledger.check_streak(at(4, 12));
        assert_eq!(ledger.progress().current_streak(), 1);
        assert_eq!(ledger.progress().best_streak(), 2);
    }

    #[test]
    fn hydrate_unions_badges() {
        let mut ledger = ProgressLedger::new();
        ledger.add_session(&stats(45, 98.5, 30.0), at(1, 9));

        ledger.hydrate(ProgressRecord {
            xp: 5_000,
            level: gamification::level_for(5_000),
            badges: vec!["god_hand".into()],
            lifetime_stats: LifetimeStats {
                total_sessions: 40,
                total_keystrokes: 9_000,
                max_wpm: 130,
            },
        });

        let progress = ledger.progress();
        assert_eq!(progress.xp(), 5_000);
        assert_eq!(progress.level(), gamification::level_for(5_000));
        assert!(progress.badges().contains("god_hand"));
        assert!(progress.badges().contains("velocity_mk1"));
        assert_eq!(ledger.to_record().badges.len(), progress.badges().len());
    }

    #[test]
    fn store_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache: Rc<dyn LocalCache> = Rc::new(FileCache::new(dir.path().to_path_buf()).unwrap());
        let store = ProgressStore::new(cache.clone());

        let mut ledger = store.load();
        assert_eq!(ledger, ProgressLedger::new());

        ledger.check_streak(at(1, 9));
        ledger.add_session(&stats(45, 98.5, 30.0), at(1, 9));
        assert!(store.save(&ledger));

        assert_eq!(ProgressStore::new(cache).load(), ledger);
    }

    #[test]
    fn corrupt_store_starts_fresh() {
        let cache = Rc::new(MemoryCache::new());
        cache
            .store(ProgressStore::KEY, &serde_json::json!({"xp": "lots"}))
            .unwrap();
        assert_eq!(ProgressStore::new(cache).load(), ProgressLedger::new());
    }

    proptest! {
        #[test]
        fn add_session_is_monotonic(
            sessions in prop::collection::vec((0_u32..250, 0.0_f64..=100.0, 0.0_f64..900.0), 1..20)
        ) {
            let mut ledger = ProgressLedger::new();
            for (i, (wpm, accuracy, duration)) in sessions.into_iter().enumerate() {
                let before = ledger.progress().clone();
                ledger.add_session(&stats(wpm, accuracy, duration), at(1 + (i as u32 % 20), 12));
                let after = ledger.progress();

                prop_assert!(after.xp() >= before.xp());
                prop_assert!(after.level() >= before.level());
                prop_assert!(after.badges().is_superset(before.badges()));
                prop_assert_eq!(after.level(), gamification::level_for(after.xp()));
            }
        }
    }
}
