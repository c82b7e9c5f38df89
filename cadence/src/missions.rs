//! Daily missions: small goals that roll over every calendar day and pay out bonus XP.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::gamification::SessionStats;

/// Accuracy a session needs to count towards an accuracy mission
pub const MISSION_ACCURACY: f64 = 98.0;

/// Missions handed out per day
pub const DAILY_MISSION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MissionKind {
    /// Characters typed, accumulated
    Chars,
    /// Seconds typed, accumulated
    Time,
    /// A single session at or above the target WPM
    Wpm,
    /// Sessions at or above [MISSION_ACCURACY]
    Accuracy,
    /// Finished sessions
    Sessions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: MissionKind,
    pub target: u64,
    pub current: u64,
    pub xp_reward: u64,
    pub completed: bool,
}

impl Mission {
    /// Apply a finished session. Returns true if this session completed the mission.
    ///
    /// Completed missions are frozen and never re-evaluated.
    pub fn apply(&mut self, stats: &SessionStats) -> bool {
        if self.completed {
            return false;
        }

        self.current = match self.kind {
            MissionKind::Wpm if u64::from(stats.wpm) >= self.target => self.target,
            MissionKind::Wpm => self.current,
            MissionKind::Accuracy if stats.accuracy >= MISSION_ACCURACY => self.current + 1,
            MissionKind::Accuracy => self.current,
            MissionKind::Chars => (self.current + stats.chars as u64).min(self.target),
            MissionKind::Time => {
                (self.current + stats.duration_secs.max(0.0).floor() as u64).min(self.target)
            }
            MissionKind::Sessions => self.current + 1,
        };

        self.completed = self.current >= self.target;
        self.completed
    }

    /// Progress in percent, 0 - 100
    pub fn progress_percent(&self) -> u8 {
        if self.target == 0 {
            return 0;
        }
        ((self.current as f64 / self.target as f64) * 100.0)
            .round()
            .min(100.0) as u8
    }
}

struct Template {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    kind: MissionKind,
    target: u64,
    xp_reward: u64,
}

const TEMPLATES: [Template; 6] = [
    Template {
        id: "daily_warmup",
        title: "Warm-up Burst",
        description: "Complete 1 session",
        kind: MissionKind::Sessions,
        target: 1,
        xp_reward: 30,
    },
    Template {
        id: "daily_velocity",
        title: "Velocity Goal",
        description: "Reach 60 WPM in any session",
        kind: MissionKind::Wpm,
        target: 60,
        xp_reward: 75,
    },
    Template {
        id: "daily_precision",
        title: "Precision Run",
        description: "Finish a session with 98% accuracy",
        kind: MissionKind::Accuracy,
        target: 1,
        xp_reward: 50,
    },
    Template {
        id: "daily_chars",
        title: "Character Crusher",
        description: "Type 1,000 characters total",
        kind: MissionKind::Chars,
        target: 1000,
        xp_reward: 60,
    },
    Template {
        id: "daily_drills",
        title: "Drill Master",
        description: "Complete 3 sessions",
        kind: MissionKind::Sessions,
        target: 3,
        xp_reward: 100,
    },
    Template {
        id: "daily_focus",
        title: "Deep Focus",
        description: "Practice for 10 minutes",
        kind: MissionKind::Time,
        target: 600,
        xp_reward: 40,
    },
];

/// The missions for `date`. The same date always yields the same missions.
pub fn generate_daily_missions(date: NaiveDate) -> Vec<Mission> {
    let offset = date.num_days_from_ce().unsigned_abs() as usize % TEMPLATES.len();

    TEMPLATES
        .iter()
        .cycle()
        .skip(offset)
        .take(DAILY_MISSION_COUNT)
        .map(|template| Mission {
            id: template.id.to_string(),
            title: template.title.to_string(),
            description: template.description.to_string(),
            kind: template.kind,
            target: template.target,
            current: 0,
            xp_reward: template.xp_reward,
            completed: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn mission(kind: MissionKind, target: u64) -> Mission {
        Mission {
            id: "test".into(),
            title: "Test".into(),
            description: String::new(),
            kind,
            target,
            current: 0,
            xp_reward: 10,
            completed: false,
        }
    }

    fn stats(wpm: u32, accuracy: f64, chars: usize, duration_secs: f64) -> SessionStats {
        SessionStats {
            wpm,
            accuracy,
            chars,
            duration_secs,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(MissionKind::Wpm, 60, stats(60, 90.0, 10, 5.0), true)]
    #[case(MissionKind::Wpm, 60, stats(59, 100.0, 10, 5.0), false)]
    #[case(MissionKind::Accuracy, 1, stats(10, 98.0, 10, 5.0), true)]
    #[case(MissionKind::Accuracy, 1, stats(200, 97.9, 10, 5.0), false)]
    #[case(MissionKind::Sessions, 1, stats(0, 0.0, 0, 0.0), true)]
    #[case(MissionKind::Chars, 100, stats(50, 95.0, 99, 5.0), false)]
    #[case(MissionKind::Time, 60, stats(50, 95.0, 99, 61.5), true)]
    fn single_session(
        #[case] kind: MissionKind,
        #[case] target: u64,
        #[case] session: SessionStats,
        #[case] completes: bool,
    ) {
        let mut mission = mission(kind, target);
        assert_eq!(mission.apply(&session), completes);
        assert_eq!(mission.completed, completes);
    }

    #[test]
    fn accumulating_missions_clamp() {
        let mut chars = mission(MissionKind::Chars, 100);
        assert!(!chars.apply(&stats(40, 95.0, 70, 10.0)));
        assert_eq!(chars.progress_percent(), 70);
        assert!(chars.apply(&stats(40, 95.0, 70, 10.0)));
        assert_eq!(chars.current, 100);
        assert_eq!(chars.progress_percent(), 100);
    }

    #[test]
    fn completed_missions_are_frozen() {
        let mut sessions = mission(MissionKind::Sessions, 1);
        assert!(sessions.apply(&SessionStats::default()));
        assert!(!sessions.apply(&SessionStats::default()));
        assert_eq!(sessions.current, 1);
    }

    #[test]
    fn daily_missions_are_deterministic() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let first = generate_daily_missions(day);
        assert_eq!(first.len(), DAILY_MISSION_COUNT);
        assert_eq!(first, generate_daily_missions(day));

        let next = generate_daily_missions(day.succ_opt().unwrap());
        assert_ne!(first[0].id, next[0].id);
    }
}
