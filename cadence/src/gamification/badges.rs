use std::collections::BTreeSet;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

use super::SessionStats;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, EnumIter, Serialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// Lifetime statistics a badge can depend on, but that a single session cannot provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum LifetimeRequirement {
    LevelMilestone,
    BossRuns,
    LifetimeConsistency,
    /// Returning after a seven day break
    Comeback,
}

/// What a session has to show to unlock a badge
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BadgeCondition {
    /// Any finished session
    AnySession,
    MinWpm(u32),
    MinAccuracy(f64),
    WpmWithAccuracy { wpm: u32, accuracy: f64 },
    /// No mistakes at all
    Perfect,
    MinDurationSecs(u32),
    MinCombo(usize),
    /// Not yet implemented: never unlockable from session stats
    Placeholder(LifetimeRequirement),
}

impl BadgeCondition {
    pub fn is_met(&self, stats: &SessionStats) -> bool {
        match *self {
            Self::AnySession => true,
            Self::MinWpm(wpm) => stats.wpm >= wpm,
            Self::MinAccuracy(accuracy) => stats.accuracy >= accuracy,
            Self::WpmWithAccuracy { wpm, accuracy } => {
                stats.wpm >= wpm && stats.accuracy >= accuracy
            }
            Self::Perfect => stats.is_perfect,
            Self::MinDurationSecs(secs) => stats.duration_secs >= f64::from(secs),
            Self::MinCombo(combo) => stats.combo >= combo,
            Self::Placeholder(_) => false,
        }
    }

    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub condition: BadgeCondition,
}

macro_rules! badge {
    ($id:literal, $title:literal, $description:literal, $rarity:ident, $condition:expr) => {
        Badge {
            id: $id,
            title: $title,
            description: $description,
            rarity: Rarity::$rarity,
            condition: $condition,
        }
    };
}

pub static BADGES: &[Badge] = &[
    // Common
    badge!("init_link", "Link Established", "Complete your first session.", Common, BadgeCondition::AnySession),
    badge!("steady_hand", "Steady Hand", "Achieve 98% accuracy in a session.", Common, BadgeCondition::MinAccuracy(98.0)),
    badge!("warmed_up", "Warmed Up", "Type for a full minute.", Common, BadgeCondition::MinDurationSecs(60)),
    // Rare
    badge!("velocity_mk1", "Velocity MK-I", "Reach 40 WPM.", Rare, BadgeCondition::MinWpm(40)),
    badge!("flawless", "Flawless", "Finish a session without a single mistake.", Rare, BadgeCondition::Perfect),
    badge!("combo_50", "Chain Reaction", "Type 50 correct keys in a row.", Rare, BadgeCondition::MinCombo(50)),
    badge!("level_milestone", "Ascendant", "Reach a level milestone.", Rare, BadgeCondition::Placeholder(LifetimeRequirement::LevelMilestone)),
    // Epic
    badge!("velocity_mk2", "Velocity MK-II", "Reach 80 WPM.", Epic, BadgeCondition::MinWpm(80)),
    badge!("precision_engineer", "Precision Engineer", "Hold 99% accuracy at 60 WPM or more.", Epic, BadgeCondition::WpmWithAccuracy { wpm: 60, accuracy: 99.0 }),
    badge!("combo_150", "Overdrive", "Type 150 correct keys in a row.", Epic, BadgeCondition::MinCombo(150)),
    badge!("endurance", "Endurance Model", "Type for ten minutes in one session.", Epic, BadgeCondition::MinDurationSecs(600)),
    badge!("boss_slayer", "Boss Slayer", "Clear boss runs.", Epic, BadgeCondition::Placeholder(LifetimeRequirement::BossRuns)),
    badge!("comeback", "Comeback", "Return after a seven day break.", Epic, BadgeCondition::Placeholder(LifetimeRequirement::Comeback)),
    // Legendary
    badge!("velocity_mk3", "Velocity MK-III", "Reach 120 WPM.", Legendary, BadgeCondition::MinWpm(120)),
    badge!("god_hand", "God Hand", "Reach 100 WPM with 100% accuracy.", Legendary, BadgeCondition::WpmWithAccuracy { wpm: 100, accuracy: 100.0 }),
    badge!("metronome", "Metronome", "Keep a steady rhythm across sessions.", Legendary, BadgeCondition::Placeholder(LifetimeRequirement::LifetimeConsistency)),
];

/// Look up a badge by id
pub fn badge(id: &str) -> Option<&'static Badge> {
    BADGES.iter().find(|badge| badge.id == id)
}

/// Badges waiting on lifetime bookkeeping that does not exist yet
pub fn placeholder_badges() -> impl Iterator<Item = &'static Badge> {
    BADGES.iter().filter(|badge| badge.condition.is_placeholder())
}

/// Badges unlocked by `stats` that are not in `unlocked` yet, in catalog order
pub fn check_badges(stats: &SessionStats, unlocked: &BTreeSet<String>) -> Vec<&'static Badge> {
    BADGES
        .iter()
        .filter(|badge| !unlocked.contains(badge.id))
        .filter(|badge| badge.condition.is_met(stats))
        .collect()
}
