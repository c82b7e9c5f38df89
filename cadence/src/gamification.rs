//! # Gamification Module - Levels, XP and Badges
//!
//! Pure derivation of progression from finished sessions. The only state is the fixed level
//! curve: level `n` requires `floor(100 * 1.1^(n-1))` XP, for 100 levels. These thresholds
//! are published, so the base and rounding must not change.
//!
//! ```rust
//! use cadence::gamification::{level_for, xp_required};
//!
//! assert_eq!(xp_required(1), 100);
//! assert_eq!(xp_required(10), 235);
//! assert_eq!(level_for(0), 1);
//! assert_eq!(level_for(150), 5);
//! ```

mod badges;

pub use badges::{
    BADGES, Badge, BadgeCondition, LifetimeRequirement, Rarity, badge, check_badges,
    placeholder_badges,
};

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Number of levels on the curve
pub const MAX_LEVEL: u32 = 100;

const CURVE_BASE_XP: f64 = 100.0;
const CURVE_GROWTH: f64 = 1.1;

static LEVEL_CURVE: LazyLock<Vec<u64>> = LazyLock::new(|| {
    (1..=MAX_LEVEL)
        .map(|level| (CURVE_BASE_XP * CURVE_GROWTH.powi(level as i32 - 1)).floor() as u64)
        .collect()
});

/// Summary of a finished session, as far as progression is concerned
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub wpm: u32,
    pub accuracy: f64,
    pub duration_secs: f64,
    pub mistakes: usize,
    pub is_perfect: bool,
    /// Longest run of consecutive correct keystrokes
    pub combo: usize,
    pub consistency: f64,
    /// Keystrokes ingested
    pub chars: usize,
    pub weakest_keys: Vec<char>,
}

/// XP needed to reach `level`. Levels outside the curve are clamped onto it.
pub fn xp_required(level: u32) -> u64 {
    let index = level.clamp(1, MAX_LEVEL) as usize - 1;
    LEVEL_CURVE[index]
}

/// The highest level whose requirement is met by `xp`. Level 1 is the floor.
pub fn level_for(xp: u64) -> u32 {
    // Number of thresholds <= xp, the curve is strictly increasing
    let reached = LEVEL_CURVE.partition_point(|&required| required <= xp);
    (reached as u32).max(1)
}

/// Where a given XP total sits on the curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelInfo {
    pub level: u32,
    pub title: &'static str,
    pub xp_required: u64,
    /// `None` at the top of the curve
    pub next_level_xp: Option<u64>,
    /// 0.0 - 1.0 progress towards the next level
    pub progress: f64,
}

pub fn level_info(xp: u64) -> LevelInfo {
    let level = level_for(xp);
    let current = xp_required(level);
    let next_level_xp = (level < MAX_LEVEL).then(|| xp_required(level + 1));

    let progress = next_level_xp.map_or(1.0, |next| {
        // Below the first threshold, progress counts from 0 XP
        let floor = if xp < current { 0 } else { current };
        ((xp - floor) as f64 / (next - floor) as f64).clamp(0.0, 1.0)
    });

    LevelInfo {
        level,
        title: level_title(level),
        xp_required: current,
        next_level_xp,
        progress,
    }
}

/// Rank title for every band of ten levels
pub const fn level_title(level: u32) -> &'static str {
    match level {
        0..=9 => "Initiate",
        10..=19 => "Operator",
        20..=29 => "Specialist",
        30..=39 => "Technician",
        40..=49 => "Engineer",
        50..=59 => "Architect",
        60..=69 => "Vanguard",
        70..=79 => "Sentinel",
        80..=89 => "Virtuoso",
        _ => "Legend",
    }
}

/// XP earned by a single session.
///
/// One XP per WPM, +20 at 98% accuracy or better, another +50 for a perfect 100%, and +10 per
/// full minute of typing.
pub fn calculate_session_xp(stats: &SessionStats) -> u64 {
    let mut xp = f64::from(stats.wpm);

    if stats.accuracy >= 98.0 {
        xp += 20.0;
    }

    if stats.accuracy >= 100.0 {
        xp += 50.0;
    }

    xp += 10.0 * (stats.duration_secs.max(0.0) / 60.0).floor();

    xp.floor() as u64
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, 100)]
    #[case(2, 110)]
    #[case(5, 146)]
    #[case(10, 235)]
    fn published_thresholds(#[case] level: u32, #[case] xp: u64) {
        assert_eq!(xp_required(level), xp);
    }

    #[test]
    fn curve_is_strictly_increasing() {
        assert_eq!(LEVEL_CURVE.len(), MAX_LEVEL as usize);
        assert!(LEVEL_CURVE.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(50, 1)]
    #[case(100, 1)]
    #[case(110, 2)]
    #[case(150, 5)]
    #[case(u64::MAX, MAX_LEVEL)]
    fn levels_from_xp(#[case] xp: u64, #[case] level: u32) {
        assert_eq!(level_for(xp), level);
    }

    #[rstest]
    #[case(SessionStats { wpm: 30, accuracy: 95.0, duration_secs: 30.0, ..Default::default() }, 30)]
    #[case(SessionStats { wpm: 60, accuracy: 98.0, duration_secs: 60.0, ..Default::default() }, 90)]
    #[case(SessionStats { wpm: 60, accuracy: 100.0, duration_secs: 125.0, ..Default::default() }, 150)]
    #[case(SessionStats { wpm: 0, accuracy: 0.0, duration_secs: -5.0, ..Default::default() }, 0)]
    fn session_xp(#[case] stats: SessionStats, #[case] xp: u64) {
        assert_eq!(calculate_session_xp(&stats), xp);
    }

    #[test]
    fn level_info_reports_progress() {
        let info = level_info(0);
        assert_eq!(info.level, 1);
        assert_eq!(info.title, "Initiate");
        assert_eq!(info.next_level_xp, Some(110));
        assert_eq!(info.progress, 0.0);

        let info = level_info(105);
        assert_eq!(info.level, 1);
        assert!((info.progress - 0.5).abs() < 1e-9);

        let top = level_info(u64::MAX);
        assert_eq!(top.next_level_xp, None);
        assert_eq!(top.title, "Legend");
    }

    proptest! {
        #[test]
        fn level_is_monotonic_in_xp(a in 0u64..2_000_000, b in 0u64..2_000_000) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level_for(low) <= level_for(high));
            prop_assert!(level_for(low) >= 1);
        }
    }
}
