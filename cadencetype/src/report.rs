//! Plain-text rendering of results, progress and history.

use std::io::{self, Write};

use cadence::archive::{Archived, SessionRecord};
use cadence::ledger::ProgressLedger;
use cadence::lobby::{ArenaPlayer, RaceOutcome};
use cadence::session::SessionStatus;
use chrono::DateTime;
use crossterm::style::Stylize;

use crate::app::Summary;
use crate::lessons::Lessons;

pub fn summary(out: &mut impl Write, summary: &Summary) -> io::Result<()> {
    let stats = &summary.stats;

    match summary.status {
        SessionStatus::Failed => writeln!(out, "{}", "EXAM FAILED".red().bold())?,
        _ => writeln!(out, "{}", "SESSION COMPLETE".green().bold())?,
    }

    writeln!(
        out,
        "{} wpm  {:.1}% accuracy  {:.1}% consistency  {} mistakes  {:.1}s",
        stats.wpm, stats.accuracy, stats.consistency, stats.mistakes, stats.duration_secs
    )?;

    if !stats.weakest_keys.is_empty() {
        let keys: Vec<String> = stats.weakest_keys.iter().map(|key| format!("'{key}'")).collect();
        writeln!(out, "Weakest keys: {}", keys.join(" "))?;
    }

    let reward = &summary.reward;
    writeln!(
        out,
        "+{} XP ({} session, {} missions)",
        reward.total_xp(),
        reward.session_xp,
        reward.mission_xp
    )?;

    if reward.leveled_up() {
        writeln!(
            out,
            "{}",
            format!("LEVEL UP! {} -> {}", reward.level_before, reward.level_after).yellow()
        )?;
    }

    for badge in &reward.new_badges {
        writeln!(
            out,
            "Badge unlocked: {} [{}] - {}",
            badge.title.bold(),
            badge.rarity,
            badge.description
        )?;
    }

    for mission in &reward.completed_missions {
        writeln!(out, "Mission complete: {mission}")?;
    }

    match &summary.recommendation {
        Some(advice) => writeln!(out, "Coach: {advice}")?,
        None => writeln!(out, "Coach: no weak keys, push for speed")?,
    }

    if summary.archived == Archived::Dropped {
        writeln!(out, "{}", "Session could not be saved".red())?;
    }

    Ok(())
}

pub fn progress(out: &mut impl Write, ledger: &ProgressLedger) -> io::Result<()> {
    let progress = ledger.progress();
    let info = ledger.level_info();

    writeln!(out, "Level {} {}", info.level, info.title.bold())?;
    match info.next_level_xp {
        Some(next) => writeln!(
            out,
            "{} XP ({:.0}% towards {} XP)",
            progress.xp(),
            info.progress * 100.0,
            next
        )?,
        None => writeln!(out, "{} XP (max level)", progress.xp())?,
    }
    writeln!(
        out,
        "Streak: {} days (best {})",
        progress.current_streak(),
        progress.best_streak()
    )?;

    let lifetime = progress.lifetime();
    writeln!(
        out,
        "Sessions: {}  Keystrokes: {}  Best: {} wpm",
        lifetime.total_sessions, lifetime.total_keystrokes, lifetime.max_wpm
    )?;

    if !progress.daily_missions().is_empty() {
        writeln!(out, "\nDaily missions ({} XP today):", progress.daily_xp())?;
        for mission in progress.daily_missions() {
            let mark = if mission.completed { "x" } else { " " };
            writeln!(
                out,
                "  [{mark}] {} - {} ({}%, {} XP)",
                mission.title,
                mission.description,
                mission.progress_percent(),
                mission.xp_reward
            )?;
        }
    }

    writeln!(out, "\nBadges ({}):", progress.badges().len())?;
    for id in progress.badges() {
        match cadence::gamification::badge(id) {
            Some(badge) => writeln!(out, "  {} [{}]", badge.title, badge.rarity)?,
            None => writeln!(out, "  {id}")?,
        }
    }

    Ok(())
}

pub fn history(out: &mut impl Write, records: &[SessionRecord]) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No sessions yet. Run `cadencetype practice` to start one.");
    }

    for record in records {
        let when = DateTime::from_timestamp_millis(record.timestamp as i64)
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let race = match record.is_winner {
            Some(true) => " race, won",
            Some(false) => " race",
            None if record.is_race == Some(true) => " race",
            None => "",
        };

        writeln!(
            out,
            "{when}  {:>3} wpm  {:>5.1}%  {:<8} {}{race}",
            record.wpm,
            record.accuracy,
            record.mode.to_string(),
            record.lesson_id.as_deref().unwrap_or("-")
        )?;
    }

    Ok(())
}

pub fn lessons(out: &mut impl Write, lessons: &Lessons) -> io::Result<()> {
    if lessons.is_empty() {
        return writeln!(out, "No lessons found");
    }

    writeln!(out, "{} lessons (id, title, complexity)", lessons.len())?;
    for lesson in lessons.iter() {
        let complexity = lesson.complexity();
        writeln!(
            out,
            "{:<12} {:<20} {:>3} {}",
            lesson.id, lesson.title, complexity.score, complexity.phase
        )?;
    }
    Ok(())
}

pub fn standings(out: &mut impl Write, players: &[&ArenaPlayer], outcome: Option<RaceOutcome>) -> io::Result<()> {
    match outcome {
        Some(RaceOutcome { winner: true, .. }) => writeln!(out, "{}", "VICTORY".green().bold())?,
        Some(RaceOutcome { rank, .. }) => writeln!(out, "Finished #{rank}")?,
        None => writeln!(out, "Did not finish")?,
    }

    for player in players {
        let place = player
            .rank
            .map_or_else(|| "--".to_string(), |rank| format!("#{rank}"));
        writeln!(
            out,
            "  {place:<3} {:<12} {:>3} wpm  {:>3}%",
            player.name, player.wpm, player.progress
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use cadence::coach::Recommendation;
    use cadence::gamification::{SessionStats, badge};
    use cadence::ledger::SessionReward;
    use cadence::session::SessionType;

    use super::*;

    fn render(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn summary_lists_rewards() {
        let summary = Summary {
            status: SessionStatus::Finished,
            stats: SessionStats {
                wpm: 64,
                accuracy: 99.5,
                weakest_keys: vec!['q'],
                ..SessionStats::default()
            },
            reward: SessionReward {
                session_xp: 84,
                mission_xp: 25,
                level_before: 1,
                level_after: 2,
                new_badges: badge("init_link").into_iter().collect(),
                completed_missions: vec!["daily_warmup".to_string()],
            },
            archived: Archived::Local,
            recommendation: Some(Recommendation {
                focus_keys: vec!['q', 'z'],
                lesson_id: Some("pangrams".to_string()),
            }),
        };

        let text = render(|out| super::summary(out, &summary));

        assert!(text.contains("64 wpm"));
        assert!(text.contains("+109 XP"));
        assert!(text.contains("LEVEL UP! 1 -> 2"));
        assert!(text.contains("Link Established"));
        assert!(text.contains("'q'"));
        assert!(text.contains("daily_warmup"));
        assert!(text.contains("Coach: Focus on 'Q' 'Z', try lesson pangrams"));
    }

    #[test]
    fn empty_history_hints_at_practice() {
        let text = render(|out| history(out, &[]));
        assert!(text.contains("cadencetype practice"));
    }

    #[test]
    fn history_marks_races() {
        let record = SessionRecord {
            wpm: 72,
            accuracy: 97.25,
            error_count: 3,
            consistency: 80.0,
            weakest_keys: Vec::new(),
            timestamp: 1_700_000_000_000,
            mode: SessionType::Practice,
            lesson_id: Some("pangrams".to_string()),
            is_race: Some(true),
            is_winner: Some(true),
        };

        let text = render(|out| history(out, &[record]));

        assert!(text.contains("2023-11-14"));
        assert!(text.contains(" 72 wpm"));
        assert!(text.contains("pangrams race, won"));
    }

    #[test]
    fn unfinished_players_have_no_place() {
        let mut winner = ArenaPlayer::joining("a", "ada");
        winner.rank = Some(1);
        winner.progress = 100;
        let straggler = ArenaPlayer::joining("b", "bob");

        let text = render(|out| {
            standings(
                out,
                &[&winner, &straggler],
                Some(RaceOutcome {
                    rank: 1,
                    winner: true,
                }),
            )
        });

        assert!(text.contains("#1  ada"));
        assert!(text.contains("--  bob"));
    }
}
