use std::io::stdout;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use cadence::lobby::{LobbyClient, LobbyEvent, MatchStatus, RaceOutcome};
use cadence::realtime::MemoryRealtime;
use cadence::session::{SessionStatus, SessionType};
use cadence::store::Identity;
use cadence::{Configuration, Timestamp};
use crossterm::style::Stylize;
use tracing::{info, warn};

use crate::app::App;
use crate::error::AppError;
use crate::practice::{self, Exit};
use crate::report;

pub const MAX_BOTS: usize = 5;

const PLAYER_UID: &str = "local-player";
const BOT_NAMES: [&str; MAX_BOTS] = ["ghost", "tapper", "clacker", "swift", "zenith"];
const BOT_BASE_WPM: u32 = 30;
const BOT_WPM_STEP: u32 = 15;
const TICK: Duration = Duration::from_millis(50);
/// Waiting for opponents after our own finish is capped
const FINISH_GRACE_MS: u64 = 60_000;

/// Share of a text a typist at `wpm` covers after `elapsed_ms`, and whether they are done
pub fn simulated_progress(wpm: u32, text_len: usize, elapsed_ms: u64) -> (u8, bool) {
    if text_len == 0 {
        return (100, true);
    }

    let typed = elapsed_ms as f64 * f64::from(wpm) * 5.0 / 60_000.0;
    let share = (typed / text_len as f64).min(1.0);
    ((share * 100.0).floor() as u8, share >= 1.0)
}

/// A simulated opponent typing at a fixed speed
struct Bot {
    client: LobbyClient,
    wpm: u32,
    text_len: usize,
    started_at: Option<Timestamp>,
}

impl Bot {
    fn join(
        hub: &MemoryRealtime,
        index: usize,
        lobby_id: &str,
        config: &Configuration,
        text_len: usize,
        now: Timestamp,
    ) -> Result<Self, AppError> {
        let name = BOT_NAMES[index % MAX_BOTS];
        let mut client = LobbyClient::new(
            Rc::new(hub.connect()),
            Identity::new(format!("bot-{index}"), name),
            config.clone(),
        );
        client.join(lobby_id, now)?;
        client.mark_ready(now)?;

        Ok(Self {
            client,
            wpm: BOT_BASE_WPM + BOT_WPM_STEP * index as u32,
            text_len,
            started_at: None,
        })
    }

    fn step(&mut self, now: Timestamp) {
        self.client.pump(now);
        self.client.tick(now);

        if self.started_at.is_none() && self.client.match_status() != MatchStatus::Racing {
            return;
        }

        let started_at = *self.started_at.get_or_insert(now);
        let elapsed = now.saturating_sub(started_at);
        let (progress, done) = simulated_progress(self.wpm, self.text_len, elapsed);
        let status = if done {
            SessionStatus::Finished
        } else {
            SessionStatus::Running
        };

        if let Err(error) = self.client.sync_progress(progress, self.wpm, status, now) {
            warn!(%error, uid = %self.client.identity().uid, "bot failed to sync");
        }
    }
}

fn race_outcome(events: Vec<LobbyEvent>, outcome: &mut Option<RaceOutcome>) {
    for event in events {
        if let LobbyEvent::RaceFinished(finished) = event {
            *outcome = Some(finished);
        }
    }
}

pub fn run(app: &mut App, lesson_id: Option<&str>, bots: usize) -> Result<(), AppError> {
    let lesson = app.lesson(lesson_id)?;
    let config = app.config().settings.session.clone();
    let text_len = lesson.text.chars().count();

    let hub = MemoryRealtime::new();
    let identity = Identity::new(PLAYER_UID, app.config().settings.player_name.clone());
    let mut host = LobbyClient::new(Rc::new(hub.connect()), identity, config.clone());

    let now = cadence::now();
    let lobby_id = host.host(&lesson.id, now)?;
    let mut bots = (0..bots.min(MAX_BOTS))
        .map(|index| Bot::join(&hub, index, &lobby_id, &config, text_len, now))
        .collect::<Result<Vec<_>, _>>()?;
    host.mark_ready(now)?;
    host.pump(now);
    info!(lobby = %lobby_id, bots = bots.len(), lesson = %lesson.id, "race lobby ready");

    println!(
        "{} - lobby {lobby_id}, {} opponents",
        lesson.title.as_str().bold(),
        bots.len()
    );

    host.start_countdown(cadence::now())?;
    let mut shown = None;
    while host.match_status() != MatchStatus::Racing {
        let now = cadence::now();
        host.tick(now);
        host.pump(now);
        bots.iter_mut().for_each(|bot| bot.step(now));

        let remaining = host.countdown_remaining(now);
        if let Some(seconds) = remaining
            && remaining != shown
        {
            println!("{seconds}...");
            shown = remaining;
        }
        thread::sleep(TICK);
    }
    println!("{}", "GO!".green().bold());

    let mut session = app.new_session(&lesson, SessionType::Practice, true);
    let mut outcome = None;

    let exit = practice::drive(&mut session, |session, now| {
        if let Err(error) = host.sync_session(session, now) {
            warn!(%error, "failed to publish race progress");
        }
        host.tick(now);
        race_outcome(host.pump(now), &mut outcome);
        bots.iter_mut().for_each(|bot| bot.step(now));
    })?;

    if exit == Exit::Aborted {
        host.leave();
        println!("Race abandoned");
        return Ok(());
    }

    let deadline = cadence::now() + FINISH_GRACE_MS;
    while host.match_status() != MatchStatus::Finished && cadence::now() < deadline {
        let now = cadence::now();
        host.tick(now);
        race_outcome(host.pump(now), &mut outcome);
        bots.iter_mut().for_each(|bot| bot.step(now));
        thread::sleep(TICK);
    }

    let mut players: Vec<_> = host.state().players().iter().collect();
    players.sort_by_key(|player| {
        (
            player.rank.unwrap_or(u32::MAX),
            std::cmp::Reverse(player.progress),
        )
    });

    let mut out = stdout();
    report::standings(&mut out, &players, outcome)?;

    let summary = app.record(&session, outcome.map(|outcome| outcome.winner));
    report::summary(&mut out, &summary)?;

    host.leave();
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(60, 100, 0, (0, false))]
    // 60 wpm is 5 characters per second
    #[case(60, 100, 10_000, (50, false))]
    #[case(60, 100, 20_000, (100, true))]
    #[case(60, 100, 90_000, (100, true))]
    #[case(60, 0, 0, (100, true))]
    fn bots_type_at_a_fixed_speed(
        #[case] wpm: u32,
        #[case] text_len: usize,
        #[case] elapsed_ms: u64,
        #[case] expected: (u8, bool),
    ) {
        assert_eq!(simulated_progress(wpm, text_len, elapsed_ms), expected);
    }

    #[test]
    fn bots_race_to_the_end_without_a_terminal() {
        let hub = MemoryRealtime::new();
        let config = Configuration::default();
        let mut host = LobbyClient::new(
            Rc::new(hub.connect()),
            Identity::new(PLAYER_UID, "player"),
            config.clone(),
        );

        let id = host.host("home-row", 0).unwrap();
        let mut bots: Vec<_> = (0..2)
            .map(|index| Bot::join(&hub, index, &id, &config, 50, 0).unwrap())
            .collect();
        host.mark_ready(0).unwrap();
        host.start_countdown(0).unwrap();

        let mut now = 0;
        while now < 30_000 {
            host.tick(now);
            host.pump(now);
            bots.iter_mut().for_each(|bot| bot.step(now));
            now += 100;
        }

        let opponents = host.opponents();
        assert_eq!(opponents.len(), 2);
        assert!(opponents.iter().all(|bot| bot.is_finished()));

        // The faster bot finished first
        let fastest = opponents.iter().find(|bot| bot.uid == "bot-1").unwrap();
        assert_eq!(fastest.rank, Some(1));
    }
}
