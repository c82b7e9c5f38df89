use std::rc::Rc;

use cadence::Configuration;
use cadence::lobby::{
    ArenaPlayer, LobbyClient, LobbyEvent, LobbyStatus, MatchStatus, PlayerStatus, RaceOutcome,
};
use cadence::realtime::{MemoryRealtime, RealtimeStore};
use cadence::session::SessionStatus;
use cadence::store::Identity;

struct Player {
    link: Rc<MemoryRealtime>,
    client: LobbyClient,
}

fn player(hub: &MemoryRealtime, uid: &str) -> Player {
    let link = Rc::new(hub.connect());
    let client = LobbyClient::new(
        link.clone(),
        Identity::new(uid, uid.to_uppercase()),
        Configuration::default(),
    );
    Player { link, client }
}

fn opponent<'a>(client: &'a LobbyClient, uid: &str) -> Option<&'a ArenaPlayer> {
    client.opponents().into_iter().find(|player| player.uid == uid)
}

/// Host and guest in a lobby, both ready
fn lobby(hub: &MemoryRealtime) -> (Player, Player, String) {
    let mut host = player(hub, "host");
    let mut guest = player(hub, "guest");

    let id = host.client.host("home-row", 0).unwrap();
    guest.client.join(&id, 10).unwrap();
    host.client.mark_ready(20).unwrap();
    guest.client.mark_ready(20).unwrap();
    host.client.pump(20);
    guest.client.pump(20);

    (host, guest, id)
}

fn start_race(host: &mut Player, guest: &mut Player) {
    host.client.start_countdown(100).unwrap();
    assert_eq!(host.client.countdown_remaining(100), Some(3));

    let events = guest.client.pump(150);
    assert!(events.contains(&LobbyEvent::StatusChanged(LobbyStatus::Countdown)));
    assert_eq!(guest.client.countdown_remaining(150), Some(3));
    assert_eq!(guest.client.countdown_remaining(2_500), Some(1));

    // Too early
    host.client.tick(2_000);
    host.client.pump(2_000);
    assert_eq!(host.client.match_status(), MatchStatus::Countdown);

    host.client.tick(3_100);
    host.client.pump(3_100);
    guest.client.pump(3_100);
    assert_eq!(host.client.match_status(), MatchStatus::Racing);
    assert_eq!(guest.client.match_status(), MatchStatus::Racing);
    assert_eq!(guest.client.countdown_remaining(3_100), None);
}

#[test]
fn full_race_between_two_players() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, _) = lobby(&hub);

    assert_eq!(
        opponent(&host.client, "guest").map(|p| p.status),
        Some(PlayerStatus::Ready)
    );
    assert!(guest.client.text_id() == Some("home-row"));

    start_race(&mut host, &mut guest);

    guest
        .client
        .sync_progress(50, 40, SessionStatus::Running, 3_400)
        .unwrap();
    host.client.pump(3_400);
    let seen = opponent(&host.client, "guest").unwrap();
    assert_eq!((seen.progress, seen.status), (50, PlayerStatus::Racing));

    // Guest finishes first
    guest
        .client
        .sync_progress(100, 45, SessionStatus::Finished, 5_000)
        .unwrap();
    let guest_events = guest.client.pump(5_000);
    assert!(guest_events.contains(&LobbyEvent::RaceFinished(RaceOutcome {
        rank: 1,
        winner: true
    })));

    host.client.pump(5_100);
    host.client
        .sync_progress(100, 38, SessionStatus::Finished, 5_500)
        .unwrap();
    let host_events = host.client.pump(5_500);
    assert!(host_events.contains(&LobbyEvent::RaceFinished(RaceOutcome {
        rank: 2,
        winner: false
    })));

    // Everybody finished, the host closed the race
    host.client.pump(5_600);
    guest.client.pump(5_600);
    assert_eq!(host.client.match_status(), MatchStatus::Finished);
    assert_eq!(guest.client.match_status(), MatchStatus::Finished);
}

#[test]
fn simultaneous_finishers_both_win() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, _) = lobby(&hub);
    start_race(&mut host, &mut guest);

    // Neither saw the other finish before recording its own
    host.client
        .sync_progress(100, 60, SessionStatus::Finished, 6_000)
        .unwrap();
    guest
        .client
        .sync_progress(100, 61, SessionStatus::Finished, 6_000)
        .unwrap();

    for client in [&mut host.client, &mut guest.client] {
        let events = client.pump(6_000);
        assert!(events.contains(&LobbyEvent::RaceFinished(RaceOutcome {
            rank: 1,
            winner: true
        })));
    }
}

#[test]
fn crashed_player_is_removed_by_presence() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, _) = lobby(&hub);
    assert!(opponent(&host.client, "guest").is_some());

    guest.link.disconnect();

    let events = host.client.pump(500);
    assert!(events.contains(&LobbyEvent::PlayersChanged));
    assert!(opponent(&host.client, "guest").is_none());

    // The crashed client keeps typing locally, writes fail quietly
    assert!(!guest
        .client
        .sync_progress(10, 20, SessionStatus::Running, 600)
        .unwrap());
    assert_eq!(guest.client.own_player().map(|p| p.progress), Some(10));
}

#[test]
fn reconnected_player_reappears_on_next_tick() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, _) = lobby(&hub);

    guest.link.disconnect();
    host.client.pump(500);
    guest.link.reconnect();

    // Presence removed the entry, the snapshot shows it missing
    guest.client.pump(600);
    guest.client.tick(1_000);
    host.client.pump(1_000);

    assert!(opponent(&host.client, "guest").is_some());
}

#[test]
fn delayed_snapshot_does_not_rewind_an_opponent() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, id) = lobby(&hub);
    start_race(&mut host, &mut guest);
    let guest_path = format!("lobbies/{id}/players/guest");

    guest
        .client
        .sync_progress(40, 30, SessionStatus::Running, 3_400)
        .unwrap();
    let older = hub.get(&guest_path).unwrap().unwrap();

    guest
        .client
        .sync_progress(100, 45, SessionStatus::Finished, 5_000)
        .unwrap();
    host.client.pump(5_000);

    // The earlier write shows up again after the finish
    hub.set(&guest_path, older).unwrap();
    host.client.pump(5_100);

    let seen = opponent(&host.client, "guest").unwrap();
    assert_eq!(seen.status, PlayerStatus::Finished);
    assert_eq!(seen.progress, 100);
    assert_eq!(seen.rank, Some(1));

    host.client
        .sync_progress(100, 38, SessionStatus::Finished, 5_500)
        .unwrap();
    let host_events = host.client.pump(5_500);
    assert!(host_events.contains(&LobbyEvent::RaceFinished(RaceOutcome {
        rank: 2,
        winner: false
    })));
}

#[test]
fn finished_entry_is_restored_after_reconnect() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, _) = lobby(&hub);
    start_race(&mut host, &mut guest);

    guest
        .client
        .sync_progress(100, 45, SessionStatus::Finished, 5_000)
        .unwrap();
    guest.client.pump(5_000);
    host.client.pump(5_000);

    guest.link.disconnect();
    host.client.pump(5_100);
    assert!(opponent(&host.client, "guest").is_none());

    // The resynced snapshot lacks the entry, the next tick writes it back
    guest.link.reconnect();
    guest.client.pump(5_200);
    guest.client.tick(5_200);
    assert_eq!(guest.link.pending_disconnect_actions(), 1);

    host.client.pump(5_300);
    let seen = opponent(&host.client, "guest").unwrap();
    assert_eq!(seen.status, PlayerStatus::Finished);
    assert_eq!(seen.rank, Some(1));

    // Restoring the entry is not a second finish
    assert!(!guest
        .client
        .pump(5_300)
        .iter()
        .any(|event| matches!(event, LobbyEvent::RaceFinished(_))));
}

#[test]
fn stale_echo_does_not_regress_own_progress() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, id) = lobby(&hub);
    start_race(&mut host, &mut guest);

    guest
        .client
        .sync_progress(60, 40, SessionStatus::Running, 4_000)
        .unwrap();

    // A delayed copy of an older write lands after the newer one
    let mut stale = ArenaPlayer::joining("guest", "GUEST");
    stale.status = PlayerStatus::Racing;
    stale.progress = 20;
    hub.set(
        &format!("lobbies/{id}/players/guest"),
        serde_json::to_value(&stale).unwrap(),
    )
    .unwrap();

    guest.client.pump(4_100);
    let own = guest.client.state().get_self("guest").unwrap();
    assert_eq!(own.progress, 60);
    assert_eq!(guest.client.own_player().map(|p| p.progress), Some(60));
}

#[test]
fn restart_returns_everybody_to_waiting() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, _) = lobby(&hub);
    start_race(&mut host, &mut guest);

    guest
        .client
        .sync_progress(100, 45, SessionStatus::Finished, 5_000)
        .unwrap();
    host.client.restart().unwrap();
    host.client.pump(6_000);

    let events = guest.client.pump(6_000);
    assert!(events.contains(&LobbyEvent::StatusChanged(LobbyStatus::Waiting)));

    let own = guest.client.own_player().unwrap();
    assert_eq!(own.status, PlayerStatus::Ready);
    assert_eq!(own.progress, 0);
    assert_eq!(own.rank, None);

    // A second race can be finished again
    start_race(&mut host, &mut guest);
    assert!(guest
        .client
        .sync_progress(100, 50, SessionStatus::Finished, 9_000)
        .unwrap());
}

#[test]
fn graceful_leave_is_seen_by_others() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, _) = lobby(&hub);

    guest.client.leave();
    assert_eq!(guest.link.pending_disconnect_actions(), 0);

    host.client.pump(1_000);
    assert!(host.client.opponents().is_empty());
}

#[test]
fn host_can_rejoin_without_resetting_the_lobby() {
    let hub = MemoryRealtime::new();
    let (mut host, mut guest, id) = lobby(&hub);
    start_race(&mut host, &mut guest);

    host.client.leave();
    host.client.join(&id, 4_000).unwrap();
    host.client.pump(4_000);

    assert!(host.client.is_host());
    assert_eq!(host.client.match_status(), MatchStatus::Racing);
}

#[test]
fn deleted_lobby_closes_clients() {
    let hub = MemoryRealtime::new();
    let (_host, mut guest, id) = lobby(&hub);

    hub.remove(&format!("lobbies/{id}")).unwrap();

    assert!(guest.client.pump(1_000).contains(&LobbyEvent::Closed));
    assert_eq!(guest.client.lobby_id(), None);
    assert_eq!(guest.client.match_status(), MatchStatus::Idle);
}
