//! Routing of classified events to per-kind handler methods.

use events::{
    ControlPoint, CvarData, Event, ItemPickup, LogLine, PlayerDamage, PlayerData, PlayerHeal,
    PlayerKill, PlayerTrigger, TeamData,
};
use log::debug;
use tokio::sync::mpsc;

/// Receives the events of one session.
///
/// Every method has an empty default body, so implementors override only the
/// events they care about. Calls for one session never overlap, and none are
/// made after the session has been removed.
#[allow(unused_variables)]
pub trait EventHandler: Send + Sync {
    /// Entry point for each log line. Defaults to [`handle`](Self::handle).
    fn handle_line(&self, line: &LogLine) {
        self.handle(&line.event);
    }

    /// Dispatches one event to the matching `on_*` method.
    fn handle(&self, event: &Event) {
        route(self, event);
    }

    fn on_global_message(&self, player: &PlayerData) {}
    fn on_team_message(&self, player: &PlayerData) {}
    fn on_class_changed(&self, player: &PlayerData) {}
    fn on_team_changed(&self, player: &PlayerData) {}
    fn on_spawned(&self, player: &PlayerData) {}
    fn on_item_pickup(&self, pickup: &ItemPickup) {}
    fn on_killed(&self, kill: &PlayerKill) {}
    fn on_damaged(&self, damage: &PlayerDamage) {}
    fn on_healed(&self, heal: &PlayerHeal) {}
    fn on_killed_medic(&self, trigger: &PlayerTrigger) {}
    fn on_uber_finished(&self, player: &PlayerData) {}
    fn on_blocked_capture(&self, point: &ControlPoint, player: &PlayerData) {}
    fn on_connected(&self, player: &PlayerData, address: &str) {}
    fn on_disconnected(&self, player: &PlayerData, reason: &str) {}
    fn on_team_point_capture(&self, team: &TeamData) {}
    fn on_team_score_update(&self, team: &TeamData) {}
    fn on_game_over(&self, reason: &str) {}
    fn on_round_win(&self, winner: &str) {}
    fn on_round_start(&self) {}
    fn on_cvar_change(&self, cvar: &CvarData) {}
    fn on_log_closed(&self) {}
    fn on_tournament_started(&self, blue: Option<&str>, red: Option<&str>) {}
    fn on_rcon_command(&self, from: &str, command: &str) {}
}

/// Calls the `on_*` method of `handler` that matches `event`.
pub fn route<H: EventHandler + ?Sized>(handler: &H, event: &Event) {
    match event {
        Event::GlobalMessage(p) => handler.on_global_message(p),
        Event::TeamMessage(p) => handler.on_team_message(p),
        Event::ClassChanged(p) => handler.on_class_changed(p),
        Event::TeamChanged(p) => handler.on_team_changed(p),
        Event::Spawned(p) => handler.on_spawned(p),
        Event::ItemPickup(pickup) => handler.on_item_pickup(pickup),
        Event::Killed(kill) => handler.on_killed(kill),
        Event::Damaged(damage) => handler.on_damaged(damage),
        Event::Healed(heal) => handler.on_healed(heal),
        Event::KilledMedic(trigger) => handler.on_killed_medic(trigger),
        Event::UberFinished(p) => handler.on_uber_finished(p),
        Event::BlockedCapture { point, player } => handler.on_blocked_capture(point, player),
        Event::Connected { player, address } => handler.on_connected(player, address),
        Event::Disconnected { player, reason } => handler.on_disconnected(player, reason),
        Event::TeamPointCapture(team) => handler.on_team_point_capture(team),
        Event::TeamScoreUpdate(team) => handler.on_team_score_update(team),
        Event::GameOver { reason } => handler.on_game_over(reason),
        Event::RoundWin { winner } => handler.on_round_win(winner),
        Event::RoundStart => handler.on_round_start(),
        Event::CvarChange(cvar) => handler.on_cvar_change(cvar),
        Event::LogClosed => handler.on_log_closed(),
        Event::TournamentStarted { blue, red } => {
            handler.on_tournament_started(blue.as_deref(), red.as_deref())
        }
        Event::RconCommand { from, command } => handler.on_rcon_command(from, command),
        Event::Unrecognized => {}
    }
}

/// Forwards every event, recognized or not, into a channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventHandler for EventSender {
    fn handle(&self, event: &Event) {
        if self.tx.send(event.clone()).is_err() {
            debug!("Event receiver dropped, discarding {:?}", event.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl EventHandler for Recorder {
        fn on_team_changed(&self, player: &PlayerData) {
            self.record(format!("team_changed {} {}", player.username, player.new_team));
        }

        fn on_killed(&self, kill: &PlayerKill) {
            self.record(format!("killed {}", kill.weapon));
        }

        fn on_game_over(&self, reason: &str) {
            self.record(format!("game_over {}", reason));
        }

        fn on_tournament_started(&self, blue: Option<&str>, red: Option<&str>) {
            self.record(format!("tournament {:?} {:?}", blue, red));
        }
    }

    #[test]
    fn test_route_calls_matching_method() {
        let recorder = Recorder::default();
        let mut player = PlayerData::new("Sk1LL0", "2", "[U:1:198288660]", "Unassigned");
        player.new_team = "Red".to_string();

        recorder.handle(&Event::TeamChanged(player));
        recorder.handle(&Event::Killed(PlayerKill {
            weapon: "scattergun".to_string(),
            ..PlayerKill::default()
        }));
        recorder.handle(&Event::GameOver {
            reason: "Reached Win Limit".to_string(),
        });
        recorder.handle(&Event::TournamentStarted {
            blue: Some("BLU".to_string()),
            red: None,
        });

        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                "team_changed Sk1LL0 Red",
                "killed scattergun",
                "game_over Reached Win Limit",
                "tournament Some(\"BLU\") None",
            ]
        );
    }

    #[test]
    fn test_unset_methods_and_unrecognized_are_noops() {
        let recorder = Recorder::default();

        recorder.handle(&Event::Unrecognized);
        recorder.handle(&Event::RoundStart);
        recorder.handle(&Event::LogClosed);
        recorder.handle(&Event::Spawned(PlayerData::default()));

        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handle_line_uses_event() {
        let recorder = Recorder::default();
        let line = events::LineClassifier::new()
            .parse_line("L 10/29/2015 - 16:50:46: World triggered \"Game_Over\" reason \"Reached Time Limit\"\n");

        recorder.handle_line(&line);
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["game_over Reached Time Limit"]
        );
    }

    #[test]
    fn test_event_sender_forwards_everything() {
        let (sender, mut rx) = EventSender::channel();

        sender.handle(&Event::RoundStart);
        sender.handle(&Event::Unrecognized);

        assert_eq!(rx.try_recv().unwrap(), Event::RoundStart);
        assert_eq!(rx.try_recv().unwrap(), Event::Unrecognized);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_sender_survives_closed_receiver() {
        let (sender, rx) = EventSender::channel();
        drop(rx);

        sender.handle(&Event::LogClosed);
    }
}
