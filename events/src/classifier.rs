//! Log line grammar.
//!
//! The grammar is an ordered list of line shapes. Shapes are mutually
//! exclusive and the first one that matches wins. All patterns are compiled
//! once when the [`LineClassifier`] is built and never mutated afterwards, so
//! one classifier can be shared by reference across any number of tasks.

use crate::{
    ControlPoint, CvarData, Event, ItemPickup, PlayerData, PlayerDamage, PlayerHeal, PlayerKill,
    PlayerTrigger, TeamData,
};
use regex::{Captures, Regex};
use time::macros::format_description;
use time::PrimitiveDateTime;

// "Username<userId><steamId><Team>"
//  1        2       3        4      <- capture groups
const STEAM_ID: &str = r"\[U:\d:\d+\]|STEAM_\d:\d:\d+|BOT";

/// Width of `MM/DD/YYYY - HH:MM:SS`
const TIMESTAMP_LEN: usize = 21;
/// `L ` before the timestamp, `: ` after it
const TIMESTAMP_START: usize = 2;
const MESSAGE_START: usize = TIMESTAMP_START + TIMESTAMP_LEN + 2;

fn player_start(team: &str) -> String {
    format!(r#"^"(.*?)<(\d+)><({STEAM_ID})><({team})>" "#)
}

fn player_target() -> String {
    format!(r#""(.*?)<(\d+)><({STEAM_ID})><(\w+)>""#)
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("log line pattern must compile")
}

/// A log payload split into its timestamp and message, plus the event the
/// message classified as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: Option<PrimitiveDateTime>,
    pub message: String,
    pub event: Event,
}

/// Compiled, immutable pattern set for log line classification.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    global_message: Regex,
    team_message: Regex,
    class_changed: Regex,
    team_changed: Regex,
    spawned: Regex,
    item_pickup: Regex,
    killed: Regex,
    damaged: Regex,
    healed: Regex,
    killed_medic: Regex,
    uber_finished: Regex,
    blocked_capture: Regex,
    connected: Regex,
    disconnected: Regex,

    team_point_capture: Regex,
    team_score_update: Regex,

    game_over: Regex,
    round_win: Regex,
    round_start: Regex,
    server_cvar: Regex,
    log_closed: Regex,
    tournament_started: Regex,
    rcon_command: Regex,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LineClassifier {
    pub fn new() -> Self {
        let start = player_start(r"\w+");
        let start_no_team = player_start(r"\w*");
        let target = player_target();

        Self {
            global_message: compile(&format!(r#"{start}say "(.*)""#)),
            team_message: compile(&format!(r#"{start}say_team "(.*)""#)),
            class_changed: compile(&format!(r#"{start}changed role to "(\w+)""#)),
            team_changed: compile(&format!(r#"{start}joined team "(\w+)""#)),
            spawned: compile(&format!(r#"{start}spawned as "(\w+)""#)),
            item_pickup: compile(&format!(
                r#"{start}picked up item "(\w+)"(?: \(healing "(\d+)"\))?"#
            )),
            killed: compile(&format!(
                r#"{start}killed {target} with "([^"]*)"(?: \(customkill "([^"]*)"\))?"#
            )),
            damaged: compile(&format!(
                r#"{start}triggered "damage" against {target} \(damage "(\d+)"\)(?: \(realdamage "\d+"\))? \(weapon "([^"]*)"\)(.*)"#
            )),
            healed: compile(&format!(
                r#"{start}triggered "healed" against {target} \(healing "(\d+)"\)"#
            )),
            killed_medic: compile(&format!(
                r#"{start}triggered "medic_death" against {target} \(healing "(\d+)"\) \(ubercharge "(\d+)"\)"#
            )),
            uber_finished: compile(&format!(r#"{start}triggered "empty_uber""#)),
            blocked_capture: compile(&format!(
                r#"{start}triggered "captureblocked" \(cp "(\d+)"\) \(cpname "([^"]*)"\)"#
            )),
            connected: compile(&format!(
                r#"{start_no_team}connected, address "([^"]*)""#
            )),
            disconnected: compile(&format!(
                r#"{start_no_team}disconnected \(reason "(.*)"\)"#
            )),

            team_point_capture: compile(
                r#"^Team "(Red|Blue)" triggered "pointcaptured" \(cp "(\d+)"\) \(cpname "([^"]*)"\)"#,
            ),
            team_score_update: compile(
                r#"^Team "(Red|Blue)" current score "(\d+)" with "(\d+)" players"#,
            ),

            game_over: compile(r#"^World triggered "Game_Over" reason "(.*)""#),
            round_win: compile(r#"^World triggered "Round_Win" \(winner "(Red|Blue)"\)"#),
            round_start: compile(r#"^World triggered "Round_Start""#),
            server_cvar: compile(r#"^server_cvar: "(.*?)" "(.*)""#),
            log_closed: compile(r"^Log file closed\."),
            tournament_started: compile(
                r"^Tournament mode started(?:\r?\nBlue Team: (\w+)\r?\nRed Team: (\w+))?",
            ),
            rcon_command: compile(r#"^rcon from "([^"]*)": command "(.*)""#),
        }
    }

    /// Splits a `L MM/DD/YYYY - HH:MM:SS: message` payload and classifies
    /// the message. Trailing line terminators are dropped first. Payloads
    /// without the `L ` header are classified whole, with no timestamp.
    pub fn parse_line(&self, payload: &str) -> LogLine {
        let payload = trim_terminator(payload);

        let (timestamp, message) = match (
            payload.strip_prefix("L "),
            payload.get(TIMESTAMP_START..TIMESTAMP_START + TIMESTAMP_LEN),
            payload.get(MESSAGE_START..),
        ) {
            (Some(_), Some(stamp), Some(message)) => (parse_timestamp(stamp), message),
            _ => (None, payload),
        };

        LogLine {
            timestamp,
            message: message.to_string(),
            event: self.classify(message),
        }
    }

    /// Classifies one log message (the text after the timestamp).
    pub fn classify(&self, message: &str) -> Event {
        if message.starts_with('"') {
            if let Some(event) = self.classify_player(message) {
                return event;
            }
        }

        self.classify_world(message).unwrap_or(Event::Unrecognized)
    }

    fn classify_player(&self, message: &str) -> Option<Event> {
        if let Some(m) = self.global_message.captures(message) {
            let mut player = player_data(&m, 1, true);
            player.text = group(&m, 5);
            return Some(Event::GlobalMessage(player));
        }

        if let Some(m) = self.team_message.captures(message) {
            let mut player = player_data(&m, 1, true);
            player.text = group(&m, 5);
            return Some(Event::TeamMessage(player));
        }

        if let Some(m) = self.class_changed.captures(message) {
            let mut player = player_data(&m, 1, true);
            player.class = group(&m, 5);
            return Some(Event::ClassChanged(player));
        }

        if let Some(m) = self.team_changed.captures(message) {
            let mut player = player_data(&m, 1, true);
            player.new_team = group(&m, 5);
            return Some(Event::TeamChanged(player));
        }

        if let Some(m) = self.spawned.captures(message) {
            let mut player = player_data(&m, 1, true);
            player.class = group(&m, 5);
            return Some(Event::Spawned(player));
        }

        if let Some(m) = self.item_pickup.captures(message) {
            return Some(Event::ItemPickup(ItemPickup {
                player: player_data(&m, 1, true),
                item: group(&m, 5),
                healing: number(&m, 6),
            }));
        }

        if let Some(m) = self.killed.captures(message) {
            return Some(Event::Killed(PlayerKill {
                trigger: trigger(&m),
                weapon: group(&m, 9),
                custom_kill: group(&m, 10),
            }));
        }

        if let Some(m) = self.damaged.captures(message) {
            let extra = m.get(11).map_or("", |g| g.as_str());
            return Some(Event::Damaged(PlayerDamage {
                trigger: trigger(&m),
                damage: number(&m, 9),
                weapon: group(&m, 10),
                airshot: extra.contains(r#"(airshot "1")"#),
                headshot: extra.contains(r#"(headshot "1")"#),
            }));
        }

        if let Some(m) = self.healed.captures(message) {
            return Some(Event::Healed(PlayerHeal {
                trigger: trigger(&m),
                healed: number(&m, 9),
            }));
        }

        if let Some(m) = self.killed_medic.captures(message) {
            return Some(Event::KilledMedic(trigger(&m)));
        }

        if let Some(m) = self.uber_finished.captures(message) {
            return Some(Event::UberFinished(player_data(&m, 1, true)));
        }

        if let Some(m) = self.blocked_capture.captures(message) {
            return Some(Event::BlockedCapture {
                point: ControlPoint {
                    cp: group(&m, 5),
                    cp_name: group(&m, 6),
                },
                player: player_data(&m, 1, true),
            });
        }

        if let Some(m) = self.connected.captures(message) {
            return Some(Event::Connected {
                player: player_data(&m, 1, false),
                address: group(&m, 5),
            });
        }

        if let Some(m) = self.disconnected.captures(message) {
            return Some(Event::Disconnected {
                player: player_data(&m, 1, false),
                reason: group(&m, 5),
            });
        }

        None
    }

    fn classify_world(&self, message: &str) -> Option<Event> {
        if let Some(m) = self.team_point_capture.captures(message) {
            return Some(Event::TeamPointCapture(TeamData {
                team: group(&m, 1),
                point: ControlPoint {
                    cp: group(&m, 2),
                    cp_name: group(&m, 3),
                },
                ..TeamData::default()
            }));
        }

        if let Some(m) = self.team_score_update.captures(message) {
            return Some(Event::TeamScoreUpdate(TeamData {
                team: group(&m, 1),
                score: group(&m, 2),
                players: group(&m, 3),
                ..TeamData::default()
            }));
        }

        if let Some(m) = self.game_over.captures(message) {
            return Some(Event::GameOver {
                reason: group(&m, 1),
            });
        }

        if let Some(m) = self.round_win.captures(message) {
            return Some(Event::RoundWin {
                winner: group(&m, 1),
            });
        }

        if self.round_start.is_match(message) {
            return Some(Event::RoundStart);
        }

        if let Some(m) = self.server_cvar.captures(message) {
            return Some(Event::CvarChange(CvarData {
                variable: group(&m, 1),
                value: group(&m, 2),
            }));
        }

        if self.log_closed.is_match(message) {
            return Some(Event::LogClosed);
        }

        if let Some(m) = self.tournament_started.captures(message) {
            return Some(Event::TournamentStarted {
                blue: m.get(1).map(|g| g.as_str().to_string()),
                red: m.get(2).map(|g| g.as_str().to_string()),
            });
        }

        if let Some(m) = self.rcon_command.captures(message) {
            return Some(Event::RconCommand {
                from: group(&m, 1),
                command: group(&m, 2),
            });
        }

        None
    }
}

fn group(captures: &Captures<'_>, index: usize) -> String {
    captures
        .get(index)
        .map(|g| g.as_str().to_string())
        .unwrap_or_default()
}

fn number(captures: &Captures<'_>, index: usize) -> u32 {
    captures
        .get(index)
        .and_then(|g| g.as_str().parse().ok())
        .unwrap_or(0)
}

fn player_data(captures: &Captures<'_>, from: usize, include_team: bool) -> PlayerData {
    let mut player = PlayerData {
        username: group(captures, from),
        user_id: group(captures, from + 1),
        steam_id: group(captures, from + 2),
        ..PlayerData::default()
    };

    if include_team {
        player.team = group(captures, from + 3);
    }

    player
}

fn trigger(captures: &Captures<'_>) -> PlayerTrigger {
    PlayerTrigger {
        player1: player_data(captures, 1, true),
        player2: player_data(captures, 5, true),
    }
}

fn trim_terminator(payload: &str) -> &str {
    payload.trim_end_matches(|c: char| matches!(c, '\n' | '\r' | '\0'))
}

fn parse_timestamp(text: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        text,
        format_description!("[month]/[day]/[year] - [hour]:[minute]:[second]"),
    )
    .ok()
}
