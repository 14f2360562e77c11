//! Typed gameplay events parsed from Source-engine server logs.
//!
//! Every line a server writes to its log (and forwards over UDP with
//! `logaddress_add`) is turned into exactly one [`Event`] by the
//! [`LineClassifier`]. Lines that do not match any known shape become
//! [`Event::Unrecognized`], so classification never fails.

pub mod classifier;

pub use classifier::{LineClassifier, LogLine};

use serde::{Deserialize, Serialize};

/// Identity and per-event details of a player named in a log line.
///
/// The record is shared by several event kinds; fields an event does not
/// use are left empty.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerData {
    pub username: String,
    pub user_id: String,
    pub steam_id: String,
    pub team: String,
    pub new_team: String,
    pub text: String,
    pub class: String,
}

impl PlayerData {
    pub fn new(username: &str, user_id: &str, steam_id: &str, team: &str) -> Self {
        Self {
            username: username.to_string(),
            user_id: user_id.to_string(),
            steam_id: steam_id.to_string(),
            team: team.to_string(),
            ..Self::default()
        }
    }
}

/// A capturable objective referenced by numeric id and map-defined name.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ControlPoint {
    pub cp: String,
    pub cp_name: String,
}

/// Team-level event payload. Point captures fill `point`, score updates
/// fill `score` and `players`.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TeamData {
    pub team: String,
    pub point: ControlPoint,
    pub score: String,
    pub players: String,
}

/// `player1 triggered "..." against player2`
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerTrigger {
    pub player1: PlayerData,
    pub player2: PlayerData,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerKill {
    #[serde(flatten)]
    pub trigger: PlayerTrigger,
    pub weapon: String,
    pub custom_kill: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerDamage {
    #[serde(flatten)]
    pub trigger: PlayerTrigger,
    pub damage: u32,
    pub weapon: String,
    pub airshot: bool,
    pub headshot: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerHeal {
    #[serde(flatten)]
    pub trigger: PlayerTrigger,
    /// Health gained by player2
    pub healed: u32,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ItemPickup {
    pub player: PlayerData,
    pub item: String,
    pub healing: u32,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CvarData {
    pub variable: String,
    pub value: String,
}

/// One classified log line.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    GlobalMessage(PlayerData),
    TeamMessage(PlayerData),
    ClassChanged(PlayerData),
    TeamChanged(PlayerData),
    Spawned(PlayerData),
    ItemPickup(ItemPickup),
    Killed(PlayerKill),
    Damaged(PlayerDamage),
    Healed(PlayerHeal),
    KilledMedic(PlayerTrigger),
    UberFinished(PlayerData),
    BlockedCapture {
        point: ControlPoint,
        player: PlayerData,
    },
    Connected {
        player: PlayerData,
        address: String,
    },
    Disconnected {
        player: PlayerData,
        reason: String,
    },

    TeamPointCapture(TeamData),
    TeamScoreUpdate(TeamData),
    GameOver {
        reason: String,
    },
    RoundWin {
        winner: String,
    },
    RoundStart,
    CvarChange(CvarData),
    LogClosed,
    TournamentStarted {
        blue: Option<String>,
        red: Option<String>,
    },
    RconCommand {
        from: String,
        command: String,
    },

    Unrecognized,
}

/// Discriminant of an [`Event`], with the numeric codes used on the wire by
/// older tooling. `Unrecognized` is `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EventKind {
    GlobalMessage = 0,
    TeamMessage,
    ClassChanged,
    TeamChanged,
    ItemPickup,
    Spawned,
    Killed,
    Damaged,
    Healed,
    KilledMedic,
    UberFinished,
    BlockedCapture,
    Connected,
    Disconnected,
    TeamPointCapture,
    TeamScoreUpdate,
    GameOver,
    RoundWin,
    RoundStart,
    CvarChange,
    TournamentStarted,
    LogClosed,
    RconCommand,
    Unrecognized = -1,
}

impl EventKind {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GlobalMessage(_) => EventKind::GlobalMessage,
            Event::TeamMessage(_) => EventKind::TeamMessage,
            Event::ClassChanged(_) => EventKind::ClassChanged,
            Event::TeamChanged(_) => EventKind::TeamChanged,
            Event::Spawned(_) => EventKind::Spawned,
            Event::ItemPickup(_) => EventKind::ItemPickup,
            Event::Killed(_) => EventKind::Killed,
            Event::Damaged(_) => EventKind::Damaged,
            Event::Healed(_) => EventKind::Healed,
            Event::KilledMedic(_) => EventKind::KilledMedic,
            Event::UberFinished(_) => EventKind::UberFinished,
            Event::BlockedCapture { .. } => EventKind::BlockedCapture,
            Event::Connected { .. } => EventKind::Connected,
            Event::Disconnected { .. } => EventKind::Disconnected,
            Event::TeamPointCapture(_) => EventKind::TeamPointCapture,
            Event::TeamScoreUpdate(_) => EventKind::TeamScoreUpdate,
            Event::GameOver { .. } => EventKind::GameOver,
            Event::RoundWin { .. } => EventKind::RoundWin,
            Event::RoundStart => EventKind::RoundStart,
            Event::CvarChange(_) => EventKind::CvarChange,
            Event::LogClosed => EventKind::LogClosed,
            Event::TournamentStarted { .. } => EventKind::TournamentStarted,
            Event::RconCommand { .. } => EventKind::RconCommand,
            Event::Unrecognized => EventKind::Unrecognized,
        }
    }

    /// The acting player, for player-prefixed events.
    pub fn player(&self) -> Option<&PlayerData> {
        match self {
            Event::GlobalMessage(p)
            | Event::TeamMessage(p)
            | Event::ClassChanged(p)
            | Event::TeamChanged(p)
            | Event::Spawned(p)
            | Event::UberFinished(p) => Some(p),
            Event::ItemPickup(pickup) => Some(&pickup.player),
            Event::Killed(kill) => Some(&kill.trigger.player1),
            Event::Damaged(damage) => Some(&damage.trigger.player1),
            Event::Healed(heal) => Some(&heal.trigger.player1),
            Event::KilledMedic(trigger) => Some(&trigger.player1),
            Event::BlockedCapture { player, .. }
            | Event::Connected { player, .. }
            | Event::Disconnected { player, .. } => Some(player),
            _ => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Event::Unrecognized)
    }
}
