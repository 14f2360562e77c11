use crate::registry::Session;
use rcon::RconError;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Why a datagram could not be framed as a secret-tagged log line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram too short ({0} bytes)")]
    TooShort(usize),

    /// Untagged logs use `R` (0x52); only `S` datagrams carry a secret.
    #[error("unexpected marker byte {0:#04x}")]
    BadMarker(u8),

    #[error("no secret digits after marker")]
    MissingSecret,

    #[error("no \"L \" prefix after secret")]
    MissingPrefix,
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid packet: {0}")]
    InvalidPacket(#[from] PacketError),

    #[error("no session for secret {0}")]
    UnknownSecret(String),

    #[error("secret {0} is already in use")]
    SecretInUse(String),

    #[error("invalid secret {0:?}")]
    InvalidSecret(String),

    /// The session was registered but the server could not be told to send
    /// logs to it. Remove the session to roll back.
    #[error("log redirection setup for secret {} failed: {source}", .session.secret())]
    Setup {
        session: Arc<Session>,
        #[source]
        source: RconError,
    },

    #[error("RCON error: {0}")]
    Rcon(#[from] RconError),
}
