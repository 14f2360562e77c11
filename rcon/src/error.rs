use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the RCON client.
#[derive(Debug, Error)]
pub enum RconError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("RCON connection is not open")]
    NotConnected,

    #[error("RCON password rejected by {0}")]
    AuthenticationFailed(String),

    /// The server answered with `Unknown command`. Carries the command that was sent.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("no response to {command:?} after {attempts} reads")]
    ResponseTimeout { command: String, attempts: usize },

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("could not reconnect to {address} within {window:?}: {source}")]
    ReconnectFailed {
        address: String,
        window: Duration,
        #[source]
        source: Box<RconError>,
    },

    #[error("map {map:?} rejected: {response}")]
    MapChangeRejected { map: String, response: String },

    #[error("status output did not contain a player table")]
    StatusUnavailable,

    #[error("malformed RCON packet: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_display() {
        let error = RconError::UnknownCommand("sv_bogus 1".to_string());
        assert_eq!(error.to_string(), "unknown command: sv_bogus 1");
    }

    #[test]
    fn test_reconnect_failed_keeps_source() {
        let error = RconError::ReconnectFailed {
            address: "10.0.0.1:27015".to_string(),
            window: Duration::from_secs(1),
            source: Box::new(RconError::AuthenticationFailed("10.0.0.1:27015".to_string())),
        };

        let source = std::error::Error::source(&error).expect("source should be kept");
        assert!(source.to_string().contains("password rejected"));
    }

    #[test]
    fn test_io_conversion() {
        let error: RconError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(error, RconError::Io(_)));
    }
}
