//! RCON client with request/response correlation and reconnects.

use crate::error::RconError;
use crate::tcp::TcpDialer;
use crate::transport::{Dialer, Transport};
use log::{debug, info, warn};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// Reads allowed while waiting for the response matching a request id.
pub const MAX_RESPONSE_ATTEMPTS: usize = 10;

pub const DEFAULT_RECONNECT_WINDOW: Duration = Duration::from_secs(60);

const RECONNECT_BACKOFF: Duration = Duration::from_millis(250);

// "cvar_name" = "current value" ( def. "default value" )
//  var flags like notify replicated
//  - short description of cvar
static CVAR_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"(?:.*?)" = "(.*?)""#).expect("Invalid regex pattern for cvar value")
});

/// Connection settings for one server.
#[derive(Debug, Clone)]
pub struct RconConfig {
    /// `host:port` of the server's RCON endpoint
    pub address: String,
    pub password: String,
    /// How long [`RconConnection::change_password`] keeps redialing
    pub reconnect_window: Duration,
}

impl RconConfig {
    pub fn new(address: &str, password: &str) -> Self {
        Self {
            address: address.to_string(),
            password: password.to_string(),
            reconnect_window: DEFAULT_RECONNECT_WINDOW,
        }
    }
}

/// A persistent RCON connection to one server.
///
/// Methods take `&mut self`; share a connection between tasks by wrapping it
/// in a `tokio::sync::Mutex`.
pub struct RconConnection<D: Dialer = TcpDialer> {
    address: String,
    password: String,
    reconnect_window: Duration,
    dialer: D,
    transport: Option<D::Transport>,
}

impl RconConnection<TcpDialer> {
    /// Dials `address` over TCP and authenticates with `password`.
    pub async fn connect(address: &str, password: &str) -> Result<Self, RconError> {
        Self::from_config(&RconConfig::new(address, password)).await
    }

    pub async fn from_config(config: &RconConfig) -> Result<Self, RconError> {
        let mut conn =
            Self::connect_with(TcpDialer::default(), &config.address, &config.password).await?;
        conn.reconnect_window = config.reconnect_window;
        Ok(conn)
    }
}

impl<D: Dialer> RconConnection<D> {
    pub async fn connect_with(dialer: D, address: &str, password: &str) -> Result<Self, RconError> {
        let transport = dialer.dial(address, password).await?;
        info!("Connected to {}", address);

        Ok(Self {
            address: address.to_string(),
            password: password.to_string(),
            reconnect_window: DEFAULT_RECONNECT_WINDOW,
            dialer,
            transport: Some(transport),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn set_reconnect_window(&mut self, window: Duration) {
        self.reconnect_window = window;
    }

    fn transport(&mut self) -> Result<&mut D::Transport, RconError> {
        self.transport.as_mut().ok_or(RconError::NotConnected)
    }

    /// Sends a command and waits for the response carrying the same request id.
    ///
    /// Responses to earlier requests (for example ones sent with
    /// [`send_no_response`](Self::send_no_response)) are skipped, at most
    /// [`MAX_RESPONSE_ATTEMPTS`] reads in total.
    pub async fn send(&mut self, command: &str) -> Result<String, RconError> {
        let transport = self.transport()?;
        let request_id = transport.send(command).await?;

        let mut response = None;
        for _ in 0..MAX_RESPONSE_ATTEMPTS {
            let (body, response_id) = transport.receive().await?;
            if response_id == request_id {
                response = Some(body);
                break;
            }
            debug!(
                "Skipping response {} while waiting for {} ({})",
                response_id, request_id, command
            );
        }

        let response = response.ok_or_else(|| RconError::ResponseTimeout {
            command: command.to_string(),
            attempts: MAX_RESPONSE_ATTEMPTS,
        })?;

        if response.starts_with("Unknown command") {
            return Err(RconError::UnknownCommand(command.to_string()));
        }

        Ok(response)
    }

    /// Writes a command without reading its response.
    pub async fn send_no_response(&mut self, command: &str) -> Result<(), RconError> {
        self.transport()?.send(command).await?;
        Ok(())
    }

    /// Runs a command whose failure must not stop the caller, logging any error.
    pub async fn send_best_effort(&mut self, command: &str) {
        if let Err(e) = self.send_no_response(command).await {
            warn!("Best-effort command {:?} to {} failed: {}", command, self.address, e);
        }
    }

    /// Reads the current value of a console variable.
    pub async fn get_variable(&mut self, name: &str) -> Result<String, RconError> {
        let raw = self.send(name).await?;

        let first_line = raw.lines().next().unwrap_or_default();
        CVAR_VALUE
            .captures(first_line)
            .and_then(|m| m.get(1))
            .map(|value| value.as_str().to_string())
            .ok_or_else(|| RconError::UnknownVariable(name.to_string()))
    }

    pub async fn set_variable(&mut self, name: &str, value: &str) -> Result<String, RconError> {
        self.send(&format!("{} \"{}\"", name, value)).await
    }

    /// Changes `rcon_password` and reconnects, since the open transport was
    /// authenticated with the old password.
    pub async fn change_password(&mut self, password: &str) -> Result<(), RconError> {
        self.set_variable("rcon_password", password).await?;
        self.password = password.to_string();
        self.reconnect(self.reconnect_window).await
    }

    /// Drops the current transport and redials until one attempt succeeds or
    /// `window` has elapsed. Each attempt only gets the time left in the
    /// window, so a dial that never resolves still ends the loop.
    pub async fn reconnect(&mut self, window: Duration) -> Result<(), RconError> {
        self.close().await;

        let started = Instant::now();
        loop {
            let remaining = window.saturating_sub(started.elapsed());
            let attempt = timeout(remaining, self.dialer.dial(&self.address, &self.password)).await;
            let error = match attempt {
                Ok(Ok(transport)) => {
                    info!("Reconnected to {}", self.address);
                    self.transport = Some(transport);
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_) => RconError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("dialing {} did not finish within {:?}", self.address, window),
                )),
            };

            let remaining = window.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(RconError::ReconnectFailed {
                    address: self.address.clone(),
                    window,
                    source: Box::new(error),
                });
            }

            warn!("Reconnecting to {} failed: {}", self.address, error);
            sleep(RECONNECT_BACKOFF.min(remaining)).await;
        }
    }

    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Error closing connection to {}: {}", self.address, e);
            }
        }
    }
}
