//! Boundary between the RCON client and whatever carries its bytes.
//!
//! The client never frames packets itself. It asks a [`Dialer`] for a
//! [`Transport`], writes commands through it and reads id-tagged responses
//! back. [`crate::tcp`] provides the implementation used against real
//! servers; tests plug in scripted ones.

use crate::error::RconError;
use async_trait::async_trait;

/// An authenticated request/response channel to one server.
#[async_trait]
pub trait Transport: Send {
    /// Writes a command and returns the request id it was tagged with.
    async fn send(&mut self, command: &str) -> Result<i32, RconError>;

    /// Reads the next response body and the request id it answers.
    async fn receive(&mut self) -> Result<(String, i32), RconError>;

    async fn close(&mut self) -> Result<(), RconError>;
}

/// Opens authenticated transports.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Transport: Transport;

    async fn dial(&self, address: &str, password: &str) -> Result<Self::Transport, RconError>;
}
