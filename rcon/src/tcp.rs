//! TCP transport speaking the Source RCON protocol.

use crate::error::RconError;
use crate::packet::{
    RconPacket, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND,
};
use crate::transport::{Dialer, Transport};
use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Servers send an empty RESPONSE_VALUE before the auth response. Anything
/// beyond a few packets means the peer is not speaking RCON.
const MAX_AUTH_PACKETS: usize = 4;

/// An authenticated RCON stream. Request ids start at 1 and increase by one
/// per packet written.
pub struct RconStream<S> {
    stream: S,
    last_id: i32,
}

impl<S> RconStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Sends the password over `stream` and waits for the server's verdict.
    pub async fn authenticate(stream: S, address: &str, password: &str) -> Result<Self, RconError> {
        let mut conn = Self { stream, last_id: 0 };

        let auth_id = conn.next_request_id()?;
        conn.write_packet(&RconPacket::new(auth_id, SERVERDATA_AUTH, password))
            .await?;

        for _ in 0..MAX_AUTH_PACKETS {
            let packet = RconPacket::read_from(&mut conn.stream).await?;
            if packet.kind != SERVERDATA_AUTH_RESPONSE {
                debug!("Skipping packet type {} during auth", packet.kind);
                continue;
            }

            return match packet.id {
                -1 => Err(RconError::AuthenticationFailed(address.to_string())),
                id if id == auth_id => Ok(conn),
                id => Err(RconError::Protocol(format!(
                    "auth response id {} does not match request {}",
                    id, auth_id
                ))),
            };
        }

        Err(RconError::Protocol("no auth response".to_string()))
    }

    fn next_request_id(&mut self) -> Result<i32, RconError> {
        self.last_id = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| RconError::Protocol("request id space exhausted".to_string()))?;
        Ok(self.last_id)
    }

    async fn write_packet(&mut self, packet: &RconPacket) -> Result<(), RconError> {
        self.stream.write_all(&packet.encode()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<S> Transport for RconStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, command: &str) -> Result<i32, RconError> {
        let id = self.next_request_id()?;
        self.write_packet(&RconPacket::new(id, SERVERDATA_EXECCOMMAND, command))
            .await?;
        Ok(id)
    }

    async fn receive(&mut self) -> Result<(String, i32), RconError> {
        let packet = RconPacket::read_from(&mut self.stream).await?;
        Ok((packet.body, packet.id))
    }

    async fn close(&mut self) -> Result<(), RconError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Dials servers over TCP.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    pub connect_timeout: Duration,
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Transport = RconStream<TcpStream>;

    /// Connects and authenticates. `connect_timeout` bounds both steps, so a
    /// peer that accepts but never answers cannot stall the caller.
    async fn dial(&self, address: &str, password: &str) -> Result<Self::Transport, RconError> {
        let handshake = async {
            let stream = TcpStream::connect(address).await?;
            stream.set_nodelay(true)?;
            RconStream::authenticate(stream, address, password).await
        };

        let conn = timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                RconError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {} timed out", address),
                ))
            })??;
        info!("RCON connection to {} authenticated", address);
        Ok(conn)
    }
}
