//! Source RCON packet framing.
//!
//! ```text
//! | size: i32 LE | id: i32 LE | type: i32 LE | body ... | 0x00 | 0x00 |
//! ```
//!
//! `size` counts everything after itself.

use crate::error::RconError;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// id + type + two terminating NULs
const MIN_PACKET_SIZE: i32 = 10;
/// Servers split longer responses, but be lenient about what a single frame may carry.
const MAX_PACKET_SIZE: i32 = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl RconPacket {
    pub fn new(id: i32, kind: i32, body: &str) -> Self {
        Self {
            id,
            kind,
            body: body.to_string(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let size = MIN_PACKET_SIZE + body.len() as i32;

        let mut data = Vec::with_capacity(4 + size as usize);
        data.extend_from_slice(&size.to_le_bytes());
        data.extend_from_slice(&self.id.to_le_bytes());
        data.extend_from_slice(&self.kind.to_le_bytes());
        data.extend_from_slice(body);
        data.extend_from_slice(&[0, 0]);
        data
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let size = reader.read_i32_le().await?;
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::Protocol(format!("invalid packet size {}", size)));
        }

        let id = reader.read_i32_le().await?;
        let kind = reader.read_i32_le().await?;

        let mut body = vec![0u8; (size - 8) as usize];
        reader.read_exact(&mut body).await?;

        // Strip the body terminator and the empty string after it
        while body.last() == Some(&0) {
            body.pop();
        }

        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_layout() {
        let packet = RconPacket::new(7, SERVERDATA_EXECCOMMAND, "status");
        let data = packet.encode();

        assert_eq!(data.len(), 4 + 10 + "status".len());
        assert_eq!(&data[0..4], &16i32.to_le_bytes());
        assert_eq!(&data[4..8], &7i32.to_le_bytes());
        assert_eq!(&data[8..12], &SERVERDATA_EXECCOMMAND.to_le_bytes());
        assert_eq!(&data[12..18], b"status");
        assert_eq!(&data[18..], &[0, 0]);
    }

    #[tokio::test]
    async fn test_read_packet() {
        let encoded = RconPacket::new(3, SERVERDATA_RESPONSE_VALUE, "hostname: test").encode();
        let mut reader = Builder::new().read(&encoded).build();

        let packet = RconPacket::read_from(&mut reader).await.unwrap();
        assert_eq!(packet.id, 3);
        assert_eq!(packet.kind, SERVERDATA_RESPONSE_VALUE);
        assert_eq!(packet.body, "hostname: test");
    }

    #[tokio::test]
    async fn test_read_packet_split_across_reads() {
        let encoded = RconPacket::new(9, SERVERDATA_RESPONSE_VALUE, "abc").encode();
        let mut reader = Builder::new()
            .read(&encoded[..5])
            .read(&encoded[5..])
            .build();

        let packet = RconPacket::read_from(&mut reader).await.unwrap();
        assert_eq!(packet.id, 9);
        assert_eq!(packet.body, "abc");
    }

    #[tokio::test]
    async fn test_read_rejects_bad_size() {
        let mut data = Vec::new();
        data.extend_from_slice(&4i32.to_le_bytes());
        let mut reader = Builder::new().read(&data).build();

        let result = RconPacket::read_from(&mut reader).await;
        assert!(matches!(result, Err(RconError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_read_truncated_stream_is_io_error() {
        let encoded = RconPacket::new(1, SERVERDATA_RESPONSE_VALUE, "abcdef").encode();
        let mut reader = Builder::new().read(&encoded[..14]).build();

        let result = RconPacket::read_from(&mut reader).await;
        assert!(matches!(result, Err(RconError::Io(_))));
    }
}
