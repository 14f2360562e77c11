//! Framing of secret-tagged log datagrams.
//!
//! ```text
//! FF FF FF FF 'S' <secret digits> [' '] "L " <MM/DD/YYYY - HH:MM:SS> ": " <message> [\n] [\0]
//! ```

use crate::error::PacketError;
use std::borrow::Cow;

/// Four header bytes and the marker.
pub const HEADER_LEN: usize = 5;

pub const SECRET_MARKER: u8 = b'S';

#[derive(Debug, PartialEq, Eq)]
pub struct LogPacket<'a> {
    pub secret: &'a str,
    /// Log text starting at the `L ` prefix
    pub payload: Cow<'a, str>,
}

pub fn parse(datagram: &[u8]) -> Result<LogPacket<'_>, PacketError> {
    if datagram.len() < HEADER_LEN {
        return Err(PacketError::TooShort(datagram.len()));
    }

    let marker = datagram[HEADER_LEN - 1];
    if marker != SECRET_MARKER {
        return Err(PacketError::BadMarker(marker));
    }

    let rest = &datagram[HEADER_LEN..];
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(PacketError::MissingSecret);
    }

    let (secret, mut payload) = rest.split_at(digits);
    if let Some(stripped) = payload.strip_prefix(b" ") {
        payload = stripped;
    }
    if !payload.starts_with(b"L ") {
        return Err(PacketError::MissingPrefix);
    }

    Ok(LogPacket {
        // ASCII digits only
        secret: std::str::from_utf8(secret).map_err(|_| PacketError::MissingSecret)?,
        payload: String::from_utf8_lossy(payload),
    })
}
