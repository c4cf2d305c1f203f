//! Source RCON packet framing, with the extra chat-stream packet type the
//! Squad server pushes to connected RCON clients.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;
/// Unsolicited chat packets streamed by the Squad server.
pub const SQUAD_CHAT_STREAM: i32 = 1;

/// The id the server echoes back on a failed auth attempt.
pub const AUTH_FAILED_ID: i32 = -1;

/// An RCON packet body is capped well below this; anything larger means we
/// lost framing.
const MAX_PACKET_SIZE: usize = 8192;

/// Everything after the leading size field: id, type, NUL-terminated body,
/// trailing empty string.
const PACKET_OVERHEAD: usize = 4 + 4 + 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub packet_type: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, packet_type: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            packet_type,
            body: body.into(),
        }
    }

    /// Encodes the packet for the wire: little-endian size, id, and type,
    /// then the body and two NUL terminators.
    pub fn encode(&self) -> Vec<u8> {
        let size = self.body.len() + PACKET_OVERHEAD;
        let mut buffer = Vec::with_capacity(size + 4);
        buffer.extend_from_slice(&(size as i32).to_le_bytes());
        buffer.extend_from_slice(&self.id.to_le_bytes());
        buffer.extend_from_slice(&self.packet_type.to_le_bytes());
        buffer.extend_from_slice(self.body.as_bytes());
        buffer.extend_from_slice(&[0, 0]);
        buffer
    }

    /// Reads one packet off the stream.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self> {
        let mut size_bytes = [0u8; 4];
        reader.read_exact(&mut size_bytes).await?;
        let size = i32::from_le_bytes(size_bytes) as usize;
        if !(PACKET_OVERHEAD..=MAX_PACKET_SIZE).contains(&size) {
            return Err(Error::MalformedPacket(format!("size field {}", size)));
        }

        let mut payload = vec![0u8; size];
        reader.read_exact(&mut payload).await?;

        let id = i32::from_le_bytes(payload[0..4].try_into().unwrap());
        let packet_type = i32::from_le_bytes(payload[4..8].try_into().unwrap());
        let body = String::from_utf8_lossy(&payload[8..size - 2])
            .trim_matches('\0')
            .to_string();
        Ok(Self {
            id,
            packet_type,
            body,
        })
    }
}
