//! Wire framing for the replication protocol.
//!
//! Every message is `[u32 msg_type BE][u32 payload_len BE][payload]` with a
//! JSON payload. Framing stays fixed-width binary so a reader can skip
//! messages it does not understand; payloads stay JSON so they can grow
//! fields without a version bump.

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Replicate one mutation to a follower.
pub const MSG_REPLICATE: u32 = 0x01;
/// Follower's acknowledgement of a replicated mutation.
pub const MSG_REPLICATE_ACK: u32 = 0x02;
/// Leader liveness probe.
pub const MSG_HEARTBEAT: u32 = 0x10;
/// Follower's acknowledgement of a heartbeat.
pub const MSG_HEARTBEAT_ACK: u32 = 0x11;

/// Upper bound on a single payload. Anything larger is a corrupt or hostile
/// frame, not a legitimate record.
pub const MAX_PAYLOAD_BYTES: u32 = 64 * 1024 * 1024;

/// Mutation op carried in a [`ReplicationMessage`].
pub const OP_SET: u8 = 1;
pub const OP_DELETE: u8 = 2;

/// One replicated mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicationMessage {
    pub op: u8,
    pub key: String,
    /// Present for [`OP_SET`], absent for [`OP_DELETE`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
}

impl ReplicationMessage {
    pub fn set(key: &str, value: Vec<u8>) -> Self {
        Self {
            op: OP_SET,
            key: key.to_string(),
            value: Some(value),
        }
    }

    pub fn delete(key: &str) -> Self {
        Self {
            op: OP_DELETE,
            key: key.to_string(),
            value: None,
        }
    }
}

/// Acknowledgement for both replication and heartbeat calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    pub success: bool,
}

/// Write one framed message.
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg_type: u32,
    payload: &[u8],
) -> io::Result<()> {
    writer.write_all(&msg_type.to_be_bytes()).await?;
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Read one framed message. Errors with `InvalidData` when the declared
/// payload length exceeds [`MAX_PAYLOAD_BYTES`].
pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<(u32, Vec<u8>)> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).await?;
    let msg_type = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

    if len > MAX_PAYLOAD_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("payload of {len} bytes exceeds limit"),
        ));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok((msg_type, payload))
}

pub fn encode<T: Serialize>(value: &T) -> io::Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> io::Result<T> {
    serde_json::from_slice(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
