//! Outbound replication client.
//!
//! One short-lived connection per call, the whole call wrapped in a single
//! timeout. Connection pooling is deliberately absent: replication traffic is
//! one frame per mutation and a fresh connect keeps failure handling trivial.

use super::protocol::{
    self, Ack, ReplicationMessage, MSG_HEARTBEAT, MSG_HEARTBEAT_ACK, MSG_REPLICATE,
    MSG_REPLICATE_ACK,
};
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

/// Client for one peer. Cheap to clone; holds no live connection.
#[derive(Debug, Clone)]
pub struct ReplicationClient {
    addr: String,
    timeout: Duration,
}

impl ReplicationClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Push one mutation to the peer and wait for its ack.
    pub async fn replicate(&self, msg: &ReplicationMessage) -> io::Result<()> {
        let payload = protocol::encode(msg)?;
        let ack = self.call(MSG_REPLICATE, &payload, MSG_REPLICATE_ACK).await?;
        if !ack.success {
            return Err(io::Error::other(format!(
                "peer {} rejected replicated record",
                self.addr
            )));
        }
        Ok(())
    }

    /// Probe the peer for liveness.
    pub async fn send_heartbeat(&self) -> io::Result<()> {
        self.call(MSG_HEARTBEAT, b"{}", MSG_HEARTBEAT_ACK).await?;
        Ok(())
    }

    async fn call(&self, msg_type: u32, payload: &[u8], expect: u32) -> io::Result<Ack> {
        tokio::time::timeout(self.timeout, self.roundtrip(msg_type, payload, expect))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("call to {} timed out after {:?}", self.addr, self.timeout),
                )
            })?
    }

    async fn roundtrip(&self, msg_type: u32, payload: &[u8], expect: u32) -> io::Result<Ack> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        protocol::write_message(&mut stream, msg_type, payload).await?;

        let (reply_type, reply_payload) = protocol::read_message(&mut stream).await?;
        if reply_type != expect {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected message type {expect:#x}, got {reply_type:#x}"),
            ));
        }
        protocol::decode(&reply_payload)
    }
}
