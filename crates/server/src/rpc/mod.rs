//! Replication RPC transport.
//!
//! Two unary calls carried over framed TCP: `Replicate(record) -> ack` and
//! `Heartbeat() -> ack`. The transport dispatches inbound calls into the
//! narrow [`ReplicaHandler`] capability surface owned by the node, keeping
//! the storage side free of any dependency on the network layer.

/// Outbound client with per-call timeout.
pub mod client;
/// Wire framing and message payloads.
pub mod protocol;
/// Inbound listener dispatching into a [`ReplicaHandler`].
pub mod server;

pub use client::ReplicationClient;
pub use protocol::{ReplicationMessage, OP_DELETE, OP_SET};
pub use server::ReplicationServer;

/// Operations the transport may invoke on the local node.
///
/// Replicated records bypass the local WAL: durability for them lives in the
/// sender's log.
pub trait ReplicaHandler: Send + Sync + 'static {
    fn apply_set(&self, key: String, value: Vec<u8>);
    fn apply_delete(&self, key: &str);
    fn record_heartbeat(&self);
}
