//! # fusekv-server
//!
//! Node process around `fusekv-core`: cluster membership, deterministic
//! leader election, heartbeat-based failure detection, and synchronous
//! best-effort replication to followers over a binary-framed TCP protocol.
//!
//! This is single-leader best-effort replication, not consensus: local
//! commits never wait for followers, and there is no quorum durability.

/// Cluster membership, election, and the replication node.
pub mod cluster;
/// JSON + environment configuration for a node process.
pub mod config;
/// Replication RPC transport: framed protocol, client, and listener.
pub mod rpc;

pub use cluster::{ClusterConfig, ClusterError, Node, NodeConfig};
pub use rpc::{ReplicaHandler, ReplicationClient, ReplicationServer};
