//! Cluster membership and deterministic leader election.
//!
//! Election is a pure function of the membership set: the lexicographically
//! smallest node id wins. Every node computes it independently and converges
//! to the same answer without any vote exchange.

mod node;

pub use node::Node;

use fusekv_core::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One member of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub address: String,
}

/// A node's local view of the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub local: NodeConfig,
    pub peers: Vec<NodeConfig>,
    pub leader_id: String,
}

impl ClusterConfig {
    /// Build a view with the leader already elected.
    pub fn new(local: NodeConfig, peers: Vec<NodeConfig>) -> Self {
        let leader_id = elect_leader(&local.id, &peers);
        Self {
            local,
            peers,
            leader_id,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.leader_id == self.local.id
    }
}

/// Pick the lexicographically smallest id among self and all peers.
pub fn elect_leader(local_id: &str, peers: &[NodeConfig]) -> String {
    peers
        .iter()
        .map(|p| p.id.as_str())
        .chain(std::iter::once(local_id))
        .min()
        .unwrap_or(local_id)
        .to_string()
}

#[derive(Debug, Error)]
pub enum ClusterError {
    /// Write attempted on a follower. Callers should redirect to the leader.
    #[error("not the cluster leader")]
    NotLeader,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            address: "127.0.0.1:0".to_string(),
        }
    }

    #[test]
    fn election_picks_smallest_id_regardless_of_order() {
        let orderings = [["n2", "n3"], ["n3", "n2"]];
        for peers in orderings {
            let peers: Vec<_> = peers.iter().map(|id| member(id)).collect();
            assert_eq!(elect_leader("n1", &peers), "n1");
        }
        let peers = vec![member("n1"), member("n3")];
        assert_eq!(elect_leader("n2", &peers), "n1");
    }

    #[test]
    fn single_node_elects_itself() {
        assert_eq!(elect_leader("solo", &[]), "solo");
        let config = ClusterConfig::new(member("solo"), vec![]);
        assert!(config.is_leader());
    }

    #[test]
    fn every_node_converges_to_the_same_leader() {
        let ids = ["nc", "na", "nb"];
        for local in ids {
            let peers: Vec<_> = ids
                .iter()
                .filter(|id| **id != local)
                .map(|id| member(id))
                .collect();
            assert_eq!(elect_leader(local, &peers), "na");
        }
    }
}
