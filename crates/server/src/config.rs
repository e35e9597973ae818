//! Node process configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional JSON file, and `FUSEKV_*` environment variables. Command-line
//! flags are applied last by `main`.

use crate::cluster::NodeConfig;
use fusekv_core::config::DEFAULT_SNAPSHOT_EVERY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Role selection. `auto` derives leadership from the election; `standalone`
/// disables clustering entirely.
pub const ROLE_AUTO: &str = "auto";
pub const ROLE_STANDALONE: &str = "standalone";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node_id: String,
    pub data_dir: String,
    pub role: String,
    pub listen_addr: String,
    /// Peer list as `id=host:port` entries.
    pub peers: Vec<String>,
    /// Mutations between snapshots; 0 disables periodic compaction.
    pub snapshot_every: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_id: "node1".to_string(),
            data_dir: "./data".to_string(),
            role: ROLE_AUTO.to_string(),
            listen_addr: "127.0.0.1:7600".to_string(),
            peers: Vec::new(),
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid config {}: {e}", path.display()),
            )
        })
    }

    /// Overlay `FUSEKV_*` environment variables.
    pub fn apply_env(&mut self) {
        for (var, target) in [
            ("FUSEKV_NODE_ID", &mut self.node_id),
            ("FUSEKV_DATA_DIR", &mut self.data_dir),
            ("FUSEKV_ROLE", &mut self.role),
            ("FUSEKV_LISTEN_ADDR", &mut self.listen_addr),
        ] {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }
    }

    pub fn is_standalone(&self) -> bool {
        self.role == ROLE_STANDALONE || self.peers.is_empty()
    }

    /// Parse the `id=host:port` peer entries.
    pub fn peer_configs(&self) -> io::Result<Vec<NodeConfig>> {
        self.peers
            .iter()
            .map(|entry| {
                let (id, address) = entry.split_once('=').ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("peer entry {entry:?} is not of the form id=host:port"),
                    )
                })?;
                if id.is_empty() || address.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("peer entry {entry:?} has an empty id or address"),
                    ));
                }
                Ok(NodeConfig {
                    id: id.to_string(),
                    address: address.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"node_id": "n7", "peers": ["n8=10.0.0.8:7600"]}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.node_id, "n7");
        assert_eq!(settings.peers.len(), 1);
        assert_eq!(settings.role, ROLE_AUTO);
        assert_eq!(settings.snapshot_every, DEFAULT_SNAPSHOT_EVERY);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn peer_entries_parse_into_members() {
        let settings = Settings {
            peers: vec!["n2=10.0.0.2:7600".to_string(), "n3=10.0.0.3:7600".to_string()],
            ..Settings::default()
        };
        let members = settings.peer_configs().unwrap();
        assert_eq!(members[0].id, "n2");
        assert_eq!(members[0].address, "10.0.0.2:7600");
        assert_eq!(members[1].id, "n3");
    }

    #[test]
    fn malformed_peer_entry_is_rejected() {
        for bad in ["plain-address:7600", "=addr", "id="] {
            let settings = Settings {
                peers: vec![bad.to_string()],
                ..Settings::default()
            };
            assert!(settings.peer_configs().is_err(), "entry {bad:?} must fail");
        }
    }

    #[test]
    fn no_peers_means_standalone() {
        assert!(Settings::default().is_standalone());
        let clustered = Settings {
            peers: vec!["n2=10.0.0.2:7600".to_string()],
            ..Settings::default()
        };
        assert!(!clustered.is_standalone());
    }
}
