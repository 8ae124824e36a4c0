/*!
 * Configuration: construction-time `RaftConfig` (validated, spec §4.1) and
 * a file-backed `NodeConfig` for the demo binary (serde + the `toml`
 * crate, with environment-variable overrides).
 */

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::NodeId;

/// Construction-time configuration for a `RaftCore`.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// This replica's id. Must be non-zero.
    pub id: NodeId,
    /// Ticks between heartbeats while leader.
    pub heartbeat_tick: u64,
    /// Ticks before a Follower/Candidate starts an election. Must exceed
    /// `heartbeat_tick`.
    pub election_tick: u64,
    /// Applied-index watermark, used only when restarting from storage.
    pub applied: u64,
    /// Initial peer list, used only when bootstrapping a fresh cluster
    /// (ignored if storage already has a configuration).
    pub peers: Vec<NodeId>,
}

impl Default for RaftConfig {
    fn default() -> Self {
        RaftConfig {
            id: 0,
            heartbeat_tick: 1,
            election_tick: 10,
            applied: 0,
            peers: Vec::new(),
        }
    }
}

impl RaftConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id == 0 {
            return Err(ConfigError::ZeroId);
        }
        if self.heartbeat_tick == 0 {
            return Err(ConfigError::NonPositiveHeartbeat);
        }
        if self.election_tick <= self.heartbeat_tick {
            return Err(ConfigError::ElectionNotGreaterThanHeartbeat {
                election: self.election_tick,
                heartbeat: self.heartbeat_tick,
            });
        }
        Ok(())
    }
}

/// File-backed configuration for the demo binary: node identity, peer
/// addresses, tick counts, and logging. Not read by the core itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub cluster: ClusterSection,
    pub consensus: ConsensusSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    pub id: u64,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    pub peers: Vec<PeerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    pub id: u64,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSection {
    pub heartbeat_tick: u64,
    pub election_tick: u64,
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let contents = fs::read_to_string(path).map_err(ConfigFileError::Io)?;
        let config: NodeConfig = toml::from_str(&contents).map_err(ConfigFileError::Parse)?;
        config.to_raft_config().validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let contents = toml::to_string_pretty(self).map_err(ConfigFileError::Serialize)?;
        fs::write(path, contents).map_err(ConfigFileError::Io)
    }

    pub fn default_for_node(id: u64) -> Self {
        NodeConfig {
            node: NodeSection {
                id,
                log_level: "info".to_string(),
            },
            cluster: ClusterSection {
                peers: vec![
                    PeerEntry { id: 1, address: "127.0.0.1:5001".to_string() },
                    PeerEntry { id: 2, address: "127.0.0.1:5002".to_string() },
                    PeerEntry { id: 3, address: "127.0.0.1:5003".to_string() },
                ],
            },
            consensus: ConsensusSection {
                heartbeat_tick: 1,
                election_tick: 10,
            },
        }
    }

    /// Apply `RAFT_NODE_ID` / `RAFT_LOG_LEVEL` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        use std::env;

        if let Ok(val) = env::var("RAFT_NODE_ID") {
            if let Ok(id) = val.parse() {
                self.node.id = id;
            }
        }
        if let Ok(val) = env::var("RAFT_LOG_LEVEL") {
            self.node.log_level = val;
        }
    }

    pub fn to_raft_config(&self) -> RaftConfig {
        RaftConfig {
            id: self.node.id,
            heartbeat_tick: self.consensus.heartbeat_tick,
            election_tick: self.consensus.election_tick,
            applied: 0,
            peers: self.cluster.peers.iter().map(|p| p.id).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("i/o error reading configuration: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[source] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Validation(#[from] ConfigError),
}
