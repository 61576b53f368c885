use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    time::Duration,
};

use filechain_core::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};

use crate::constants::{DEFAULT_IO_TIMEOUT_SECS, DEFAULT_MAX_LINE_LEN, DEFAULT_STORAGE_ROOT};

/// Settings shared by every node of a deployment.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Interface peer listeners bind to.
    pub host: IpAddr,
    /// Parent of the per-node storage directories.
    pub storage_root: PathBuf,
    pub difficulty: usize,
    pub mining_reward: u64,
    /// Bound on every connect, and on each read or write of the peer protocol.
    pub io_timeout: Duration,
    pub max_line_len: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            io_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl NodeConfig {
    pub fn storage_dir(&self, node_id: &str) -> PathBuf {
        self.storage_root.join(format!("node_{node_id}_files"))
    }
}
