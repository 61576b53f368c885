use filechain_core::IntegrityReport;
use filechain_storage::FileAlert;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    directory::PeerDirectory, node::validate_node_id, NodeConfig, NodeError, NodeSummary, PeerNode,
    Result,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    IntegrityViolation {
        node_id: String,
        details: IntegrityReport,
    },
    FileModification {
        node_id: String,
        details: FileAlert,
    },
}

/// Registry of the nodes running in this process.
pub struct Network {
    config: NodeConfig,
    nodes: RwLock<BTreeMap<String, Arc<PeerNode>>>,
    admission: Mutex<()>,
}

impl Network {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            nodes: RwLock::new(BTreeMap::new()),
            admission: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Starts a node, meshes it with every registered node and syncs it to
    /// the longest chain among them. Duplicate ids and ports are refused
    /// before anything is started.
    pub async fn add_node(&self, node_id: &str, port: u16) -> Result<Arc<PeerNode>> {
        let _admission = self.admission.lock().await;
        validate_node_id(node_id)?;
        {
            let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
            if nodes.contains_key(node_id) {
                return Err(NodeError::DuplicateNode(node_id.to_string()));
            }
            if port != 0 && nodes.values().any(|n| n.port() == port) {
                return Err(NodeError::PortInUse(port));
            }
        }

        let node = PeerNode::start(node_id, port, self.config.clone()).await?;
        node.bootstrap(self).await?;
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_id.to_string(), Arc::clone(&node));
        info!(node = node_id, port = node.port(), "node added to network");
        Ok(node)
    }

    pub fn get(&self, node_id: &str) -> Result<Arc<PeerNode>> {
        self.lookup(node_id)
            .ok_or_else(|| NodeError::UnknownNode(node_id.to_string()))
    }

    pub fn list_nodes(&self) -> Result<Vec<NodeSummary>> {
        self.members().iter().map(|n| n.summary()).collect()
    }

    /// Integrity violations and stored-file alerts across every node.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut out = Vec::new();
        for node in self.members() {
            let report = node.check_integrity();
            if !report.is_valid() {
                out.push(Notification::IntegrityViolation {
                    node_id: node.id().to_string(),
                    details: report,
                });
            }
            match node.verify_files() {
                Ok(alerts) => out.extend(alerts.into_iter().map(|details| {
                    Notification::FileModification {
                        node_id: node.id().to_string(),
                        details,
                    }
                })),
                Err(e) => warn!(node = node.id(), error = %e, "file verification failed"),
            }
        }
        out
    }

    pub fn shutdown(&self) {
        for node in self.members() {
            node.shutdown();
        }
    }
}

impl PeerDirectory for Network {
    fn members(&self) -> Vec<Arc<PeerNode>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn lookup(&self, node_id: &str) -> Option<Arc<PeerNode>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_id)
            .cloned()
    }
}
