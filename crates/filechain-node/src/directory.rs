use std::sync::Arc;

use crate::PeerNode;

/// Source of peers for bootstrap. Injected rather than global so nodes can be
/// wired from a registry, a static list, or nothing at all.
pub trait PeerDirectory: Send + Sync {
    fn members(&self) -> Vec<Arc<PeerNode>>;

    fn lookup(&self, node_id: &str) -> Option<Arc<PeerNode>> {
        self.members().into_iter().find(|n| n.id() == node_id)
    }
}

/// A fixed peer list.
#[derive(Clone, Default)]
pub struct StaticDirectory {
    nodes: Vec<Arc<PeerNode>>,
}

impl StaticDirectory {
    pub fn new(nodes: Vec<Arc<PeerNode>>) -> Self {
        Self { nodes }
    }
}

impl PeerDirectory for StaticDirectory {
    fn members(&self) -> Vec<Arc<PeerNode>> {
        self.nodes.clone()
    }
}
