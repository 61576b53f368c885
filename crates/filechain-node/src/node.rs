use filechain_core::{
    Block, Chain, ChainSnapshot, Fingerprint, IntegrityReport, SyncOutcome, TamperOutcome,
    Transaction,
};
use filechain_storage::{FileAlert, FileStore};
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    net::SocketAddr,
    path::Path,
    sync::{Arc, Mutex, PoisonError, RwLock, Weak},
};
use tokio::{net::TcpListener, sync::watch};
use tracing::{debug, info, warn};

use crate::{
    directory::PeerDirectory, server::FileServer, shared_chain::SharedChain, transfer, NodeConfig,
    NodeError, Result,
};

/// How a node reaches one of its peers.
#[derive(Clone, Debug)]
pub struct PeerLink {
    pub endpoint: SocketAddr,
    /// In-process handle used for chain gossip; absent for endpoint-only peers.
    handle: Option<Weak<PeerNode>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub node_id: String,
    pub port: u16,
    pub peers: BTreeMap<String, u16>,
    pub files: BTreeMap<Fingerprint, String>,
    pub chain_length: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainView {
    pub node_id: String,
    pub valid: bool,
    pub length: usize,
    pub blocks: Vec<Block>,
    pub pending: Vec<Transaction>,
}

pub fn validate_node_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(NodeError::InvalidNodeId(id.to_string()))
    }
}

/// One ledger participant: a chain, a file store, a peer listener and the
/// outbound gossip and transfer logic.
pub struct PeerNode {
    id: String,
    endpoint: SocketAddr,
    config: NodeConfig,
    chain: SharedChain,
    store: FileStore,
    peers: RwLock<BTreeMap<String, PeerLink>>,
    pulls: Mutex<BTreeSet<Fingerprint>>,
    shutdown: watch::Sender<bool>,
}

/// Marks a fingerprint as being pulled until dropped.
struct PullGuard<'a> {
    pulls: &'a Mutex<BTreeSet<Fingerprint>>,
    fingerprint: Fingerprint,
}

impl<'a> PullGuard<'a> {
    fn claim(pulls: &'a Mutex<BTreeSet<Fingerprint>>, fingerprint: &Fingerprint) -> Result<Self> {
        let fresh = pulls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint.clone());
        if !fresh {
            return Err(NodeError::TransferInProgress(fingerprint.clone()));
        }
        Ok(Self {
            pulls,
            fingerprint: fingerprint.clone(),
        })
    }
}

impl Drop for PullGuard<'_> {
    fn drop(&mut self) {
        self.pulls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.fingerprint);
    }
}

impl PeerNode {
    /// Binds the peer listener and starts serving. The node starts with no
    /// peers; wire it up with [`PeerNode::bootstrap`], [`PeerNode::link`] or
    /// [`PeerNode::add_peer`]. Port 0 picks an ephemeral port.
    pub async fn start(id: &str, port: u16, config: NodeConfig) -> Result<Arc<Self>> {
        validate_node_id(id)?;
        let store = FileStore::open(config.storage_dir(id))?;
        let listener = TcpListener::bind((config.host, port))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => NodeError::PortInUse(port),
                _ => NodeError::Io(e),
            })?;
        let endpoint = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let server = FileServer {
            node_id: id.to_string(),
            store: store.clone(),
            config: config.clone(),
        };
        tokio::spawn(server.listen(listener, shutdown_rx));

        let chain = Chain::new(config.difficulty, config.mining_reward);
        info!(node = id, %endpoint, storage = %store.root().display(), "node started");
        Ok(Arc::new(Self {
            id: id.to_string(),
            endpoint,
            config,
            chain: SharedChain::new(chain),
            store,
            peers: RwLock::new(BTreeMap::new()),
            pulls: Mutex::new(BTreeSet::new()),
            shutdown,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    pub fn peers(&self) -> BTreeMap<String, SocketAddr> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, link)| (id.clone(), link.endpoint))
            .collect()
    }

    fn peer_link(&self, peer_id: &str) -> Option<PeerLink> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer_id)
            .cloned()
    }

    fn insert_peer(&self, peer_id: &str, link: PeerLink) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer_id.to_string(), link);
    }

    fn peer_handles(&self) -> Vec<Arc<PeerNode>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|link| link.handle.as_ref().and_then(Weak::upgrade))
            .collect()
    }

    /// Registers a peer known only by endpoint. It can serve file pulls but
    /// receives no gossip from this node.
    pub fn add_peer(&self, peer_id: &str, endpoint: SocketAddr) {
        self.insert_peer(
            peer_id,
            PeerLink {
                endpoint,
                handle: None,
            },
        );
    }

    /// Connects two in-process nodes in both directions.
    pub fn link(a: &Arc<PeerNode>, b: &Arc<PeerNode>) {
        if a.id == b.id {
            return;
        }
        a.insert_peer(
            &b.id,
            PeerLink {
                endpoint: b.endpoint,
                handle: Some(Arc::downgrade(b)),
            },
        );
        b.insert_peer(
            &a.id,
            PeerLink {
                endpoint: a.endpoint,
                handle: Some(Arc::downgrade(a)),
            },
        );
    }

    /// Full-mesh links to every directory member, then adoption of the
    /// longest chain any of them holds.
    pub async fn bootstrap(self: &Arc<Self>, directory: &dyn PeerDirectory) -> Result<Option<SyncOutcome>> {
        let members: Vec<Arc<PeerNode>> = directory
            .members()
            .into_iter()
            .filter(|m| m.id != self.id)
            .collect();
        for member in &members {
            PeerNode::link(self, member);
        }
        info!(node = %self.id, peers = members.len(), "bootstrapped");

        let Some(longest) = members.iter().max_by_key(|m| m.chain.len()) else {
            return Ok(None);
        };
        let payload = longest.chain.snapshot().encode();
        self.receive_blockchain(&payload).await.map(Some)
    }

    /// Publishes a file from disk. See [`PeerNode::publish`].
    pub async fn upload_file(&self, path: &Path) -> Result<Fingerprint> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| NodeError::Protocol(format!("no file name in {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        self.publish(&name, &bytes).await
    }

    /// Stores `bytes` under `name`, records a publication transaction, mines it
    /// and gossips the result. Already-held content is not re-published.
    pub async fn publish(&self, name: &str, bytes: &[u8]) -> Result<Fingerprint> {
        let fingerprint = Fingerprint::of(bytes);
        if self.store.contains(&fingerprint)? {
            debug!(node = %self.id, %fingerprint, "file already published");
            return Ok(fingerprint);
        }

        let path = self.store.write(name, bytes)?;
        self.chain.drop_system_rewards();
        self.chain
            .add_transaction(Transaction::publication(&self.id, fingerprint.clone()))?;
        // Indexed only after the publication is mined.
        self.chain.mine_pending(&self.id).await?;
        self.store.register(&fingerprint, &path)?;
        info!(node = %self.id, %fingerprint, file = name, "file published");

        self.propagate_blockchain().await;
        self.propagate_pending().await;
        Ok(fingerprint)
    }

    /// Pulls a file from `peer_id`, verifies it and records the transfer.
    pub async fn request_file(&self, peer_id: &str, fingerprint: &Fingerprint) -> Result<()> {
        let link = self
            .peer_link(peer_id)
            .ok_or_else(|| NodeError::UnknownPeer(peer_id.to_string()))?;
        if self.store.contains(fingerprint)? {
            return Err(NodeError::AlreadyHeld(fingerprint.clone()));
        }
        let _pull = PullGuard::claim(&self.pulls, fingerprint)?;

        let path = transfer::fetch(peer_id, link.endpoint, fingerprint, &self.store, &self.config).await?;
        self.store.register(fingerprint, &path)?;
        self.chain
            .add_transaction(Transaction::transfer(peer_id, &self.id, fingerprint.clone()))?;
        info!(node = %self.id, peer = peer_id, %fingerprint, "file transferred");

        self.propagate_blockchain().await;
        self.propagate_pending().await;
        Ok(())
    }

    /// Pushes the full block list to every reachable peer. Returns how many accepted delivery.
    pub async fn propagate_blockchain(&self) -> usize {
        let payload = self.chain.snapshot().encode();
        let mut delivered = 0;
        for peer in self.peer_handles() {
            match peer.receive_blockchain(&payload).await {
                Ok(outcome) => {
                    debug!(from = %self.id, to = %peer.id, ?outcome, "chain delivered");
                    delivered += 1;
                }
                Err(e) => warn!(from = %self.id, to = %peer.id, error = %e, "chain delivery failed"),
            }
        }
        delivered
    }

    /// Pushes the pending pool to every reachable peer.
    pub async fn propagate_pending(&self) -> usize {
        let pending = self.chain.pending();
        let peers = self.peer_handles();
        for peer in &peers {
            let added = peer.receive_pending(pending.clone());
            debug!(from = %self.id, to = %peer.id, added, "pending pool delivered");
        }
        peers.len()
    }

    /// Decodes a gossiped chain and applies the longest-valid-chain rule.
    pub async fn receive_blockchain(&self, payload: &[u8]) -> Result<SyncOutcome> {
        let snapshot = ChainSnapshot::decode(payload)?;
        let outcome = self.chain.adopt(snapshot.into_blocks()).await;
        match outcome {
            SyncOutcome::Adopted { purged } => info!(node = %self.id, purged, "chain updated from peer"),
            SyncOutcome::Invalid => warn!(node = %self.id, "rejected invalid chain"),
            SyncOutcome::NotLonger => debug!(node = %self.id, "kept local chain"),
        }
        Ok(outcome)
    }

    /// Adds gossiped pending transactions; returns how many were new.
    pub fn receive_pending(&self, transactions: Vec<Transaction>) -> usize {
        let mut added = 0;
        for tx in transactions {
            match self.chain.add_transaction(tx) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => warn!(node = %self.id, error = %e, "dropped gossiped transaction"),
            }
        }
        added
    }

    pub fn check_integrity(&self) -> IntegrityReport {
        self.chain.check_integrity()
    }

    /// Fault injection on block `index`; see [`Chain::tamper_block`].
    pub async fn simulate_hack(&self, index: usize) -> Result<TamperOutcome> {
        let store = &self.store;
        let outcome = self
            .chain
            .tamper(index, |fp| store.contains(fp).unwrap_or(false))
            .await?;
        warn!(node = %self.id, index, "simulated tampering");
        Ok(outcome)
    }

    pub fn verify_files(&self) -> Result<Vec<FileAlert>> {
        Ok(self.store.verify()?)
    }

    pub fn chain_view(&self) -> ChainView {
        let blocks = self.chain.blocks();
        ChainView {
            node_id: self.id.clone(),
            valid: filechain_core::chain::validate_blocks(&blocks),
            length: blocks.len(),
            blocks,
            pending: self.chain.pending(),
        }
    }

    pub fn summary(&self) -> Result<NodeSummary> {
        let files = self
            .store
            .entries()?
            .into_iter()
            .map(|(fp, entry)| (fp, entry.file_name))
            .collect();
        Ok(NodeSummary {
            node_id: self.id.clone(),
            port: self.port(),
            peers: self
                .peers()
                .into_iter()
                .map(|(id, addr)| (id, addr.port()))
                .collect(),
            files,
            chain_length: self.chain.len(),
            pending: self.chain.pending().len(),
        })
    }

    /// Stops the listener and cancels any proof-of-work in progress.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.chain.cancel_mining();
        info!(node = %self.id, "node shut down");
    }
}

impl std::fmt::Debug for PeerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerNode")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Drop for PeerNode {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
