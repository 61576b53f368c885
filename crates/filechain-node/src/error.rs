use filechain_core::{ChainError, Fingerprint, TamperRefusal};
use filechain_storage::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node {0} already exists")]
    DuplicateNode(String),

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("invalid node id {0:?}")]
    InvalidNodeId(String),

    #[error("node {0} does not exist")]
    UnknownNode(String),

    #[error("peer {0} is not known to this node")]
    UnknownPeer(String),

    #[error("file {0} is already held by this node")]
    AlreadyHeld(Fingerprint),

    #[error("file {0} is already being transferred to this node")]
    TransferInProgress(Fingerprint),

    #[error("peer {peer} does not have file {fingerprint}")]
    FileNotFound {
        peer: String,
        fingerprint: Fingerprint,
    },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("received content hashes to {actual}, expected {expected}")]
    ContentMismatch {
        expected: Fingerprint,
        actual: Fingerprint,
    },

    #[error("transfer stopped after {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("fault injection refused: {0}")]
    Tamper(#[from] TamperRefusal),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl NodeError {
    /// Whether the request itself was at fault rather than the node or its peers.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            NodeError::DuplicateNode(_)
                | NodeError::PortInUse(_)
                | NodeError::InvalidNodeId(_)
                | NodeError::UnknownNode(_)
                | NodeError::UnknownPeer(_)
                | NodeError::AlreadyHeld(_)
                | NodeError::TransferInProgress(_)
                | NodeError::Tamper(_)
                | NodeError::Store(StoreError::InvalidName(_))
        )
    }

    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            NodeError::FileNotFound { .. }
                | NodeError::Protocol(_)
                | NodeError::ContentMismatch { .. }
                | NodeError::Truncated { .. }
                | NodeError::Timeout(_)
        )
    }
}
