use thiserror::Error;

use crate::Fingerprint;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block index {found} does not extend chain of length {expected}")]
    UnexpectedIndex { expected: u64, found: u64 },

    #[error("block {index} links to {found}, expected {expected}")]
    BrokenLink {
        index: u64,
        expected: String,
        found: String,
    },

    #[error("block {index} stored hash {stored} does not match computed {computed}")]
    HashMismatch {
        index: u64,
        stored: String,
        computed: String,
    },

    #[error("block {index} hash {hash} does not meet difficulty {difficulty}")]
    InsufficientWork {
        index: u64,
        hash: String,
        difficulty: usize,
    },

    #[error("signature rejected for transaction {0}")]
    SignatureRejected(String),

    #[error("malformed chain snapshot: {0}")]
    Malformed(String),

    #[error("snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("mining cancelled at block {0}")]
    MiningCancelled(u64),
}

/// Reasons a fault-injection request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TamperRefusal {
    #[error("block index {index} out of range (chain length {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("block {0} has no transactions to tamper with")]
    NoTransactions(usize),

    #[error("block {0} has no file transactions to tamper with")]
    NoFileTransactions(usize),

    #[error("this node does not hold file {0} locally and cannot tamper with blocks referencing it")]
    FileNotHeld(Fingerprint),
}
