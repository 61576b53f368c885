pub mod chain;
pub mod constants;
pub mod error;
pub mod integrity;
pub mod signature;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::info;

use constants::{CANCEL_CHECK_INTERVAL, HASH_HEX_SIZE, NETWORK_RECEIVER, SYSTEM_SENDER};

pub use chain::{Chain, SyncOutcome};
pub use error::{ChainError, TamperRefusal};
pub use integrity::{check_integrity, IntegrityReport, TamperOutcome};
pub use signature::{AcceptAll, SignatureVerifier};
pub use snapshot::ChainSnapshot;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn is_hash_hex(s: &str) -> bool {
    s.len() == HASH_HEX_SIZE && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Content address of a file payload: the lowercase hex SHA-256 of its bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fingerprint {0:?}: expected 64 hex characters")]
pub struct InvalidFingerprint(pub String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(sha256_hex(bytes))
    }

    /// Wraps a finished SHA-256 digest, e.g. from a streaming hasher.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Fingerprint {
    type Err = InvalidFingerprint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_hash_hex(s) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(InvalidFingerprint(s.to_string()))
        }
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = InvalidFingerprint;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    pub fingerprint: Option<Fingerprint>,
    pub timestamp: u64,
}

// Pool identity is the transferred value; the creation timestamp is metadata.
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount
            && self.sender == other.sender
            && self.receiver == other.receiver
            && self.fingerprint == other.fingerprint
    }
}

impl Eq for Transaction {}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: u64,
        fingerprint: Option<Fingerprint>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            fingerprint,
            timestamp: now_millis(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mining reward credited by the system.
    pub fn reward(miner: impl Into<String>, amount: u64) -> Self {
        Self::new(SYSTEM_SENDER, miner, amount, None)
    }

    /// A node announcing a file to the network.
    pub fn publication(node: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self::new(node, NETWORK_RECEIVER, 1, Some(fingerprint))
    }

    /// A file moving from `peer` to `node`.
    pub fn transfer(
        peer: impl Into<String>,
        node: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self::new(peer, node, 1, Some(fingerprint))
    }

    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// Audit digest over every field, timestamp included.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).expect("transaction serialization is infallible");
        sha256_hex(&bytes)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub hash: String,
}

/// Canonical hashing form; field order is part of the hash definition.
#[derive(Serialize)]
struct HashInput<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: u64,
    transactions: &'a [Transaction],
}

impl Block {
    pub fn new(index: u64, previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self::with_timestamp(index, previous_hash, transactions, now_millis())
    }

    pub fn with_timestamp(
        index: u64,
        previous_hash: impl Into<String>,
        transactions: Vec<Transaction>,
        timestamp: u64,
    ) -> Self {
        let mut block = Self {
            index,
            previous_hash: previous_hash.into(),
            timestamp,
            transactions,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn calculate_hash(&self) -> String {
        let input = HashInput {
            index: self.index,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            transactions: &self.transactions,
        };
        let bytes = serde_json::to_vec(&input).expect("block serialization is infallible");
        sha256_hex(&bytes)
    }

    /// Brute-force the nonce until the hash carries `difficulty` leading zero hex digits.
    pub fn mine(&mut self, difficulty: usize) {
        self.hash = self.calculate_hash();
        while !pow::meets_difficulty(&self.hash, difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
        }
        info!(index = self.index, nonce = self.nonce, hash = %self.hash, "mined block");
    }

    /// Like [`Block::mine`], but gives up once `cancel` is raised.
    /// Returns `false` if the search was cancelled.
    pub fn mine_until(&mut self, difficulty: usize, cancel: &AtomicBool) -> bool {
        self.hash = self.calculate_hash();
        let mut attempts: u64 = 0;
        while !pow::meets_difficulty(&self.hash, difficulty) {
            attempts += 1;
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return false;
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
        }
        info!(index = self.index, nonce = self.nonce, hash = %self.hash, "mined block");
        true
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.transactions.iter().filter_map(|tx| tx.fingerprint.as_ref())
    }
}

pub mod pow {
    use super::Block;

    pub fn leading_zero_hex_digits(hash: &str) -> usize {
        hash.bytes().take_while(|b| *b == b'0').count()
    }

    pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
        leading_zero_hex_digits(hash) >= difficulty
    }

    /// Mine `block` by value and hand it back with its winning nonce.
    pub fn mine_block(mut block: Block, difficulty: usize) -> Block {
        block.mine(difficulty);
        block
    }
}
