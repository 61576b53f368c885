use rayon::prelude::*;
use serde::Serialize;
use std::{fmt, sync::atomic::AtomicBool, sync::Arc};
use tracing::{debug, info};

use crate::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP},
    pow, AcceptAll, Block, ChainError, ChainSnapshot, SignatureVerifier, Transaction,
};

/// Result of offering a remote chain to the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Adopted { purged: usize },
    Invalid,
    NotLonger,
}

/// Blocks plus the pending pool. Never empty: block 0 is always a genesis block.
#[derive(Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    difficulty: usize,
    mining_reward: u64,
    verifier: Arc<dyn SignatureVerifier>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("blocks", &self.blocks)
            .field("pending", &self.pending)
            .field("difficulty", &self.difficulty)
            .field("mining_reward", &self.mining_reward)
            .finish_non_exhaustive()
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD)
    }
}

/// A zero-transaction genesis block. Identical on every node.
pub fn genesis_block() -> Block {
    Block::with_timestamp(0, GENESIS_PREVIOUS_HASH, vec![], GENESIS_TIMESTAMP)
}

/// Every stored hash matches its recomputation and every block links to its predecessor.
pub fn validate_blocks(blocks: &[Block]) -> bool {
    !blocks.is_empty()
        && blocks.par_iter().all(|b| b.hash == b.calculate_hash())
        && blocks.windows(2).all(|w| w[1].previous_hash == w[0].hash)
}

impl Chain {
    pub fn new(difficulty: usize, mining_reward: u64) -> Self {
        Self {
            blocks: vec![genesis_block()],
            pending: Vec::new(),
            difficulty,
            mining_reward,
            verifier: Arc::new(AcceptAll),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tail(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> u64 {
        self.mining_reward
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            blocks: self.blocks.clone(),
        }
    }

    /// Adds `tx` to the pool unless an equal one is already pending.
    /// Returns whether the pool changed.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<bool, ChainError> {
        if !self.verifier.verify(&tx) {
            return Err(ChainError::SignatureRejected(tx.digest()));
        }
        if self.pending.contains(&tx) {
            return Ok(false);
        }
        debug!(digest = %tx.digest(), "transaction pooled");
        self.pending.push(tx);
        Ok(true)
    }

    /// Removes pending system rewards; returns how many were dropped.
    pub fn drop_system_rewards(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|tx| !tx.is_system());
        before - self.pending.len()
    }

    /// Unmined block over the current pool, or `None` if nothing is pending.
    pub fn next_block(&self) -> Option<Block> {
        if self.pending.is_empty() {
            return None;
        }
        Some(Block::new(
            self.blocks.len() as u64,
            self.tail().hash.clone(),
            self.pending.clone(),
        ))
    }

    /// Appends a mined block and credits `miner`. The block's transactions leave
    /// the pool; with no concurrent submissions the pool ends as just the reward.
    pub fn commit_block(&mut self, block: Block, miner: &str) -> Result<&Block, ChainError> {
        let expected = self.blocks.len() as u64;
        if block.index != expected {
            return Err(ChainError::UnexpectedIndex {
                expected,
                found: block.index,
            });
        }
        if block.previous_hash != self.tail().hash {
            return Err(ChainError::BrokenLink {
                index: block.index,
                expected: self.tail().hash.clone(),
                found: block.previous_hash,
            });
        }
        let computed = block.calculate_hash();
        if block.hash != computed {
            return Err(ChainError::HashMismatch {
                index: block.index,
                stored: block.hash,
                computed,
            });
        }
        if !pow::meets_difficulty(&block.hash, self.difficulty) {
            return Err(ChainError::InsufficientWork {
                index: block.index,
                hash: block.hash,
                difficulty: self.difficulty,
            });
        }

        self.pending.retain(|tx| !block.transactions.contains(tx));
        let reward = Transaction::reward(miner, self.mining_reward);
        if !self.pending.contains(&reward) {
            self.pending.push(reward);
        }
        info!(index = block.index, hash = %block.hash, miner, "block appended");
        self.blocks.push(block);
        Ok(self.tail())
    }

    /// Mines the pool into a new block. No-op on an empty pool.
    pub fn mine_pending(&mut self, miner: &str) -> Result<Option<&Block>, ChainError> {
        let Some(mut block) = self.next_block() else {
            return Ok(None);
        };
        block.mine(self.difficulty);
        self.commit_block(block, miner).map(Some)
    }

    /// [`Chain::mine_pending`] with a cancellation flag. A cancelled round changes nothing.
    pub fn mine_pending_until(
        &mut self,
        miner: &str,
        cancel: &AtomicBool,
    ) -> Result<Option<&Block>, ChainError> {
        let Some(mut block) = self.next_block() else {
            return Ok(None);
        };
        if !block.mine_until(self.difficulty, cancel) {
            return Err(ChainError::MiningCancelled(block.index));
        }
        self.commit_block(block, miner).map(Some)
    }

    pub fn is_valid(&self) -> bool {
        validate_blocks(&self.blocks)
    }

    /// Longest-valid-chain rule; equal lengths prefer the newer tail.
    pub fn adopt(&mut self, candidate: Vec<Block>) -> SyncOutcome {
        if !validate_blocks(&candidate) {
            return SyncOutcome::Invalid;
        }
        let ours = self.blocks.len();
        let theirs = candidate.len();
        let newer_tail = candidate
            .last()
            .is_some_and(|tail| tail.timestamp > self.tail().timestamp);
        if theirs > ours || (theirs == ours && newer_tail) {
            self.blocks = candidate;
            let purged = self.purge_confirmed();
            info!(length = theirs, purged, "adopted remote chain");
            SyncOutcome::Adopted { purged }
        } else {
            debug!(ours, theirs, "remote chain not longer");
            SyncOutcome::NotLonger
        }
    }

    /// Drops pending transactions whose fingerprint is already confirmed on chain.
    pub fn purge_confirmed(&mut self) -> usize {
        let before = self.pending.len();
        let blocks = &self.blocks;
        self.pending.retain(|tx| match &tx.fingerprint {
            Some(fp) => !blocks.iter().any(|b| b.fingerprints().any(|c| c == fp)),
            None => true,
        });
        before - self.pending.len()
    }
}
