use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use filechain_core::{
    Block, Chain, ChainError, ChainSnapshot, Fingerprint, IntegrityReport, SyncOutcome,
    TamperOutcome, TamperRefusal, Transaction,
};
use tokio::sync::Mutex;

use crate::Result;

/// A chain shared between request handlers.
///
/// Structural changes (append, adopt, tamper) are serialized by `mutation`,
/// which mining holds for its whole search. The proof-of-work itself runs
/// on a blocking worker outside the state lock, so readers only ever wait
/// for short copies.
pub struct SharedChain {
    state: RwLock<Chain>,
    mutation: Mutex<()>,
    cancel: Arc<AtomicBool>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            state: RwLock::new(chain),
            mutation: Mutex::new(()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Chain> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Chain> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        self.read().snapshot()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.read().blocks().to_vec()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.read().pending().to_vec()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.read().is_valid()
    }

    pub fn check_integrity(&self) -> IntegrityReport {
        self.read().check_integrity()
    }

    pub fn add_transaction(&self, tx: Transaction) -> std::result::Result<bool, ChainError> {
        self.write().add_transaction(tx)
    }

    pub fn drop_system_rewards(&self) -> usize {
        self.write().drop_system_rewards()
    }

    /// Mines the pending pool into a block credited to `miner`.
    pub async fn mine_pending(&self, miner: &str) -> Result<Option<Block>> {
        let _guard = self.mutation.lock().await;
        let (template, difficulty) = {
            let chain = self.read();
            (chain.next_block(), chain.difficulty())
        };
        let Some(mut block) = template else {
            return Ok(None);
        };

        let cancel = Arc::clone(&self.cancel);
        let (block, finished) = tokio::task::spawn_blocking(move || {
            let finished = block.mine_until(difficulty, &cancel);
            (block, finished)
        })
        .await?;
        if !finished {
            return Err(ChainError::MiningCancelled(block.index).into());
        }

        let mut chain = self.write();
        Ok(Some(chain.commit_block(block, miner)?.clone()))
    }

    pub async fn adopt(&self, blocks: Vec<Block>) -> SyncOutcome {
        let _guard = self.mutation.lock().await;
        self.write().adopt(blocks)
    }

    pub async fn tamper<F>(&self, index: usize, holds_file: F) -> std::result::Result<TamperOutcome, TamperRefusal>
    where
        F: Fn(&Fingerprint) -> bool,
    {
        let _guard = self.mutation.lock().await;
        self.write().tamper_block(index, holds_file)
    }

    /// Aborts the current and every future proof-of-work search.
    pub fn cancel_mining(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}
