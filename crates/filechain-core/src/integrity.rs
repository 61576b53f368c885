use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::{constants::TAMPERED_RECEIVER, now_millis, Block, Chain, Fingerprint, TamperRefusal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityReport {
    Valid,
    HashMismatch {
        block_index: usize,
        stored_hash: String,
        calculated_hash: String,
    },
    LinkageMismatch {
        block_index: usize,
    },
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        matches!(self, IntegrityReport::Valid)
    }
}

/// Per-block hash check first; linkage only once every block hashes cleanly.
pub fn check_integrity(blocks: &[Block]) -> IntegrityReport {
    if let Some(i) = blocks
        .par_iter()
        .position_first(|b| b.hash != b.calculate_hash())
    {
        let block = &blocks[i];
        return IntegrityReport::HashMismatch {
            block_index: i,
            stored_hash: block.hash.clone(),
            calculated_hash: block.calculate_hash(),
        };
    }
    if let Some(i) = blocks
        .windows(2)
        .position(|w| w[1].previous_hash != w[0].hash)
    {
        return IntegrityReport::LinkageMismatch { block_index: i + 1 };
    }
    IntegrityReport::Valid
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TamperOutcome {
    pub block_index: usize,
    pub original_hash: String,
    pub recalculated_hash: String,
    pub original_receiver: String,
    pub new_receiver: String,
}

impl Chain {
    pub fn check_integrity(&self) -> IntegrityReport {
        check_integrity(self.blocks())
    }

    /// Fault injection: rewrites the receiver of the first file transaction in
    /// block `index` and bumps its timestamp while keeping the stored hash.
    ///
    /// Refused unless every file referenced by the block satisfies `holds_file`.
    pub fn tamper_block<F>(&mut self, index: usize, holds_file: F) -> Result<TamperOutcome, TamperRefusal>
    where
        F: Fn(&Fingerprint) -> bool,
    {
        let len = self.len();
        let Some(block) = self.blocks_mut().get_mut(index) else {
            return Err(TamperRefusal::OutOfRange { index, len });
        };
        if block.transactions.is_empty() {
            return Err(TamperRefusal::NoTransactions(index));
        }
        if block.fingerprints().next().is_none() {
            return Err(TamperRefusal::NoFileTransactions(index));
        }
        if let Some(missing) = block.fingerprints().find(|fp| !holds_file(fp)) {
            return Err(TamperRefusal::FileNotHeld(missing.clone()));
        }

        let Some(target) = block
            .transactions
            .iter_mut()
            .find(|tx| tx.fingerprint.is_some())
        else {
            return Err(TamperRefusal::NoFileTransactions(index));
        };
        let original_receiver = std::mem::replace(&mut target.receiver, TAMPERED_RECEIVER.to_string());
        block.timestamp = now_millis().max(block.timestamp.saturating_add(1));

        let outcome = TamperOutcome {
            block_index: index,
            original_hash: block.hash.clone(),
            recalculated_hash: block.calculate_hash(),
            original_receiver,
            new_receiver: TAMPERED_RECEIVER.to_string(),
        };
        warn!(index, stored = %outcome.original_hash, "block tampered by fault injection");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transaction;

    fn file_chain() -> (Chain, Fingerprint) {
        let file = Fingerprint::of(b"evidence");
        let mut chain = Chain::new(1, 10);
        chain
            .add_transaction(Transaction::publication("A", file.clone()))
            .unwrap();
        chain.mine_pending("A").unwrap();
        // Block 2 holds only the reward.
        chain.mine_pending("A").unwrap();
        (chain, file)
    }

    #[test]
    fn tamper_block_with_max_timestamp() {
        let file = Fingerprint::of(b"far future");
        let genesis = crate::chain::genesis_block();
        let tail = Block::with_timestamp(
            1,
            genesis.hash.clone(),
            vec![Transaction::publication("A", file.clone())],
            u64::MAX,
        );
        let mut chain = Chain::new(1, 10);
        assert!(matches!(
            chain.adopt(vec![genesis, tail]),
            crate::SyncOutcome::Adopted { .. }
        ));

        let outcome = chain.tamper_block(1, |fp| fp == &file).unwrap();
        assert_eq!(chain.blocks()[1].timestamp, u64::MAX);
        assert_ne!(outcome.original_hash, outcome.recalculated_hash);
        assert!(matches!(
            chain.check_integrity(),
            IntegrityReport::HashMismatch { block_index: 1, .. }
        ));
    }

    #[test]
    fn fresh_chain_is_intact() {
        let (chain, _) = file_chain();
        assert_eq!(chain.check_integrity(), IntegrityReport::Valid);
        assert!(Chain::new(1, 10).check_integrity().is_valid());
    }

    #[test]
    fn tamper_then_detect() {
        let (mut chain, file) = file_chain();
        let outcome = chain.tamper_block(1, |fp| fp == &file).unwrap();
        assert_eq!(outcome.original_receiver, "NETWORK");
        assert_eq!(outcome.new_receiver, TAMPERED_RECEIVER);
        assert_ne!(outcome.original_hash, outcome.recalculated_hash);

        match chain.check_integrity() {
            IntegrityReport::HashMismatch {
                block_index,
                stored_hash,
                calculated_hash,
            } => {
                assert_eq!(block_index, 1);
                assert_eq!(stored_hash, outcome.original_hash);
                assert_ne!(stored_hash, calculated_hash);
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert!(!chain.is_valid());
    }

    #[test]
    fn linkage_mismatch_is_reported_separately() {
        let (mut chain, _) = file_chain();
        let block = &mut chain.blocks_mut()[2];
        block.previous_hash = "b".repeat(64);
        block.hash = block.calculate_hash();
        assert_eq!(
            chain.check_integrity(),
            IntegrityReport::LinkageMismatch { block_index: 2 }
        );
    }

    #[test]
    fn tamper_refusals() {
        let (mut chain, file) = file_chain();
        assert_eq!(
            chain.tamper_block(9, |_| true),
            Err(TamperRefusal::OutOfRange { index: 9, len: 3 })
        );
        assert_eq!(chain.tamper_block(0, |_| true), Err(TamperRefusal::NoTransactions(0)));
        assert_eq!(
            chain.tamper_block(2, |_| true),
            Err(TamperRefusal::NoFileTransactions(2))
        );
        assert_eq!(
            chain.tamper_block(1, |_| false),
            Err(TamperRefusal::FileNotHeld(file))
        );
        assert!(chain.check_integrity().is_valid());
    }
}
