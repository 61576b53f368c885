//! Gossip representation of a chain.
//!
//! Peers exchange the full ordered block list as JSON. Decoding is strict: a
//! snapshot must parse completely and be structurally sound before it is
//! handed to hash/linkage validation.

use serde::{Deserialize, Serialize};

use crate::{constants::GENESIS_PREVIOUS_HASH, is_hash_hex, Block, ChainError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
}

impl ChainSnapshot {
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("snapshot serialization is infallible")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        snapshot.check_shape()?;
        Ok(snapshot)
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    fn check_shape(&self) -> Result<(), ChainError> {
        let Some(genesis) = self.blocks.first() else {
            return Err(ChainError::Malformed("no blocks".into()));
        };
        if genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(ChainError::Malformed(format!(
                "genesis links to {:?}",
                genesis.previous_hash
            )));
        }
        for (position, block) in self.blocks.iter().enumerate() {
            if block.index != position as u64 {
                return Err(ChainError::Malformed(format!(
                    "block at position {position} claims index {}",
                    block.index
                )));
            }
            if !is_hash_hex(&block.hash) {
                return Err(ChainError::Malformed(format!(
                    "block {position} hash is not a digest"
                )));
            }
            if position > 0 && !is_hash_hex(&block.previous_hash) {
                return Err(ChainError::Malformed(format!(
                    "block {position} previous hash is not a digest"
                )));
            }
        }
        Ok(())
    }
}
