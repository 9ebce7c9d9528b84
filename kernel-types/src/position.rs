use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

pub type ChainId = u64;

/// Place of a log in one chain's stream. Log indices are block-scoped, so
/// `(block_number, log_index)` totally orders the events of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventPosition {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

/// Coordinates shared by every row derived from a single log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogMeta {
    pub chain_id: ChainId,
    pub transaction_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
    pub timestamp: u64,
}

impl LogMeta {
    pub fn position(&self) -> EventPosition {
        EventPosition::new(self.block_number, self.log_index)
    }
}
