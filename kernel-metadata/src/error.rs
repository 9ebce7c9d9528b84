use alloy_primitives::Address;
use kernel_types::ChainId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("explorer unavailable for {address} after {attempts} attempts: {reason}")]
    Unavailable {
        chain_id: ChainId,
        address: Address,
        attempts: usize,
        reason: String,
    },

    #[error("no verified source code for {address} on chain {chain_id}")]
    NoSourceCode { chain_id: ChainId, address: Address },

    #[error("malformed explorer response for {address}: {reason}")]
    Parse { address: Address, reason: String },

    #[error("no explorer configured for chain {0}")]
    UnsupportedChain(ChainId),
}

impl EnrichmentError {
    /// Whether a later attempt can succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, EnrichmentError::Unavailable { .. })
    }
}
