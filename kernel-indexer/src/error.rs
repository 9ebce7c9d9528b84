use alloy_primitives::Address;
use kernel_metadata::EnrichmentError;
use kernel_store::StoreError;
use kernel_types::UnknownActionCode;
use thiserror::Error;

use crate::ChainReadError;

/// Aborts the event: nothing it would have written is persisted and the worker
/// redelivers it.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    UnknownAction(#[from] UnknownActionCode),

    #[error("no enabled module with keycode {keycode} before upgrade to {module}")]
    MissingPreviousModule { keycode: String, module: Address },

    #[error("policy {policy} requests keycode {keycode} but no module is enabled for it")]
    MissingModuleForKeycode { keycode: String, policy: Address },

    #[error("keycode {keycode} of {module} collides with enabled module {enabled}")]
    KeycodeConflict {
        keycode: String,
        module: Address,
        enabled: Address,
    },

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    ChainRead(#[from] ChainReadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProcessError {
    /// Errors no amount of redelivery resolves on its own.
    pub fn needs_operator(&self) -> bool {
        match self {
            ProcessError::UnknownAction(_)
            | ProcessError::MissingPreviousModule { .. }
            | ProcessError::MissingModuleForKeycode { .. }
            | ProcessError::KeycodeConflict { .. } => true,
            ProcessError::Enrichment(err) => !err.is_transient(),
            ProcessError::ChainRead(_) | ProcessError::Store(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(ProcessError::UnknownAction(UnknownActionCode(9)), true; "unknown action")]
    #[test_case(
        ProcessError::MissingPreviousModule { keycode: "TRSRY".into(), module: Address::ZERO },
        true;
        "missing previous module"
    )]
    #[test_case(
        ProcessError::KeycodeConflict {
            keycode: "TRSRY".into(),
            module: Address::ZERO,
            enabled: Address::repeat_byte(1),
        },
        true;
        "keycode conflict"
    )]
    #[test_case(
        ProcessError::Enrichment(EnrichmentError::Unavailable {
            chain_id: 1,
            address: Address::ZERO,
            attempts: 3,
            reason: "timeout".into(),
        }),
        false;
        "enrichment unavailable"
    )]
    #[test_case(
        ProcessError::Enrichment(EnrichmentError::NoSourceCode {
            chain_id: 1,
            address: Address::ZERO,
        }),
        true;
        "module without source code"
    )]
    #[test_case(
        ProcessError::Enrichment(EnrichmentError::UnsupportedChain(31337)),
        true;
        "no explorer for chain"
    )]
    #[test_case(ProcessError::Store(StoreError::Simulated), false; "store failure")]
    fn test_needs_operator(err: ProcessError, expected: bool) {
        assert_eq!(err.needs_operator(), expected);
    }
}
