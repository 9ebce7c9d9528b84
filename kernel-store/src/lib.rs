#![allow(async_fn_in_trait)]

//! Current-state and history tables of the governance view.
//!
//! History rows are write-once: inserting an existing key is a no-op. Current
//! rows are only overwritten by writes whose event position is not older than
//! the stored one, so re-applying any already applied [`WriteSet`] leaves the
//! store unchanged.

use alloy_primitives::Address;
use kernel_types::{
    ChainId, ContractEventRecord, ContractRecord, EventPosition, KernelExecutorRecord,
    RoleAssignmentRecord, RoleEventRecord,
};
use thiserror::Error;

pub mod memory;
pub mod pg;
mod write_set;

pub use self::{
    memory::{MemoryStore, MemoryTables},
    pg::{run_migrations, PgStore},
    write_set::{WriteOp, WriteSet},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("invalid value in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("simulated store failure")]
    Simulated,
}

pub trait StateStore {
    async fn contract(
        &self,
        chain_id: ChainId,
        address: Address,
    ) -> Result<Option<ContractRecord>, StoreError>;

    /// Most recent history row for a module named `keycode` strictly before
    /// `before`. At equal positions an enabling row wins over a disabling one.
    async fn latest_module_event(
        &self,
        chain_id: ChainId,
        keycode: &str,
        before: EventPosition,
    ) -> Result<Option<ContractEventRecord>, StoreError>;

    /// Most recent history row for `role` strictly before `before`. At equal
    /// positions a grant wins over a revoke.
    async fn latest_role_event(
        &self,
        chain_id: ChainId,
        role: &str,
        before: EventPosition,
    ) -> Result<Option<RoleEventRecord>, StoreError>;

    async fn kernel_executor(
        &self,
        chain_id: ChainId,
        kernel: Address,
    ) -> Result<Option<KernelExecutorRecord>, StoreError>;

    async fn role_assignment(
        &self,
        chain_id: ChainId,
        role: &str,
        assignee: Address,
    ) -> Result<Option<RoleAssignmentRecord>, StoreError>;

    /// Applies every write or none of them.
    async fn apply(&self, writes: WriteSet) -> Result<(), StoreError>;
}
