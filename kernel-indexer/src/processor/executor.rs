use alloy_primitives::Address;
use kernel_chain_config::{contract_label, contract_name};
use kernel_metadata::{CacheStorage, MetadataSource};
use kernel_store::{StateStore, WriteSet};
use kernel_types::{
    ActionExecutedRecord, ActionKind, ContractKind, ContractRecord, KernelExecutorEventRecord,
    LogMeta,
};
use tracing::info;

use super::EventProcessor;
use crate::{ChainReader, ProcessError};

impl<S, C, CS, M> EventProcessor<S, C, CS, M>
where
    S: StateStore,
    C: ChainReader,
    CS: CacheStorage,
    M: MetadataSource,
{
    /// Records the executor the kernel reports at the event's block. The
    /// action's target is not trusted for this.
    pub(super) async fn plan_change_executor(
        &self,
        log: &LogMeta,
        kernel: Address,
        writes: &mut WriteSet,
    ) -> Result<(), ProcessError> {
        let executor = self.chain.kernel_executor(kernel, log.block_number).await?;
        info!(chain_id = log.chain_id, %kernel, %executor, "kernel executor");
        writes.kernel_executor_event(KernelExecutorEventRecord {
            log: log.clone(),
            kernel,
            executor,
        });
        Ok(())
    }

    /// Kernel deployment, recorded as a migration to itself. The kernel gets a
    /// current row but no contract history.
    pub(super) async fn plan_kernel_genesis(
        &self,
        log: &LogMeta,
        kernel: Address,
    ) -> Result<WriteSet, ProcessError> {
        let mut writes = WriteSet::new();
        writes
            .action_executed(ActionExecutedRecord {
                log: log.clone(),
                kernel,
                action: ActionKind::MigrateKernel,
                target: kernel,
            })
            .contract(kernel_contract(log, kernel));
        self.plan_change_executor(log, kernel, &mut writes).await?;
        Ok(writes)
    }
}

fn kernel_contract(log: &LogMeta, kernel: Address) -> ContractRecord {
    ContractRecord {
        chain_id: log.chain_id,
        address: kernel,
        name: contract_name(log.chain_id, kernel).to_owned(),
        version: contract_label(log.chain_id, kernel).and_then(|label| label.version.clone()),
        kind: ContractKind::Kernel,
        is_enabled: true,
        last_updated: log.position(),
        last_updated_timestamp: log.timestamp,
        policy_permissions: None,
        policy_functions: None,
    }
}
