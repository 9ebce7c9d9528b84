//! Turns one [`ChainEvent`] into the [`WriteSet`] that records it.
//!
//! Planning only reads: chain state at the event's block, enrichment metadata,
//! and store rows strictly before the event's position. Reads as of the event
//! rather than of "now" keep a replayed event planning the same writes it
//! planned the first time.

use kernel_metadata::{CacheStorage, MetadataCache, MetadataSource};
use kernel_store::{StateStore, StoreError, WriteSet};
use kernel_types::{ContractEventRecord, LogMeta};
use tracing::debug;

use crate::{ChainEvent, ChainReader, EventHandler, ProcessError};

mod action;
mod executor;
mod roles;

pub struct EventProcessor<S, C, CS, M> {
    store: S,
    chain: C,
    metadata: MetadataCache<CS, M>,
}

impl<S, C, CS, M> EventProcessor<S, C, CS, M>
where
    S: StateStore,
    C: ChainReader,
    CS: CacheStorage,
    M: MetadataSource,
{
    pub fn new(store: S, chain: C, metadata: MetadataCache<CS, M>) -> Self {
        Self {
            store,
            chain,
            metadata,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn plan(&self, event: &ChainEvent) -> Result<WriteSet, ProcessError> {
        match event {
            ChainEvent::KernelGenesis { log, kernel } => {
                self.plan_kernel_genesis(log, *kernel).await
            }
            ChainEvent::RolesAdminGenesis { log, roles_admin } => {
                self.plan_roles_admin_genesis(log, *roles_admin).await
            }
            ChainEvent::ActionExecuted {
                log,
                kernel,
                action_code,
                target,
            } => self.plan_action(log, *kernel, *action_code, *target).await,
            ChainEvent::RoleGranted {
                log,
                role,
                assignee,
            } => Ok(Self::plan_role_change(log, role, *assignee, true)),
            ChainEvent::RoleRevoked {
                log,
                role,
                assignee,
            } => Ok(Self::plan_role_change(log, role, *assignee, false)),
            ChainEvent::NewAdminPulled { log, new_admin } => {
                self.plan_admin_pulled(log, *new_admin).await
            }
        }
    }

    /// Plans and applies `event` as one atomic unit. Returns the number of
    /// writes applied.
    pub async fn process(&self, event: &ChainEvent) -> Result<usize, ProcessError> {
        let writes = self.plan(event).await?;
        let num_writes = writes.len();
        self.store.apply(writes).await?;
        debug!(
            chain_id = event.chain_id(),
            event = event.name(),
            block_number = event.log().block_number,
            log_index = event.log().log_index,
            num_writes,
            "processed event"
        );
        Ok(num_writes)
    }

    /// Module holding `keycode` just before `log`, if one was enabled.
    async fn enabled_module(
        &self,
        log: &LogMeta,
        keycode: &str,
    ) -> Result<Option<ContractEventRecord>, StoreError> {
        Ok(self
            .store
            .latest_module_event(log.chain_id, keycode, log.position())
            .await?
            .filter(|event| event.is_enabled))
    }
}

impl<S, C, CS, M> EventHandler for EventProcessor<S, C, CS, M>
where
    S: StateStore,
    C: ChainReader,
    CS: CacheStorage,
    M: MetadataSource,
{
    async fn handle(&self, event: &ChainEvent) -> Result<usize, ProcessError> {
        self.process(event).await
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy_primitives::{address, Address};
    use kernel_store::MemoryTables;

    use super::testutil::{log, processor, selector, MockChain, MockExplorer};
    use crate::ChainEvent;

    const KERNEL: Address = address!("2286d7f9639e8158FaD1169e76d1FbC38247f54b");
    const ROLES_ADMIN: Address = address!("b216d714d91eeC4F7120a732c11428857C659eC8");
    const EXECUTOR: Address = address!("245cc372C84B3645Bf0Ffe6538620B04a217988B");
    const MODULE_A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const MODULE_B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const POLICY: Address = address!("cccccccccccccccccccccccccccccccccccccccc");
    const NEW_ADMIN: Address = address!("1111111111111111111111111111111111111111");

    fn chain() -> MockChain {
        MockChain::default()
            .with_executor(KERNEL, EXECUTOR)
            .with_admin(ROLES_ADMIN, EXECUTOR)
            .with_module(MODULE_A, "TRSRY")
            .with_module(MODULE_B, "TRSRY")
            .with_permissions(POLICY, &[("TRSRY", selector("transfer(address,uint256)"))])
    }

    fn explorer() -> MockExplorer {
        let module = "contract Token { function transfer(address to, uint256 amount) external {} }";
        MockExplorer::default()
            .with_contract(
                MODULE_A,
                &["function transfer(address to, uint256 amount)"],
                module,
            )
            .with_contract(
                MODULE_B,
                &["function transfer(address to, uint256 amount)"],
                module,
            )
            .with_contract(POLICY, &["function run()"], "contract P { function run() external {} }")
    }

    fn action(block: u64, code: u8, target: Address) -> ChainEvent {
        ChainEvent::ActionExecuted {
            log: log(block, 1),
            kernel: KERNEL,
            action_code: code,
            target,
        }
    }

    fn stream() -> Vec<ChainEvent> {
        vec![
            ChainEvent::KernelGenesis {
                log: log(1, 0),
                kernel: KERNEL,
            },
            ChainEvent::RolesAdminGenesis {
                log: log(2, 0),
                roles_admin: ROLES_ADMIN,
            },
            action(3, 0, MODULE_A),
            action(4, 2, POLICY),
            ChainEvent::RoleGranted {
                log: log(5, 0),
                role: "treasury_custodian".to_owned(),
                assignee: POLICY,
            },
            action(6, 1, MODULE_B),
            action(7, 2, POLICY),
            ChainEvent::NewAdminPulled {
                log: log(8, 0),
                new_admin: NEW_ADMIN,
            },
            ChainEvent::RoleRevoked {
                log: log(9, 0),
                role: "treasury_custodian".to_owned(),
                assignee: POLICY,
            },
        ]
    }

    #[tokio::test]
    async fn test_replaying_stream_leaves_state_unchanged() {
        let processor = processor(chain(), explorer());
        for event in stream() {
            processor.process(&event).await.unwrap();
        }
        let first = processor.store().snapshot().await;

        for event in stream() {
            processor.process(&event).await.unwrap();
        }
        assert_eq!(processor.store().snapshot().await, first);

        for event in stream().iter().take(4) {
            processor.process(event).await.unwrap();
        }
        assert_eq!(processor.store().snapshot().await, first);
    }

    #[tokio::test]
    async fn test_replay_reuses_cached_metadata() {
        let explorer = explorer();
        let processor = processor(chain(), explorer.clone());
        for event in stream().iter().chain(stream().iter()) {
            processor.process(event).await.unwrap();
        }
        // module A, module B and the policy, once each
        assert_eq!(explorer.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_apply_is_retried_cleanly() {
        let processor = processor(chain(), explorer());
        let events = stream();
        for event in &events[..3] {
            processor.process(event).await.unwrap();
        }
        let before = processor.store().snapshot().await;

        let upgrade = &events[5];
        processor.store().should_fail.store(true, Ordering::SeqCst);
        assert!(processor.process(upgrade).await.is_err());
        assert_eq!(processor.store().snapshot().await, before);

        processor.store().should_fail.store(false, Ordering::SeqCst);
        processor.process(upgrade).await.unwrap();
        assert_ne!(processor.store().snapshot().await, before);
        assert_ne!(before, MemoryTables::default());
    }
}
