use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use alloy_primitives::{Address, B256};
use kernel_types::{
    ActionExecutedRecord, ChainId, ContractEventRecord, ContractKind, ContractRecord,
    EventPosition, KernelExecutorEventRecord, KernelExecutorRecord, LogMeta, RoleAssignmentRecord,
    RoleEventRecord, RoleRecord,
};
use tokio::sync::Mutex;

use crate::{StateStore, StoreError, WriteOp, WriteSet};

type LogKey = (ChainId, B256, u64);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTables {
    pub contracts: HashMap<(ChainId, Address), ContractRecord>,
    pub contract_events: HashMap<(LogKey, Address), ContractEventRecord>,
    pub kernel_executors: HashMap<(ChainId, Address), KernelExecutorRecord>,
    pub kernel_executor_events: HashMap<(Address, LogKey), KernelExecutorEventRecord>,
    pub roles: HashSet<RoleRecord>,
    pub role_assignments: HashMap<(ChainId, String, Address), RoleAssignmentRecord>,
    pub role_events: HashMap<(String, LogKey, Address), RoleEventRecord>,
    pub action_events: HashMap<(Address, LogKey), ActionExecutedRecord>,
}

fn log_key(log: &LogMeta) -> LogKey {
    (log.chain_id, log.transaction_hash, log.log_index)
}

/// Keeps the stored row unless it is newer than the incoming one.
fn upsert_monotone<K: std::hash::Hash + Eq, V>(
    table: &mut HashMap<K, V>,
    key: K,
    value: V,
    position: impl Fn(&V) -> EventPosition,
) {
    match table.get(&key) {
        Some(existing) if position(existing) > position(&value) => {}
        _ => {
            table.insert(key, value);
        }
    }
}

impl MemoryTables {
    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::ActionExecuted(record) => {
                self.action_events
                    .entry((record.kernel, log_key(&record.log)))
                    .or_insert(record);
            }
            WriteOp::ContractEvent(record) => {
                self.contract_events
                    .entry((log_key(&record.log), record.address))
                    .or_insert(record);
            }
            WriteOp::Contract(record) => upsert_monotone(
                &mut self.contracts,
                (record.chain_id, record.address),
                record,
                |r| r.last_updated,
            ),
            WriteOp::KernelExecutorEvent(record) => {
                self.kernel_executor_events
                    .entry((record.kernel, log_key(&record.log)))
                    .or_insert(record);
            }
            WriteOp::KernelExecutor(record) => upsert_monotone(
                &mut self.kernel_executors,
                (record.chain_id, record.kernel),
                record,
                |r| r.last_updated,
            ),
            WriteOp::RoleEvent(record) => {
                self.role_events
                    .entry((record.role.clone(), log_key(&record.log), record.assignee))
                    .or_insert(record);
            }
            WriteOp::RoleAssignment(record) => upsert_monotone(
                &mut self.role_assignments,
                (record.chain_id, record.role.clone(), record.assignee),
                record,
                |r| r.last_updated,
            ),
            WriteOp::Role(record) => {
                self.roles.insert(record);
            }
        }
    }
}

/// In-process store. Every [`StateStore::apply`] works on a copy of the
/// tables that replaces the originals only once all writes succeeded.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<MemoryTables>>,
    /// Fails `apply` after half of its writes when set
    pub should_fail: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> MemoryTables {
        self.tables.lock().await.clone()
    }
}

impl StateStore for MemoryStore {
    async fn contract(
        &self,
        chain_id: ChainId,
        address: Address,
    ) -> Result<Option<ContractRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .contracts
            .get(&(chain_id, address))
            .cloned())
    }

    async fn latest_module_event(
        &self,
        chain_id: ChainId,
        keycode: &str,
        before: EventPosition,
    ) -> Result<Option<ContractEventRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .contract_events
            .values()
            .filter(|e| {
                e.log.chain_id == chain_id
                    && e.kind == ContractKind::Module
                    && e.name == keycode
                    && e.log.position() < before
            })
            .max_by_key(|e| (e.log.position(), e.is_enabled))
            .cloned())
    }

    async fn latest_role_event(
        &self,
        chain_id: ChainId,
        role: &str,
        before: EventPosition,
    ) -> Result<Option<RoleEventRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .role_events
            .values()
            .filter(|e| e.log.chain_id == chain_id && e.role == role && e.log.position() < before)
            .max_by_key(|e| (e.log.position(), e.is_granted))
            .cloned())
    }

    async fn kernel_executor(
        &self,
        chain_id: ChainId,
        kernel: Address,
    ) -> Result<Option<KernelExecutorRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .kernel_executors
            .get(&(chain_id, kernel))
            .cloned())
    }

    async fn role_assignment(
        &self,
        chain_id: ChainId,
        role: &str,
        assignee: Address,
    ) -> Result<Option<RoleAssignmentRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .role_assignments
            .get(&(chain_id, role.to_owned(), assignee))
            .cloned())
    }

    async fn apply(&self, writes: WriteSet) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let mut staged = tables.clone();

        let fail_at = if self.should_fail.load(Ordering::SeqCst) {
            Some(writes.len() / 2)
        } else {
            None
        };
        for (i, op) in writes.into_iter().enumerate() {
            if fail_at == Some(i) {
                return Err(StoreError::Simulated);
            }
            staged.apply(op);
        }

        *tables = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256};
    use kernel_types::ActionKind;

    use super::*;

    const MODULE_A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const MODULE_B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const HOLDER: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

    fn log(block_number: u64, log_index: u64) -> LogMeta {
        LogMeta {
            chain_id: 1,
            transaction_hash: b256!(
                "1111111111111111111111111111111111111111111111111111111111111111"
            ),
            log_index,
            block_number,
            timestamp: block_number * 12,
        }
    }

    fn module_event(
        log: LogMeta,
        address: Address,
        is_enabled: bool,
        action: ActionKind,
    ) -> ContractEventRecord {
        ContractEventRecord {
            log,
            address,
            name: "TRSRY".to_owned(),
            version: None,
            kind: ContractKind::Module,
            action,
            is_enabled,
            policy_permissions: None,
            policy_functions: None,
        }
    }

    fn role_event(log: LogMeta, assignee: Address, is_granted: bool) -> RoleEventRecord {
        RoleEventRecord {
            log,
            role: "heart_admin".to_owned(),
            assignee,
            assignee_name: "UNKNOWN".to_owned(),
            is_granted,
        }
    }

    #[tokio::test]
    async fn test_current_rows_ignore_older_writes() {
        let store = MemoryStore::new();

        let mut newer = WriteSet::new();
        newer.contract_event(module_event(log(20, 0), MODULE_A, false, ActionKind::UpgradeModule));
        store.apply(newer).await.unwrap();

        let mut older = WriteSet::new();
        older.contract_event(module_event(log(10, 3), MODULE_A, true, ActionKind::InstallModule));
        store.apply(older).await.unwrap();

        let current = store.contract(1, MODULE_A).await.unwrap().unwrap();
        assert!(!current.is_enabled);
        assert_eq!(current.last_updated, EventPosition::new(20, 0));

        // the history row is still recorded
        assert_eq!(store.snapshot().await.contract_events.len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_write_once() {
        let store = MemoryStore::new();

        let mut first = WriteSet::new();
        first.push(WriteOp::ContractEvent(module_event(
            log(10, 0),
            MODULE_A,
            true,
            ActionKind::InstallModule,
        )));
        store.apply(first).await.unwrap();

        let mut second = WriteSet::new();
        second.push(WriteOp::ContractEvent(module_event(
            log(10, 0),
            MODULE_A,
            false,
            ActionKind::InstallModule,
        )));
        store.apply(second).await.unwrap();

        let tables = store.snapshot().await;
        assert_eq!(tables.contract_events.len(), 1);
        assert!(tables.contract_events.values().all(|e| e.is_enabled));
    }

    #[tokio::test]
    async fn test_failed_apply_leaves_no_partial_rows() {
        let store = MemoryStore::new();
        store.should_fail.store(true, Ordering::SeqCst);

        let mut writes = WriteSet::new();
        writes
            .contract_event(module_event(log(10, 0), MODULE_A, false, ActionKind::UpgradeModule))
            .contract_event(module_event(log(10, 0), MODULE_B, true, ActionKind::UpgradeModule));
        assert!(matches!(
            store.apply(writes).await,
            Err(StoreError::Simulated)
        ));

        assert_eq!(store.snapshot().await, MemoryTables::default());
    }

    #[tokio::test]
    async fn test_latest_module_event_is_strictly_before() {
        let store = MemoryStore::new();
        let mut writes = WriteSet::new();
        writes.contract_event(module_event(log(10, 0), MODULE_A, true, ActionKind::InstallModule));
        store.apply(writes).await.unwrap();

        let mut upgrade = WriteSet::new();
        upgrade
            .contract_event(module_event(log(20, 1), MODULE_B, true, ActionKind::UpgradeModule))
            .contract_event(module_event(log(20, 1), MODULE_A, false, ActionKind::UpgradeModule));
        store.apply(upgrade).await.unwrap();

        let at_upgrade = store
            .latest_module_event(1, "TRSRY", EventPosition::new(20, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(at_upgrade.address, MODULE_A);
        assert!(at_upgrade.is_enabled);

        // enabling row wins the tie at the upgrade position
        let after = store
            .latest_module_event(1, "TRSRY", EventPosition::new(30, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.address, MODULE_B);

        assert!(store
            .latest_module_event(1, "TRSRY", EventPosition::new(10, 0))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .latest_module_event(1, "MINTR", EventPosition::new(30, 0))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_role_event_creates_role_on_grant_only() {
        let store = MemoryStore::new();

        let mut revoke = WriteSet::new();
        revoke.role_event(role_event(log(5, 0), HOLDER, false));
        store.apply(revoke).await.unwrap();
        assert!(store.snapshot().await.roles.is_empty());

        let mut grant = WriteSet::new();
        grant.role_event(role_event(log(6, 0), HOLDER, true));
        store.apply(grant).await.unwrap();

        let tables = store.snapshot().await;
        assert_eq!(tables.roles.len(), 1);
        assert_eq!(tables.role_events.len(), 2);
        assert!(
            store
                .role_assignment(1, "heart_admin", HOLDER)
                .await
                .unwrap()
                .unwrap()
                .is_granted
        );

        let latest = store
            .latest_role_event(1, "heart_admin", EventPosition::new(7, 0))
            .await
            .unwrap()
            .unwrap();
        assert!(latest.is_granted);
    }
}
