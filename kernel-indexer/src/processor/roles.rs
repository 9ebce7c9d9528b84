use alloy_primitives::Address;
use kernel_chain_config::contract_name;
use kernel_metadata::{CacheStorage, MetadataSource};
use kernel_store::{StateStore, WriteSet};
use kernel_types::{LogMeta, RoleEventRecord, ROLES_ADMIN_ROLE};
use tracing::info;

use super::EventProcessor;
use crate::{ChainReader, ProcessError};

fn role_event(log: &LogMeta, role: &str, assignee: Address, is_granted: bool) -> RoleEventRecord {
    RoleEventRecord {
        log: log.clone(),
        role: role.to_owned(),
        assignee,
        assignee_name: contract_name(log.chain_id, assignee).to_owned(),
        is_granted,
    }
}

impl<S, C, CS, M> EventProcessor<S, C, CS, M>
where
    S: StateStore,
    C: ChainReader,
    CS: CacheStorage,
    M: MetadataSource,
{
    pub(super) fn plan_role_change(
        log: &LogMeta,
        role: &str,
        assignee: Address,
        is_granted: bool,
    ) -> WriteSet {
        let mut writes = WriteSet::new();
        writes.role_event(role_event(log, role, assignee, is_granted));
        writes
    }

    /// Moves the admin role to `new_admin`, revoking it from the previous
    /// holder within the same unit.
    pub(super) async fn plan_admin_pulled(
        &self,
        log: &LogMeta,
        new_admin: Address,
    ) -> Result<WriteSet, ProcessError> {
        let mut writes = WriteSet::new();

        let previous = self
            .store
            .latest_role_event(log.chain_id, ROLES_ADMIN_ROLE, log.position())
            .await?
            .filter(|event| event.is_granted);
        if let Some(previous) = previous {
            if previous.assignee != new_admin {
                info!(
                    chain_id = log.chain_id,
                    previous = %previous.assignee,
                    %new_admin,
                    "admin transferred"
                );
                writes.role_event(RoleEventRecord {
                    log: log.clone(),
                    is_granted: false,
                    ..previous
                });
            }
        }

        writes.role_event(role_event(log, ROLES_ADMIN_ROLE, new_admin, true));
        Ok(writes)
    }

    /// Grants the admin role to whoever the roles-admin contract reports as
    /// admin at its deployment.
    pub(super) async fn plan_roles_admin_genesis(
        &self,
        log: &LogMeta,
        roles_admin: Address,
    ) -> Result<WriteSet, ProcessError> {
        let admin = self
            .chain
            .roles_admin_admin(roles_admin, log.block_number)
            .await?;
        self.plan_admin_pulled(log, admin).await
    }
}
