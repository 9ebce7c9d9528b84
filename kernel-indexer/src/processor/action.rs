use alloy_primitives::Address;
use kernel_chain_config::{contract_label, contract_name};
use kernel_metadata::{CacheStorage, MetadataSource};
use kernel_store::{StateStore, WriteSet};
use kernel_types::{
    ActionExecutedRecord, ActionKind, ContractEventRecord, ContractKind, KernelAction, Keycode,
    LogMeta, PolicyPermission,
};
use tracing::{info, warn};

use super::EventProcessor;
use crate::{ChainReader, ProcessError};

impl<S, C, CS, M> EventProcessor<S, C, CS, M>
where
    S: StateStore,
    C: ChainReader,
    CS: CacheStorage,
    M: MetadataSource,
{
    pub(super) async fn plan_action(
        &self,
        log: &LogMeta,
        kernel: Address,
        action_code: u8,
        target: Address,
    ) -> Result<WriteSet, ProcessError> {
        let action = KernelAction::decode(action_code, target)?;
        info!(
            chain_id = log.chain_id,
            %kernel,
            %target,
            action = %action.kind(),
            block_number = log.block_number,
            "kernel action"
        );

        let mut writes = WriteSet::new();
        writes.action_executed(ActionExecutedRecord {
            log: log.clone(),
            kernel,
            action: action.kind(),
            target,
        });

        match action {
            KernelAction::InstallModule { module } => {
                let keycode = self.chain.module_keycode(module, log.block_number).await?;
                if let Some(enabled) = self.enabled_module(log, keycode.as_str()).await? {
                    if enabled.address != module {
                        return Err(ProcessError::KeycodeConflict {
                            keycode: keycode.into_string(),
                            module,
                            enabled: enabled.address,
                        });
                    }
                }
                writes.contract_event(module_record(log, module, keycode, action.kind()));
            }
            KernelAction::UpgradeModule { module } => {
                let keycode = self.chain.module_keycode(module, log.block_number).await?;
                let previous = self
                    .enabled_module(log, keycode.as_str())
                    .await?
                    .ok_or_else(|| ProcessError::MissingPreviousModule {
                        keycode: keycode.to_string(),
                        module,
                    })?;
                if previous.address == module {
                    return Err(ProcessError::KeycodeConflict {
                        keycode: keycode.into_string(),
                        module,
                        enabled: previous.address,
                    });
                }
                info!(
                    chain_id = log.chain_id,
                    %keycode,
                    previous = %previous.address,
                    %module,
                    "replacing module"
                );
                writes
                    .contract_event(ContractEventRecord {
                        log: log.clone(),
                        action: ActionKind::UpgradeModule,
                        is_enabled: false,
                        ..previous
                    })
                    .contract_event(module_record(log, module, keycode, action.kind()));
            }
            KernelAction::ActivatePolicy { policy } | KernelAction::DeactivatePolicy { policy } => {
                let is_enabled = action.target_enabled().unwrap_or_default();
                let record = self
                    .policy_record(log, policy, action.kind(), is_enabled)
                    .await?;
                writes.contract_event(record);
            }
            KernelAction::ChangeExecutor { .. } => {
                self.plan_change_executor(log, kernel, &mut writes).await?;
            }
            KernelAction::MigrateKernel { kernel: new_kernel } => {
                // kernels have no contract lifecycle, the action row is the record
                info!(chain_id = log.chain_id, %kernel, %new_kernel, "kernel migrated");
            }
        }
        Ok(writes)
    }

    async fn policy_record(
        &self,
        log: &LogMeta,
        policy: Address,
        action: ActionKind,
        is_enabled: bool,
    ) -> Result<ContractEventRecord, ProcessError> {
        let chain_id = log.chain_id;
        let name = contract_name(chain_id, policy);

        let requests = self
            .chain
            .policy_permissions(policy, log.block_number)
            .await?;
        let mut permissions = Vec::with_capacity(requests.len());
        for (keycode, selector) in requests {
            let module = self
                .enabled_module(log, keycode.as_str())
                .await?
                .ok_or_else(|| ProcessError::MissingModuleForKeycode {
                    keycode: keycode.to_string(),
                    policy,
                })?;
            let module_name = contract_name(chain_id, module.address);
            let metadata = self
                .metadata
                .process_contract(chain_id, module.address, module_name)
                .await?;
            let function = match metadata.function(selector) {
                Some(function) => function.signature.clone(),
                None => {
                    warn!(
                        chain_id,
                        %policy,
                        %keycode,
                        module = %module.address,
                        %selector,
                        "selector not found in module abi"
                    );
                    selector.to_string()
                }
            };
            permissions.push(PolicyPermission {
                keycode: keycode.into_string(),
                function,
            });
        }

        let functions = match self.metadata.process_contract(chain_id, policy, name).await {
            Ok(metadata) => metadata.guarded_functions(),
            Err(err) => {
                warn!(chain_id, %policy, ?err, "policy not enriched, recording no functions");
                Vec::new()
            }
        };

        Ok(ContractEventRecord {
            log: log.clone(),
            address: policy,
            name: name.to_owned(),
            version: contract_label(chain_id, policy).and_then(|label| label.version.clone()),
            kind: ContractKind::Policy,
            action,
            is_enabled,
            policy_permissions: Some(permissions),
            policy_functions: Some(functions),
        })
    }
}

fn module_record(
    log: &LogMeta,
    module: Address,
    keycode: Keycode,
    action: ActionKind,
) -> ContractEventRecord {
    ContractEventRecord {
        log: log.clone(),
        address: module,
        name: keycode.into_string(),
        version: None,
        kind: ContractKind::Module,
        action,
        is_enabled: true,
        policy_permissions: None,
        policy_functions: None,
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use kernel_metadata::EnrichmentError;
    use kernel_store::StateStore;
    use kernel_types::EventPosition;

    use super::*;
    use crate::{
        processor::testutil::{log, processor, selector, MockChain, MockExplorer, CHAIN_ID},
        ChainEvent,
    };

    // mainnet kernel, named by the directory
    const KERNEL: Address = address!("2286d7f9639e8158FaD1169e76d1FbC38247f54b");
    const MODULE_A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const MODULE_B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const POLICY: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

    const TOKEN_SOURCE: &str = r#"
        contract Token {
            function transfer(address to, uint256 amount) external returns (bool) {
                return true;
            }
        }
    "#;

    const POLICY_SOURCE: &str = r#"
        contract Treasurer {
            bytes32 public constant ADMIN_ROLE = "treasurer_admin";

            function withdraw(uint256 amount) external onlyRole(ADMIN_ROLE) {}

            function balance() external view returns (uint256) {}
        }
    "#;

    fn action(block: u64, log_index: u64, code: u8, target: Address) -> ChainEvent {
        ChainEvent::ActionExecuted {
            log: log(block, log_index),
            kernel: KERNEL,
            action_code: code,
            target,
        }
    }

    fn modules() -> MockChain {
        MockChain::default()
            .with_module(MODULE_A, "TRSRY")
            .with_module(MODULE_B, "TRSRY")
    }

    fn token_explorer() -> MockExplorer {
        MockExplorer::default()
            .with_contract(
                MODULE_A,
                &["function transfer(address to, uint256 amount) returns (bool)"],
                TOKEN_SOURCE,
            )
            .with_contract(
                POLICY,
                &[
                    "function withdraw(uint256 amount)",
                    "function balance() view returns (uint256)",
                ],
                POLICY_SOURCE,
            )
    }

    #[tokio::test]
    async fn test_module_upgrade_disables_previous_module() {
        let processor = processor(modules(), MockExplorer::default());

        processor.process(&action(10, 0, 0, MODULE_A)).await.unwrap();
        processor.process(&action(20, 4, 1, MODULE_B)).await.unwrap();

        let store = processor.store();
        let a = store.contract(CHAIN_ID, MODULE_A).await.unwrap().unwrap();
        let b = store.contract(CHAIN_ID, MODULE_B).await.unwrap().unwrap();
        assert!(!a.is_enabled);
        assert!(b.is_enabled);
        assert_eq!(a.name, "TRSRY");
        assert_eq!(b.name, "TRSRY");
        assert_eq!(a.last_updated, EventPosition::new(20, 4));

        let tables = store.snapshot().await;
        let disabling: Vec<_> = tables
            .contract_events
            .values()
            .filter(|e| e.address == MODULE_A && !e.is_enabled)
            .collect();
        assert_eq!(disabling.len(), 1);
        assert_eq!(disabling[0].action, ActionKind::UpgradeModule);
        assert_eq!(tables.action_events.len(), 2);
    }

    #[tokio::test]
    async fn test_upgrade_without_previous_module_fails() {
        let processor = processor(modules(), MockExplorer::default());

        let err = processor
            .process(&action(20, 0, 1, MODULE_B))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::MissingPreviousModule { .. }));
        assert_eq!(
            processor.store().snapshot().await,
            kernel_store::MemoryTables::default()
        );
    }

    #[tokio::test]
    async fn test_upgrade_to_current_module_is_a_conflict() {
        let processor = processor(modules(), MockExplorer::default());
        processor.process(&action(10, 0, 0, MODULE_A)).await.unwrap();

        let err = processor
            .process(&action(20, 0, 1, MODULE_A))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::KeycodeConflict { .. }));
    }

    #[tokio::test]
    async fn test_install_over_enabled_keycode_is_a_conflict() {
        let processor = processor(modules(), MockExplorer::default());
        processor.process(&action(10, 0, 0, MODULE_A)).await.unwrap();

        let err = processor
            .process(&action(20, 0, 0, MODULE_B))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessError::KeycodeConflict { enabled, .. } if enabled == MODULE_A
        ));
    }

    #[tokio::test]
    async fn test_failed_keycode_read_writes_nothing() {
        let processor = processor(MockChain::default(), MockExplorer::default());

        let err = processor
            .process(&action(10, 0, 0, MODULE_A))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::ChainRead(_)));
        assert!(processor.store().snapshot().await.action_events.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_code() {
        let processor = processor(modules(), MockExplorer::default());
        let err = processor
            .process(&action(10, 0, 9, MODULE_A))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::UnknownAction(_)));
        assert!(err.needs_operator());
    }

    #[tokio::test]
    async fn test_policy_permissions_are_resolved_to_signatures() {
        let transfer = selector("transfer(address,uint256)");
        let burn = selector("burn(uint256)");
        let chain = modules().with_permissions(POLICY, &[("TRSRY", transfer), ("TRSRY", burn)]);
        let processor = processor(chain, token_explorer());

        processor.process(&action(10, 0, 0, MODULE_A)).await.unwrap();
        processor.process(&action(11, 0, 2, POLICY)).await.unwrap();

        let policy = processor
            .store()
            .contract(CHAIN_ID, POLICY)
            .await
            .unwrap()
            .unwrap();
        assert!(policy.is_enabled);
        assert_eq!(policy.kind, ContractKind::Policy);
        assert_eq!(
            policy.policy_permissions.unwrap(),
            vec![
                PolicyPermission {
                    keycode: "TRSRY".to_owned(),
                    function: "transfer(address,uint256)".to_owned(),
                },
                PolicyPermission {
                    keycode: "TRSRY".to_owned(),
                    function: burn.to_string(),
                },
            ]
        );

        let functions = policy.policy_functions.unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].signature, "withdraw(uint256)");
        assert_eq!(functions[0].roles, vec!["treasurer_admin".to_owned()]);
    }

    #[tokio::test]
    async fn test_deactivated_policy_is_disabled() {
        let chain = modules().with_permissions(POLICY, &[]);
        let processor = processor(chain, token_explorer());

        processor.process(&action(11, 0, 2, POLICY)).await.unwrap();
        processor.process(&action(12, 0, 3, POLICY)).await.unwrap();

        let policy = processor
            .store()
            .contract(CHAIN_ID, POLICY)
            .await
            .unwrap()
            .unwrap();
        assert!(!policy.is_enabled);
        assert_eq!(policy.policy_permissions, Some(vec![]));
        assert_eq!(processor.store().snapshot().await.contract_events.len(), 2);
    }

    #[tokio::test]
    async fn test_policy_permission_without_module_fails() {
        let chain = modules().with_permissions(POLICY, &[("MINTR", selector("mint()"))]);
        let processor = processor(chain, token_explorer());

        let err = processor
            .process(&action(11, 0, 2, POLICY))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessError::MissingModuleForKeycode { ref keycode, .. } if keycode == "MINTR"
        ));
    }

    #[tokio::test]
    async fn test_unverified_module_fails_policy_activation() {
        let transfer = selector("transfer(address,uint256)");
        let chain = modules().with_permissions(POLICY, &[("TRSRY", transfer)]);
        let processor = processor(chain, token_explorer());

        processor.process(&action(10, 0, 0, MODULE_A)).await.unwrap();
        processor.process(&action(20, 0, 1, MODULE_B)).await.unwrap();
        let err = processor
            .process(&action(21, 0, 2, POLICY))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Enrichment(EnrichmentError::NoSourceCode { address, .. })
                if address == MODULE_B
        ));
        assert!(err.needs_operator());
    }

    #[tokio::test]
    async fn test_migrate_kernel_records_only_the_action() {
        let new_kernel = address!("dddddddddddddddddddddddddddddddddddddddd");
        let processor = processor(MockChain::default(), MockExplorer::default());
        processor.process(&action(10, 0, 5, KERNEL)).await.unwrap();
        processor.process(&action(30, 2, 5, new_kernel)).await.unwrap();

        let tables = processor.store().snapshot().await;
        assert!(tables.contract_events.is_empty());
        assert!(tables.contracts.is_empty());

        let mut targets: Vec<_> = tables
            .action_events
            .values()
            .map(|event| (event.action, event.target))
            .collect();
        targets.sort_by_key(|(_, target)| *target);
        assert_eq!(
            targets,
            vec![
                (ActionKind::MigrateKernel, KERNEL),
                (ActionKind::MigrateKernel, new_kernel),
            ]
        );
    }

    #[tokio::test]
    async fn test_unverified_policy_is_recorded_without_functions() {
        let transfer = selector("transfer(address,uint256)");
        let chain = modules().with_permissions(POLICY, &[("TRSRY", transfer)]);
        let explorer = MockExplorer::default().with_contract(
            MODULE_A,
            &["function transfer(address to, uint256 amount) returns (bool)"],
            TOKEN_SOURCE,
        );
        let processor = processor(chain, explorer);

        processor.process(&action(10, 0, 0, MODULE_A)).await.unwrap();
        processor.process(&action(11, 0, 2, POLICY)).await.unwrap();

        let policy = processor
            .store()
            .contract(CHAIN_ID, POLICY)
            .await
            .unwrap()
            .unwrap();
        assert!(policy.is_enabled);
        assert_eq!(policy.policy_functions, Some(vec![]));
        assert_eq!(
            policy.policy_permissions.unwrap()[0].function,
            "transfer(address,uint256)"
        );
    }
}
