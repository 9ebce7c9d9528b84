//! Row types of the materialized view. "Current" records are overwritten in
//! place and remember the position of their last update; history records are
//! written once and keyed by the log that produced them.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    ActionKind, ChainId, ContractKind, EventPosition, FunctionDetails, LogMeta, PolicyPermission,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub chain_id: ChainId,
    pub address: Address,
    /// Directory name for kernels and policies, keycode for modules
    pub name: String,
    pub version: Option<String>,
    pub kind: ContractKind,
    pub is_enabled: bool,
    pub last_updated: EventPosition,
    pub last_updated_timestamp: u64,
    pub policy_permissions: Option<Vec<PolicyPermission>>,
    pub policy_functions: Option<Vec<FunctionDetails>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEventRecord {
    pub log: LogMeta,
    pub address: Address,
    pub name: String,
    pub version: Option<String>,
    pub kind: ContractKind,
    pub action: ActionKind,
    pub is_enabled: bool,
    pub policy_permissions: Option<Vec<PolicyPermission>>,
    pub policy_functions: Option<Vec<FunctionDetails>>,
}

impl ContractEventRecord {
    /// Current-state row this event leaves behind.
    pub fn current(&self) -> ContractRecord {
        ContractRecord {
            chain_id: self.log.chain_id,
            address: self.address,
            name: self.name.clone(),
            version: self.version.clone(),
            kind: self.kind,
            is_enabled: self.is_enabled,
            last_updated: self.log.position(),
            last_updated_timestamp: self.log.timestamp,
            policy_permissions: self.policy_permissions.clone(),
            policy_functions: self.policy_functions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelExecutorRecord {
    pub chain_id: ChainId,
    pub kernel: Address,
    pub executor: Address,
    pub last_updated: EventPosition,
    pub last_updated_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelExecutorEventRecord {
    pub log: LogMeta,
    pub kernel: Address,
    pub executor: Address,
}

impl KernelExecutorEventRecord {
    pub fn current(&self) -> KernelExecutorRecord {
        KernelExecutorRecord {
            chain_id: self.log.chain_id,
            kernel: self.kernel,
            executor: self.executor,
            last_updated: self.log.position(),
            last_updated_timestamp: self.log.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRecord {
    pub chain_id: ChainId,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentRecord {
    pub chain_id: ChainId,
    pub role: String,
    pub assignee: Address,
    pub assignee_name: String,
    pub is_granted: bool,
    pub last_updated: EventPosition,
    pub last_updated_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEventRecord {
    pub log: LogMeta,
    pub role: String,
    pub assignee: Address,
    pub assignee_name: String,
    pub is_granted: bool,
}

impl RoleEventRecord {
    /// Current-state row this event leaves behind.
    pub fn assignment(&self) -> RoleAssignmentRecord {
        RoleAssignmentRecord {
            chain_id: self.log.chain_id,
            role: self.role.clone(),
            assignee: self.assignee,
            assignee_name: self.assignee_name.clone(),
            is_granted: self.is_granted,
            last_updated: self.log.position(),
            last_updated_timestamp: self.log.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionExecutedRecord {
    pub log: LogMeta,
    pub kernel: Address,
    pub action: ActionKind,
    pub target: Address,
}
