use std::{fmt, str::FromStr};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown kernel action code {0}")]
pub struct UnknownActionCode(pub u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Kind of contract a kernel action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Kernel,
    Module,
    Policy,
}

impl ContractKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::Kernel => "kernel",
            ContractKind::Module => "module",
            ContractKind::Policy => "policy",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kernel" => Ok(ContractKind::Kernel),
            "module" => Ok(ContractKind::Module),
            "policy" => Ok(ContractKind::Policy),
            _ => Err(ParseEnumError {
                kind: "contract kind",
                value: s.to_owned(),
            }),
        }
    }
}

/// Fieldless mirror of [`KernelAction`], used for storage columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    InstallModule,
    UpgradeModule,
    ActivatePolicy,
    DeactivatePolicy,
    ChangeExecutor,
    MigrateKernel,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::InstallModule => "installModule",
            ActionKind::UpgradeModule => "upgradeModule",
            ActionKind::ActivatePolicy => "activatePolicy",
            ActionKind::DeactivatePolicy => "deactivatePolicy",
            ActionKind::ChangeExecutor => "changeExecutor",
            ActionKind::MigrateKernel => "migrateKernel",
        }
    }

    pub fn contract_kind(&self) -> ContractKind {
        match self {
            ActionKind::InstallModule | ActionKind::UpgradeModule => ContractKind::Module,
            ActionKind::ActivatePolicy | ActionKind::DeactivatePolicy => ContractKind::Policy,
            ActionKind::ChangeExecutor | ActionKind::MigrateKernel => ContractKind::Kernel,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "installModule" => ActionKind::InstallModule,
            "upgradeModule" => ActionKind::UpgradeModule,
            "activatePolicy" => ActionKind::ActivatePolicy,
            "deactivatePolicy" => ActionKind::DeactivatePolicy,
            "changeExecutor" => ActionKind::ChangeExecutor,
            "migrateKernel" => ActionKind::MigrateKernel,
            _ => {
                return Err(ParseEnumError {
                    kind: "action",
                    value: s.to_owned(),
                })
            }
        })
    }
}

/// An `ActionExecuted(action_, target_)` log decoded into the action it encodes.
///
/// The numeric codes follow the kernel's `Actions` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelAction {
    InstallModule { module: Address },
    /// The module replaces whichever module currently holds the same keycode.
    UpgradeModule { module: Address },
    ActivatePolicy { policy: Address },
    DeactivatePolicy { policy: Address },
    /// The new executor is read back from the kernel, not taken from the log.
    ChangeExecutor { executor: Address },
    MigrateKernel { kernel: Address },
}

impl KernelAction {
    pub fn decode(code: u8, target: Address) -> Result<Self, UnknownActionCode> {
        Ok(match code {
            0 => KernelAction::InstallModule { module: target },
            1 => KernelAction::UpgradeModule { module: target },
            2 => KernelAction::ActivatePolicy { policy: target },
            3 => KernelAction::DeactivatePolicy { policy: target },
            4 => KernelAction::ChangeExecutor { executor: target },
            5 => KernelAction::MigrateKernel { kernel: target },
            _ => return Err(UnknownActionCode(code)),
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            KernelAction::InstallModule { .. } => ActionKind::InstallModule,
            KernelAction::UpgradeModule { .. } => ActionKind::UpgradeModule,
            KernelAction::ActivatePolicy { .. } => ActionKind::ActivatePolicy,
            KernelAction::DeactivatePolicy { .. } => ActionKind::DeactivatePolicy,
            KernelAction::ChangeExecutor { .. } => ActionKind::ChangeExecutor,
            KernelAction::MigrateKernel { .. } => ActionKind::MigrateKernel,
        }
    }

    pub fn target(&self) -> Address {
        match *self {
            KernelAction::InstallModule { module } | KernelAction::UpgradeModule { module } => {
                module
            }
            KernelAction::ActivatePolicy { policy }
            | KernelAction::DeactivatePolicy { policy } => policy,
            KernelAction::ChangeExecutor { executor } => executor,
            KernelAction::MigrateKernel { kernel } => kernel,
        }
    }

    pub fn contract_kind(&self) -> ContractKind {
        self.kind().contract_kind()
    }

    /// Enabled flag recorded for the target contract. `None` when the action
    /// has no contract lifecycle of its own.
    pub fn target_enabled(&self) -> Option<bool> {
        match self {
            KernelAction::InstallModule { .. }
            | KernelAction::UpgradeModule { .. }
            | KernelAction::ActivatePolicy { .. }
            | KernelAction::MigrateKernel { .. } => Some(true),
            KernelAction::DeactivatePolicy { .. } => Some(false),
            KernelAction::ChangeExecutor { .. } => None,
        }
    }
}
