//! Events consumed by the processors, decoded from chain logs or synthesized
//! from deployment coordinates.

use alloy_primitives::Address;
use alloy_rpc_types_eth::Log;
use alloy_sol_types::SolEvent;
use kernel_chain_config::ChainDeployment;
use kernel_types::{decode_padded_ascii, ChainId, EventPosition, LogMeta};
use thiserror::Error;

use crate::abi::{IKernel, IRoles, IRolesAdmin};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log is missing {0}")]
    MissingField(&'static str),

    #[error("failed to decode {event}: {source}")]
    Abi {
        event: &'static str,
        #[source]
        source: alloy_sol_types::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// Deployment of the kernel, which emits no log of its own.
    KernelGenesis { log: LogMeta, kernel: Address },
    /// Deployment of the roles-admin contract. Its constructor admin never
    /// shows up in a `NewAdminPulled` log.
    RolesAdminGenesis { log: LogMeta, roles_admin: Address },
    ActionExecuted {
        log: LogMeta,
        kernel: Address,
        action_code: u8,
        target: Address,
    },
    RoleGranted {
        log: LogMeta,
        role: String,
        assignee: Address,
    },
    RoleRevoked {
        log: LogMeta,
        role: String,
        assignee: Address,
    },
    NewAdminPulled { log: LogMeta, new_admin: Address },
}

impl ChainEvent {
    pub fn log(&self) -> &LogMeta {
        match self {
            ChainEvent::KernelGenesis { log, .. }
            | ChainEvent::RolesAdminGenesis { log, .. }
            | ChainEvent::ActionExecuted { log, .. }
            | ChainEvent::RoleGranted { log, .. }
            | ChainEvent::RoleRevoked { log, .. }
            | ChainEvent::NewAdminPulled { log, .. } => log,
        }
    }

    pub fn log_mut(&mut self) -> &mut LogMeta {
        match self {
            ChainEvent::KernelGenesis { log, .. }
            | ChainEvent::RolesAdminGenesis { log, .. }
            | ChainEvent::ActionExecuted { log, .. }
            | ChainEvent::RoleGranted { log, .. }
            | ChainEvent::RoleRevoked { log, .. }
            | ChainEvent::NewAdminPulled { log, .. } => log,
        }
    }

    pub fn position(&self) -> EventPosition {
        self.log().position()
    }

    /// Deployment events carry no log of their own.
    pub fn is_synthesized(&self) -> bool {
        matches!(
            self,
            ChainEvent::KernelGenesis { .. } | ChainEvent::RolesAdminGenesis { .. }
        )
    }

    /// Stream order. A synthesized event shares `(creation_block, 0)` with
    /// whatever log really sits there and goes ahead of it.
    pub fn sort_key(&self) -> (EventPosition, bool) {
        (self.position(), !self.is_synthesized())
    }

    pub fn chain_id(&self) -> ChainId {
        self.log().chain_id
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChainEvent::KernelGenesis { .. } => "KernelGenesis",
            ChainEvent::RolesAdminGenesis { .. } => "RolesAdminGenesis",
            ChainEvent::ActionExecuted { .. } => "ActionExecuted",
            ChainEvent::RoleGranted { .. } => "RoleGranted",
            ChainEvent::RoleRevoked { .. } => "RoleRevoked",
            ChainEvent::NewAdminPulled { .. } => "NewAdminPulled",
        }
    }

    /// Synthesized deployment events of a chain, in stream order.
    pub fn genesis(deployment: &ChainDeployment) -> Vec<ChainEvent> {
        let mut events = vec![
            ChainEvent::KernelGenesis {
                log: deployment.kernel.genesis_log(deployment.chain_id),
                kernel: deployment.kernel.address,
            },
            ChainEvent::RolesAdminGenesis {
                log: deployment.roles_admin.genesis_log(deployment.chain_id),
                roles_admin: deployment.roles_admin.address,
            },
        ];
        events.sort_by_key(ChainEvent::sort_key);
        events
    }

    /// Decodes a log emitted by one of the deployment's contracts. Logs of
    /// other contracts and events the processors do not handle yield `None`.
    pub fn from_log(
        deployment: &ChainDeployment,
        log: &Log,
        timestamp: u64,
    ) -> Result<Option<ChainEvent>, DecodeError> {
        let Some(topic0) = log.topics().first().copied() else {
            return Ok(None);
        };
        let emitter = log.address();

        let meta = LogMeta {
            chain_id: deployment.chain_id,
            transaction_hash: log
                .transaction_hash
                .ok_or(DecodeError::MissingField("transaction hash"))?,
            log_index: log.log_index.ok_or(DecodeError::MissingField("log index"))?,
            block_number: log
                .block_number
                .ok_or(DecodeError::MissingField("block number"))?,
            timestamp,
        };

        let event = if emitter == deployment.kernel.address
            && topic0 == IKernel::ActionExecuted::SIGNATURE_HASH
        {
            let decoded = IKernel::ActionExecuted::decode_log_data(log.data(), true)
                .map_err(|source| DecodeError::Abi {
                    event: "ActionExecuted",
                    source,
                })?;
            ChainEvent::ActionExecuted {
                log: meta,
                kernel: emitter,
                action_code: decoded.action_,
                target: decoded.target_,
            }
        } else if emitter == deployment.roles.address
            && topic0 == IRoles::RoleGranted::SIGNATURE_HASH
        {
            let decoded = IRoles::RoleGranted::decode_log_data(log.data(), true).map_err(
                |source| DecodeError::Abi {
                    event: "RoleGranted",
                    source,
                },
            )?;
            ChainEvent::RoleGranted {
                log: meta,
                role: decode_padded_ascii(decoded.role_.as_slice()),
                assignee: decoded.addr_,
            }
        } else if emitter == deployment.roles.address
            && topic0 == IRoles::RoleRevoked::SIGNATURE_HASH
        {
            let decoded = IRoles::RoleRevoked::decode_log_data(log.data(), true).map_err(
                |source| DecodeError::Abi {
                    event: "RoleRevoked",
                    source,
                },
            )?;
            ChainEvent::RoleRevoked {
                log: meta,
                role: decode_padded_ascii(decoded.role_.as_slice()),
                assignee: decoded.addr_,
            }
        } else if emitter == deployment.roles_admin.address
            && topic0 == IRolesAdmin::NewAdminPulled::SIGNATURE_HASH
        {
            let decoded = IRolesAdmin::NewAdminPulled::decode_log_data(log.data(), true)
                .map_err(|source| DecodeError::Abi {
                    event: "NewAdminPulled",
                    source,
                })?;
            ChainEvent::NewAdminPulled {
                log: meta,
                new_admin: decoded.newAdmin_,
            }
        } else {
            return Ok(None);
        };
        Ok(Some(event))
    }
}
