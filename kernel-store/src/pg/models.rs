use alloy_primitives::{Address, B256};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, Output, ToSql},
    sql_types::Bytea,
};
use kernel_types::{
    ActionExecutedRecord, ContractEventRecord, ContractRecord, EventPosition,
    KernelExecutorEventRecord, KernelExecutorRecord, LogMeta, RoleAssignmentRecord,
    RoleEventRecord, RoleRecord,
};
use serde::{de::DeserializeOwned, Serialize};

use super::schema::{
    action_executed_events, contract_events, contracts, kernel_executor_events, kernel_executors,
    role_assignments, role_events, roles,
};
use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow)]
#[diesel(sql_type = Bytea)]
pub struct DbAddress(pub Address);

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow)]
#[diesel(sql_type = Bytea)]
pub struct DbHash(pub B256);

impl FromSql<Bytea, Pg> for DbAddress {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let bytes: Vec<u8> = <Vec<u8> as FromSql<Bytea, Pg>>::from_sql(bytes)?;
        if bytes.len() == 20 {
            Ok(Self(Address::from_slice(&bytes)))
        } else {
            Err("Invalid data for DbAddress: expected 20 bytes".into())
        }
    }
}

impl ToSql<Bytea, Pg> for DbAddress {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <[u8] as ToSql<Bytea, Pg>>::to_sql(self.0.as_slice(), out)
    }
}

impl FromSql<Bytea, Pg> for DbHash {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let bytes: Vec<u8> = <Vec<u8> as FromSql<Bytea, Pg>>::from_sql(bytes)?;
        if bytes.len() == 32 {
            Ok(Self(B256::from_slice(&bytes)))
        } else {
            Err("Invalid data for DbHash: expected 32 bytes".into())
        }
    }
}

impl ToSql<Bytea, Pg> for DbHash {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <[u8] as ToSql<Bytea, Pg>>::to_sql(self.0.as_slice(), out)
    }
}

pub(super) fn int(table: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt {
        table,
        reason: format!("integer {value} exceeds int8"),
    })
}

fn uint(table: &'static str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt {
        table,
        reason: format!("negative integer {value}"),
    })
}

fn to_json<T: Serialize>(
    table: &'static str,
    value: &Option<T>,
) -> Result<Option<serde_json::Value>, StoreError> {
    value
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|err| StoreError::Corrupt {
            table,
            reason: err.to_string(),
        })
}

fn from_json<T: DeserializeOwned>(
    table: &'static str,
    value: Option<serde_json::Value>,
) -> Result<Option<T>, StoreError> {
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(|err| StoreError::Corrupt {
            table,
            reason: err.to_string(),
        })
}

fn parse<T: std::str::FromStr>(table: &'static str, value: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| StoreError::Corrupt {
        table,
        reason: err.to_string(),
    })
}

fn log_meta(
    table: &'static str,
    chain_id: i64,
    transaction_hash: DbHash,
    log_index: i64,
    block_number: i64,
    timestamp: i64,
) -> Result<LogMeta, StoreError> {
    Ok(LogMeta {
        chain_id: uint(table, chain_id)?,
        transaction_hash: transaction_hash.0,
        log_index: uint(table, log_index)?,
        block_number: uint(table, block_number)?,
        timestamp: uint(table, timestamp)?,
    })
}

#[derive(Debug, Clone, Insertable, Queryable, Selectable, AsChangeset)]
#[diesel(table_name = contracts)]
#[diesel(primary_key(chain_id, address))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContractRow {
    pub chain_id: i64,
    pub address: DbAddress,
    pub name: String,
    pub version: Option<String>,
    pub kind: String,
    pub is_enabled: bool,
    pub last_updated_timestamp: i64,
    pub last_updated_block_number: i64,
    pub last_updated_log_index: i64,
    pub policy_permissions: Option<serde_json::Value>,
    pub policy_functions: Option<serde_json::Value>,
}

impl TryFrom<&ContractRecord> for ContractRow {
    type Error = StoreError;

    fn try_from(record: &ContractRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "contracts";
        Ok(Self {
            chain_id: int(TABLE, record.chain_id)?,
            address: DbAddress(record.address),
            name: record.name.clone(),
            version: record.version.clone(),
            kind: record.kind.as_str().to_owned(),
            is_enabled: record.is_enabled,
            last_updated_timestamp: int(TABLE, record.last_updated_timestamp)?,
            last_updated_block_number: int(TABLE, record.last_updated.block_number)?,
            last_updated_log_index: int(TABLE, record.last_updated.log_index)?,
            policy_permissions: to_json(TABLE, &record.policy_permissions)?,
            policy_functions: to_json(TABLE, &record.policy_functions)?,
        })
    }
}

impl TryFrom<ContractRow> for ContractRecord {
    type Error = StoreError;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "contracts";
        Ok(Self {
            chain_id: uint(TABLE, row.chain_id)?,
            address: row.address.0,
            name: row.name,
            version: row.version,
            kind: parse(TABLE, &row.kind)?,
            is_enabled: row.is_enabled,
            last_updated: EventPosition::new(
                uint(TABLE, row.last_updated_block_number)?,
                uint(TABLE, row.last_updated_log_index)?,
            ),
            last_updated_timestamp: uint(TABLE, row.last_updated_timestamp)?,
            policy_permissions: from_json(TABLE, row.policy_permissions)?,
            policy_functions: from_json(TABLE, row.policy_functions)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, Queryable, Selectable)]
#[diesel(table_name = contract_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContractEventRow {
    pub chain_id: i64,
    pub transaction_hash: DbHash,
    pub log_index: i64,
    pub address: DbAddress,
    pub block_number: i64,
    pub timestamp: i64,
    pub name: String,
    pub version: Option<String>,
    pub kind: String,
    pub action: String,
    pub is_enabled: bool,
    pub policy_permissions: Option<serde_json::Value>,
    pub policy_functions: Option<serde_json::Value>,
}

impl TryFrom<&ContractEventRecord> for ContractEventRow {
    type Error = StoreError;

    fn try_from(record: &ContractEventRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "contract_events";
        Ok(Self {
            chain_id: int(TABLE, record.log.chain_id)?,
            transaction_hash: DbHash(record.log.transaction_hash),
            log_index: int(TABLE, record.log.log_index)?,
            address: DbAddress(record.address),
            block_number: int(TABLE, record.log.block_number)?,
            timestamp: int(TABLE, record.log.timestamp)?,
            name: record.name.clone(),
            version: record.version.clone(),
            kind: record.kind.as_str().to_owned(),
            action: record.action.as_str().to_owned(),
            is_enabled: record.is_enabled,
            policy_permissions: to_json(TABLE, &record.policy_permissions)?,
            policy_functions: to_json(TABLE, &record.policy_functions)?,
        })
    }
}

impl TryFrom<ContractEventRow> for ContractEventRecord {
    type Error = StoreError;

    fn try_from(row: ContractEventRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "contract_events";
        Ok(Self {
            log: log_meta(
                TABLE,
                row.chain_id,
                row.transaction_hash,
                row.log_index,
                row.block_number,
                row.timestamp,
            )?,
            address: row.address.0,
            name: row.name,
            version: row.version,
            kind: parse(TABLE, &row.kind)?,
            action: parse(TABLE, &row.action)?,
            is_enabled: row.is_enabled,
            policy_permissions: from_json(TABLE, row.policy_permissions)?,
            policy_functions: from_json(TABLE, row.policy_functions)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, Queryable, Selectable, AsChangeset)]
#[diesel(table_name = kernel_executors)]
#[diesel(primary_key(chain_id, kernel))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KernelExecutorRow {
    pub chain_id: i64,
    pub kernel: DbAddress,
    pub executor: DbAddress,
    pub last_updated_timestamp: i64,
    pub last_updated_block_number: i64,
    pub last_updated_log_index: i64,
}

impl TryFrom<&KernelExecutorRecord> for KernelExecutorRow {
    type Error = StoreError;

    fn try_from(record: &KernelExecutorRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "kernel_executors";
        Ok(Self {
            chain_id: int(TABLE, record.chain_id)?,
            kernel: DbAddress(record.kernel),
            executor: DbAddress(record.executor),
            last_updated_timestamp: int(TABLE, record.last_updated_timestamp)?,
            last_updated_block_number: int(TABLE, record.last_updated.block_number)?,
            last_updated_log_index: int(TABLE, record.last_updated.log_index)?,
        })
    }
}

impl TryFrom<KernelExecutorRow> for KernelExecutorRecord {
    type Error = StoreError;

    fn try_from(row: KernelExecutorRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "kernel_executors";
        Ok(Self {
            chain_id: uint(TABLE, row.chain_id)?,
            kernel: row.kernel.0,
            executor: row.executor.0,
            last_updated: EventPosition::new(
                uint(TABLE, row.last_updated_block_number)?,
                uint(TABLE, row.last_updated_log_index)?,
            ),
            last_updated_timestamp: uint(TABLE, row.last_updated_timestamp)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = kernel_executor_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KernelExecutorEventRow {
    pub chain_id: i64,
    pub kernel: DbAddress,
    pub transaction_hash: DbHash,
    pub log_index: i64,
    pub executor: DbAddress,
    pub block_number: i64,
    pub timestamp: i64,
}

impl TryFrom<&KernelExecutorEventRecord> for KernelExecutorEventRow {
    type Error = StoreError;

    fn try_from(record: &KernelExecutorEventRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "kernel_executor_events";
        Ok(Self {
            chain_id: int(TABLE, record.log.chain_id)?,
            kernel: DbAddress(record.kernel),
            transaction_hash: DbHash(record.log.transaction_hash),
            log_index: int(TABLE, record.log.log_index)?,
            executor: DbAddress(record.executor),
            block_number: int(TABLE, record.log.block_number)?,
            timestamp: int(TABLE, record.log.timestamp)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoleRow {
    pub chain_id: i64,
    pub role: String,
}

impl TryFrom<&RoleRecord> for RoleRow {
    type Error = StoreError;

    fn try_from(record: &RoleRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "roles";
        Ok(Self {
            chain_id: int(TABLE, record.chain_id)?,
            role: record.role.clone(),
        })
    }
}

#[derive(Debug, Clone, Insertable, Queryable, Selectable, AsChangeset)]
#[diesel(table_name = role_assignments)]
#[diesel(primary_key(chain_id, role, assignee))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoleAssignmentRow {
    pub chain_id: i64,
    pub role: String,
    pub assignee: DbAddress,
    pub assignee_name: String,
    pub is_granted: bool,
    pub last_updated_timestamp: i64,
    pub last_updated_block_number: i64,
    pub last_updated_log_index: i64,
}

impl TryFrom<&RoleAssignmentRecord> for RoleAssignmentRow {
    type Error = StoreError;

    fn try_from(record: &RoleAssignmentRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "role_assignments";
        Ok(Self {
            chain_id: int(TABLE, record.chain_id)?,
            role: record.role.clone(),
            assignee: DbAddress(record.assignee),
            assignee_name: record.assignee_name.clone(),
            is_granted: record.is_granted,
            last_updated_timestamp: int(TABLE, record.last_updated_timestamp)?,
            last_updated_block_number: int(TABLE, record.last_updated.block_number)?,
            last_updated_log_index: int(TABLE, record.last_updated.log_index)?,
        })
    }
}

impl TryFrom<RoleAssignmentRow> for RoleAssignmentRecord {
    type Error = StoreError;

    fn try_from(row: RoleAssignmentRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "role_assignments";
        Ok(Self {
            chain_id: uint(TABLE, row.chain_id)?,
            role: row.role,
            assignee: row.assignee.0,
            assignee_name: row.assignee_name,
            is_granted: row.is_granted,
            last_updated: EventPosition::new(
                uint(TABLE, row.last_updated_block_number)?,
                uint(TABLE, row.last_updated_log_index)?,
            ),
            last_updated_timestamp: uint(TABLE, row.last_updated_timestamp)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, Queryable, Selectable)]
#[diesel(table_name = role_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoleEventRow {
    pub chain_id: i64,
    pub role: String,
    pub transaction_hash: DbHash,
    pub log_index: i64,
    pub assignee: DbAddress,
    pub assignee_name: String,
    pub is_granted: bool,
    pub block_number: i64,
    pub timestamp: i64,
}

impl TryFrom<&RoleEventRecord> for RoleEventRow {
    type Error = StoreError;

    fn try_from(record: &RoleEventRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "role_events";
        Ok(Self {
            chain_id: int(TABLE, record.log.chain_id)?,
            role: record.role.clone(),
            transaction_hash: DbHash(record.log.transaction_hash),
            log_index: int(TABLE, record.log.log_index)?,
            assignee: DbAddress(record.assignee),
            assignee_name: record.assignee_name.clone(),
            is_granted: record.is_granted,
            block_number: int(TABLE, record.log.block_number)?,
            timestamp: int(TABLE, record.log.timestamp)?,
        })
    }
}

impl TryFrom<RoleEventRow> for RoleEventRecord {
    type Error = StoreError;

    fn try_from(row: RoleEventRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "role_events";
        Ok(Self {
            log: log_meta(
                TABLE,
                row.chain_id,
                row.transaction_hash,
                row.log_index,
                row.block_number,
                row.timestamp,
            )?,
            role: row.role,
            assignee: row.assignee.0,
            assignee_name: row.assignee_name,
            is_granted: row.is_granted,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = action_executed_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActionExecutedRow {
    pub chain_id: i64,
    pub kernel: DbAddress,
    pub transaction_hash: DbHash,
    pub log_index: i64,
    pub action: String,
    pub target: DbAddress,
    pub block_number: i64,
    pub timestamp: i64,
}

impl TryFrom<&ActionExecutedRecord> for ActionExecutedRow {
    type Error = StoreError;

    fn try_from(record: &ActionExecutedRecord) -> Result<Self, Self::Error> {
        const TABLE: &str = "action_executed_events";
        Ok(Self {
            chain_id: int(TABLE, record.log.chain_id)?,
            kernel: DbAddress(record.kernel),
            transaction_hash: DbHash(record.log.transaction_hash),
            log_index: int(TABLE, record.log.log_index)?,
            action: record.action.as_str().to_owned(),
            target: DbAddress(record.target),
            block_number: int(TABLE, record.log.block_number)?,
            timestamp: int(TABLE, record.log.timestamp)?,
        })
    }
}
