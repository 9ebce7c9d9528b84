use alloy_primitives::Address;
use diesel::{
    BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, PgConnection,
    QueryDsl, SelectableHelper,
};
use diesel_async::{
    pooled_connection::{bb8::Pool, AsyncDieselConnectionManager},
    scoped_futures::ScopedFutureExt,
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use eyre::{eyre, Context};
use kernel_types::{
    ChainId, ContractEventRecord, ContractKind, ContractRecord, EventPosition,
    KernelExecutorRecord, RoleAssignmentRecord, RoleEventRecord,
};
use tracing::{debug, info};

use self::models::{
    int, ActionExecutedRow, ContractEventRow, ContractRow, DbAddress, KernelExecutorEventRow,
    KernelExecutorRow, RoleAssignmentRow, RoleEventRow, RoleRow,
};
use crate::{StateStore, StoreError, WriteOp, WriteSet};

pub mod models;
pub mod schema;

use schema::{
    action_executed_events, contract_events, contracts, kernel_executor_events, kernel_executors,
    role_assignments, role_events, roles,
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Applies pending migrations over a short-lived synchronous connection.
pub fn run_migrations(database_url: &str) -> eyre::Result<()> {
    let mut conn = PgConnection::establish(database_url)
        .wrap_err("failed to connect to database for migrations")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| eyre!("failed to run migrations: {err}"))?;
    info!(applied = applied.len(), "database migrations up to date");
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<AsyncPgConnection>,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_size: u32) -> eyre::Result<Self> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_size)
            .build(config)
            .await
            .wrap_err("failed to build connection pool")?;
        Ok(Self { pool })
    }
}

/// `(block_number, log_index) < (block, index)`
macro_rules! strictly_before {
    ($table:ident, $block:expr, $index:expr) => {
        $table::block_number
            .lt($block)
            .or($table::block_number.eq($block).and($table::log_index.lt($index)))
    };
}

/// A current row is replaced unless the stored one is strictly newer.
fn is_stale(stored: Option<(i64, i64)>, incoming: (i64, i64)) -> bool {
    matches!(stored, Some(stored) if stored > incoming)
}

async fn apply_op(conn: &mut AsyncPgConnection, op: WriteOp) -> Result<(), StoreError> {
    let table = op.table();
    match op {
        WriteOp::ActionExecuted(record) => {
            diesel::insert_into(action_executed_events::table)
                .values(ActionExecutedRow::try_from(&record)?)
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;
        }
        WriteOp::ContractEvent(record) => {
            diesel::insert_into(contract_events::table)
                .values(ContractEventRow::try_from(&record)?)
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;
        }
        WriteOp::KernelExecutorEvent(record) => {
            diesel::insert_into(kernel_executor_events::table)
                .values(KernelExecutorEventRow::try_from(&record)?)
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;
        }
        WriteOp::RoleEvent(record) => {
            diesel::insert_into(role_events::table)
                .values(RoleEventRow::try_from(&record)?)
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;
        }
        WriteOp::Role(record) => {
            diesel::insert_into(roles::table)
                .values(RoleRow::try_from(&record)?)
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;
        }
        WriteOp::Contract(record) => {
            let row = ContractRow::try_from(&record)?;
            let key = contracts::table.find((row.chain_id, row.address));
            let stored = key
                .clone()
                .select((
                    contracts::last_updated_block_number,
                    contracts::last_updated_log_index,
                ))
                .for_update()
                .first::<(i64, i64)>(conn)
                .await
                .optional()?;
            let incoming = (row.last_updated_block_number, row.last_updated_log_index);
            if is_stale(stored, incoming) {
                debug!(table, address = %record.address, "skipping older write");
            } else if stored.is_some() {
                diesel::update(key).set(&row).execute(conn).await?;
            } else {
                diesel::insert_into(contracts::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
            }
        }
        WriteOp::KernelExecutor(record) => {
            let row = KernelExecutorRow::try_from(&record)?;
            let key = kernel_executors::table.find((row.chain_id, row.kernel));
            let stored = key
                .clone()
                .select((
                    kernel_executors::last_updated_block_number,
                    kernel_executors::last_updated_log_index,
                ))
                .for_update()
                .first::<(i64, i64)>(conn)
                .await
                .optional()?;
            let incoming = (row.last_updated_block_number, row.last_updated_log_index);
            if is_stale(stored, incoming) {
                debug!(table, kernel = %record.kernel, "skipping older write");
            } else if stored.is_some() {
                diesel::update(key).set(&row).execute(conn).await?;
            } else {
                diesel::insert_into(kernel_executors::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
            }
        }
        WriteOp::RoleAssignment(record) => {
            let row = RoleAssignmentRow::try_from(&record)?;
            let key = role_assignments::table.find((row.chain_id, row.role.clone(), row.assignee));
            let stored = key
                .clone()
                .select((
                    role_assignments::last_updated_block_number,
                    role_assignments::last_updated_log_index,
                ))
                .for_update()
                .first::<(i64, i64)>(conn)
                .await
                .optional()?;
            let incoming = (row.last_updated_block_number, row.last_updated_log_index);
            if is_stale(stored, incoming) {
                debug!(
                    table,
                    role = %record.role,
                    assignee = %record.assignee,
                    "skipping older write"
                );
            } else if stored.is_some() {
                diesel::update(key).set(&row).execute(conn).await?;
            } else {
                diesel::insert_into(role_assignments::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
            }
        }
    }
    Ok(())
}

impl StateStore for PgStore {
    async fn contract(
        &self,
        chain_id: ChainId,
        address: Address,
    ) -> Result<Option<ContractRecord>, StoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        contracts::table
            .find((int("contracts", chain_id)?, DbAddress(address)))
            .select(ContractRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(ContractRecord::try_from)
            .transpose()
    }

    async fn latest_module_event(
        &self,
        chain_id: ChainId,
        keycode: &str,
        before: EventPosition,
    ) -> Result<Option<ContractEventRecord>, StoreError> {
        const TABLE: &str = "contract_events";
        let (block, index) = (int(TABLE, before.block_number)?, int(TABLE, before.log_index)?);
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        contract_events::table
            .filter(contract_events::chain_id.eq(int(TABLE, chain_id)?))
            .filter(contract_events::kind.eq(ContractKind::Module.as_str()))
            .filter(contract_events::name.eq(keycode))
            .filter(strictly_before!(contract_events, block, index))
            .order((
                contract_events::block_number.desc(),
                contract_events::log_index.desc(),
                contract_events::is_enabled.desc(),
            ))
            .select(ContractEventRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(ContractEventRecord::try_from)
            .transpose()
    }

    async fn latest_role_event(
        &self,
        chain_id: ChainId,
        role: &str,
        before: EventPosition,
    ) -> Result<Option<RoleEventRecord>, StoreError> {
        const TABLE: &str = "role_events";
        let (block, index) = (int(TABLE, before.block_number)?, int(TABLE, before.log_index)?);
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        role_events::table
            .filter(role_events::chain_id.eq(int(TABLE, chain_id)?))
            .filter(role_events::role.eq(role))
            .filter(strictly_before!(role_events, block, index))
            .order((
                role_events::block_number.desc(),
                role_events::log_index.desc(),
                role_events::is_granted.desc(),
            ))
            .select(RoleEventRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(RoleEventRecord::try_from)
            .transpose()
    }

    async fn kernel_executor(
        &self,
        chain_id: ChainId,
        kernel: Address,
    ) -> Result<Option<KernelExecutorRecord>, StoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        kernel_executors::table
            .find((int("kernel_executors", chain_id)?, DbAddress(kernel)))
            .select(KernelExecutorRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(KernelExecutorRecord::try_from)
            .transpose()
    }

    async fn role_assignment(
        &self,
        chain_id: ChainId,
        role: &str,
        assignee: Address,
    ) -> Result<Option<RoleAssignmentRecord>, StoreError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        role_assignments::table
            .find((int("role_assignments", chain_id)?, role.to_owned(), DbAddress(assignee)))
            .select(RoleAssignmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(RoleAssignmentRecord::try_from)
            .transpose()
    }

    async fn apply(&self, writes: WriteSet) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        let num_writes = writes.len();
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                for op in writes {
                    apply_op(conn, op).await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await?;
        debug!(num_writes, "applied write set");
        Ok(())
    }
}

fn pool_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::Pool(err.to_string())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::is_stale;

    #[test_case(None, (10, 0), false; "no stored row")]
    #[test_case(Some((10, 0)), (10, 0), false; "same position")]
    #[test_case(Some((9, 5)), (10, 0), false; "older stored row")]
    #[test_case(Some((10, 1)), (10, 0), true; "newer log index")]
    #[test_case(Some((11, 0)), (10, 7), true; "newer block")]
    fn test_is_stale(stored: Option<(i64, i64)>, incoming: (i64, i64), stale: bool) {
        assert_eq!(is_stale(stored, incoming), stale);
    }
}
