//! Per-aggregate persistence built on the relational core.
//!
//! Every repository is generic over the storage port so the same code runs
//! against Postgres and the in-memory store used by the tests.

pub mod accounts;
pub mod categories;
pub mod inventory;
pub mod locations;
pub mod products;
pub mod roles;
pub mod suppliers;

pub use accounts::AccountRepository;
pub use categories::CategoryRepository;
pub use inventory::InventoryRepository;
pub use locations::LocationRepository;
pub use products::ProductRepository;
pub use roles::RoleRepository;
pub use suppliers::SupplierRepository;

use crate::db::{Executor, SqlValue, Statement, Store};
use crate::error::{AppError, AppResult};
use crate::relational;

pub(crate) fn delete_sql(table: &str) -> String {
    format!("DELETE FROM {} WHERE id = $1", table)
}

pub(crate) async fn exists_by<S: Store>(
    store: &S,
    table: &'static str,
    column: &'static str,
    value: impl Into<SqlValue>,
) -> AppResult<bool> {
    let mut conn = store.acquire().await?;
    Ok(relational::exists(&mut conn, table, column, value).await?)
}

/// Deletes by primary key. Link rows and dependents go with it through the
/// schema's cascades.
pub(crate) async fn delete_by_id<S: Store>(
    store: &S,
    entity: &'static str,
    table: &'static str,
    id: i64,
) -> AppResult<u64> {
    let mut conn = store.acquire().await?;
    let outcome = conn
        .execute(&Statement::new(delete_sql(table)).bind(id))
        .await?;
    if outcome.rows_affected == 0 {
        return Err(AppError::not_found(entity, id_key(id)));
    }
    tracing::debug!("deleted {} id={}", entity, id);
    Ok(outcome.rows_affected)
}

/// An UPDATE keyed on an id that was guarded a moment ago affected nothing:
/// the row was deleted in between.
pub(crate) async fn update_row<E: Executor>(
    executor: &mut E,
    entity: &'static str,
    statement: &Statement,
    id: i64,
) -> AppResult<()> {
    let outcome = executor.execute(statement).await?;
    if outcome.rows_affected == 0 {
        return Err(AppError::not_found(entity, id_key(id)));
    }
    Ok(())
}

pub(crate) fn id_key(id: i64) -> String {
    format!("id: {}", id)
}
