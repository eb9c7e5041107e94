use std::collections::BTreeSet;

use crate::db::{Executor, Row, Statement, Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::{Privilege, Role};
use crate::relational::association::ROLE_PRIVILEGES;
use crate::relational::{reconstruct_one, synchronize, AggregateMapper, ExistenceGuard, UnitOfWork};

use super::{exists_by, id_key};

const ROLE_SELECT: &str = "SELECT r.id AS role_id, r.name AS role_name, \
     pv.id AS privilege_id, pv.name AS privilege_name \
     FROM roles r \
     LEFT JOIN roles_privileges rp ON rp.role_id = r.id \
     LEFT JOIN privileges pv ON pv.id = rp.privilege_id";

pub(crate) fn find_by_id_sql() -> String {
    format!("{} WHERE r.id = $1 ORDER BY pv.id", ROLE_SELECT)
}

pub(crate) fn find_by_name_sql() -> String {
    format!("{} WHERE r.name = $1 ORDER BY pv.id", ROLE_SELECT)
}

struct RoleRows;

impl AggregateMapper for RoleRows {
    type Key = i64;
    type Parent = Role;
    type Child = Privilege;

    fn key(&self, row: &Row) -> Result<i64, StoreError> {
        row.try_get("role_id")
    }

    fn parent(&self, row: &Row) -> Result<Role, StoreError> {
        Ok(Role {
            id: Some(row.try_get("role_id")?),
            name: row.try_get("role_name")?,
            privileges: Vec::new(),
        })
    }

    fn child(&self, row: &Row) -> Result<Option<Privilege>, StoreError> {
        if row.is_null("privilege_id") {
            return Ok(None);
        }
        Ok(Some(Privilege {
            id: Some(row.try_get("privilege_id")?),
            name: row.try_get("privilege_name")?,
        }))
    }

    fn attach(parent: &mut Role, child: Privilege) {
        parent.privileges.push(child);
    }
}

async fn load<E: Executor>(executor: &mut E, statement: &Statement) -> AppResult<Option<Role>> {
    let rows = executor.fetch_all(statement).await?;
    Ok(reconstruct_one(&RoleRows, rows)?)
}

#[derive(Clone)]
pub struct RoleRepository<S: Store> {
    store: S,
}

impl<S: Store> RoleRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn exists_by_id(&self, id: i64) -> AppResult<bool> {
        exists_by(&self.store, "roles", "id", id).await
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Role> {
        let mut conn = self.store.acquire().await?;
        load(&mut conn, &Statement::new(find_by_id_sql()).bind(id))
            .await?
            .ok_or_else(|| AppError::not_found("Role", id_key(id)))
    }

    pub async fn find_by_name(&self, name: &str) -> AppResult<Role> {
        let mut conn = self.store.acquire().await?;
        load(&mut conn, &Statement::new(find_by_name_sql()).bind(name))
            .await?
            .ok_or_else(|| AppError::not_found("Role", format!("name: {}", name)))
    }

    pub async fn update_privileges(&self, id: i64, privilege_ids: &BTreeSet<i64>) -> AppResult<Role> {
        let guard = privilege_ids.iter().fold(
            ExistenceGuard::new().require_id("Role", "roles", id),
            |guard, &privilege| guard.require_id("Privilege", "privileges", privilege),
        );

        let mut unit = UnitOfWork::new(&self.store, "role.update_privileges")
            .guard(&guard)
            .await?
            .begin()
            .await?;

        let result: AppResult<Role> = async {
            synchronize(unit.executor(), &ROLE_PRIVILEGES, id, privilege_ids).await?;
            load(unit.executor(), &Statement::new(find_by_id_sql()).bind(id))
                .await?
                .ok_or_else(|| AppError::not_found("Role", id_key(id)))
        }
        .await;

        let role = unit.finish(result).await?;
        tracing::info!("Role privileges updated: role={} privileges={}", role.name, role.privileges.len());
        Ok(role)
    }
}
