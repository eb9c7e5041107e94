use std::collections::BTreeSet;

use crate::db::{Executor, Row, Statement, Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::{Account, Credentials, NewAccount, Privilege, Role};
use crate::relational::association::USER_ROLES;
use crate::relational::{
    read_children, reconstruct_one, synchronize, AggregateMapper, ExistenceGuard, UnitOfWork,
};

use super::{delete_by_id, id_key};

pub(crate) const EXISTS_BY_USERNAME_OR_EMAIL: &str =
    "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2) AS present";

pub(crate) const INSERT: &str = "INSERT INTO users(username, email, password, created_at) \
     VALUES($1, $2, $3, NOW()) RETURNING id";

pub(crate) const LINK_ROLE_BY_NAME: &str =
    "INSERT INTO users_roles(user_id, role_id) SELECT $1, id FROM roles WHERE name = $2";

/// One row per role; each role's privileges arrive folded into a single
/// delimited column.
pub(crate) const FIND_BY_ID: &str = "SELECT u.id AS user_id, u.username, u.email, u.password, \
     u.created_at, r.id AS role_id, r.name AS role_name, \
     (SELECT STRING_AGG(pv.name, ', ' ORDER BY pv.id) FROM roles_privileges rp \
      JOIN privileges pv ON pv.id = rp.privilege_id WHERE rp.role_id = r.id) AS role_privileges \
     FROM users u \
     LEFT JOIN users_roles ur ON ur.user_id = u.id \
     LEFT JOIN roles r ON r.id = ur.role_id \
     WHERE u.id = $1 ORDER BY r.id";

/// Login projection: one row per user with roles and privileges as two
/// delimited columns.
pub(crate) const FIND_PRINCIPAL: &str = "SELECT u.id AS user_id, u.username, u.password, \
     (SELECT STRING_AGG(DISTINCT r.name, ', ') FROM users_roles ur \
      JOIN roles r ON r.id = ur.role_id WHERE ur.user_id = u.id) AS roles, \
     (SELECT STRING_AGG(DISTINCT pv.name, ', ') FROM users_roles ur \
      JOIN roles_privileges rp ON rp.role_id = ur.role_id \
      JOIN privileges pv ON pv.id = rp.privilege_id WHERE ur.user_id = u.id) AS privileges \
     FROM users u WHERE u.username = $1";

struct AccountRows;

impl AggregateMapper for AccountRows {
    type Key = i64;
    type Parent = Account;
    type Child = Role;

    fn key(&self, row: &Row) -> Result<i64, StoreError> {
        row.try_get("user_id")
    }

    fn parent(&self, row: &Row) -> Result<Account, StoreError> {
        Ok(Account {
            id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password")?,
            roles: Vec::new(),
            created_at: row.try_get("created_at")?,
        })
    }

    fn child(&self, row: &Row) -> Result<Option<Role>, StoreError> {
        if row.is_null("role_id") {
            return Ok(None);
        }
        Ok(Some(Role {
            id: Some(row.try_get("role_id")?),
            name: row.try_get("role_name")?,
            privileges: read_children(row, "role_privileges", Privilege::named)?,
        }))
    }

    fn attach(parent: &mut Account, child: Role) {
        parent.roles.push(child);
    }
}

async fn load<E: Executor>(executor: &mut E, id: i64) -> AppResult<Option<Account>> {
    let rows = executor
        .fetch_all(&Statement::new(FIND_BY_ID).bind(id))
        .await?;
    Ok(reconstruct_one(&AccountRows, rows)?)
}

fn credentials_from_row(row: &Row) -> Result<Credentials, StoreError> {
    Ok(Credentials {
        account_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password")?,
        roles: read_children(row, "roles", Role::named)?,
        privileges: read_children(row, "privileges", Privilege::named)?,
    })
}

/// Users and employees. Both are rows of `users`, told apart only by role.
#[derive(Clone)]
pub struct AccountRepository<S: Store> {
    store: S,
}

impl<S: Store> AccountRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn exists_by_username_or_email(&self, username: &str, email: &str) -> AppResult<bool> {
        let mut conn = self.store.acquire().await?;
        let statement = Statement::new(EXISTS_BY_USERNAME_OR_EMAIL)
            .bind(username)
            .bind(email);
        Ok(conn.fetch_exists(&statement).await?)
    }

    /// Creates the user and grants `default_role` in one transaction.
    /// `AlreadyExists` when the username or email is taken.
    pub async fn register(&self, account: &NewAccount, default_role: &str) -> AppResult<Account> {
        let guard = ExistenceGuard::new()
            .reject("User", "users", "username", account.username.as_str())
            .reject("User", "users", "email", account.email.as_str())
            .require("Role", "roles", "name", default_role);

        let mut unit = UnitOfWork::new(&self.store, "account.register")
            .guard(&guard)
            .await?
            .begin()
            .await?;

        let result: AppResult<Account> = async {
            let insert = Statement::new(INSERT)
                .bind(&account.username)
                .bind(&account.email)
                .bind(&account.password_hash)
                .returning_id();
            let id = unit.insert("user", &insert).await?;

            let link = Statement::new(LINK_ROLE_BY_NAME).bind(id).bind(default_role);
            unit.write("user role", &link).await?;

            load(unit.executor(), id).await?.ok_or_else(|| {
                AppError::IllegalState(format!("User {} not readable after insert", id))
            })
        }
        .await;

        let account = unit.finish(result).await?;
        tracing::info!("Account registered: id={} username={}", account.id, account.username);
        Ok(account)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Account> {
        let mut conn = self.store.acquire().await?;
        load(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id_key(id)))
    }

    pub async fn find_principal(&self, username: &str) -> AppResult<Credentials> {
        let mut conn = self.store.acquire().await?;
        let row = conn
            .fetch_optional(&Statement::new(FIND_PRINCIPAL).bind(username))
            .await?
            .ok_or_else(|| AppError::not_found("User", format!("username: {}", username)))?;
        Ok(credentials_from_row(&row)?)
    }

    pub async fn update_roles(&self, id: i64, role_ids: &BTreeSet<i64>) -> AppResult<Account> {
        let guard = role_ids.iter().fold(
            ExistenceGuard::new().require_id("User", "users", id),
            |guard, &role| guard.require_id("Role", "roles", role),
        );

        let mut unit = UnitOfWork::new(&self.store, "account.update_roles")
            .guard(&guard)
            .await?
            .begin()
            .await?;

        let result: AppResult<Account> = async {
            synchronize(unit.executor(), &USER_ROLES, id, role_ids).await?;
            load(unit.executor(), id)
                .await?
                .ok_or_else(|| AppError::not_found("User", id_key(id)))
        }
        .await;

        let account = unit.finish(result).await?;
        tracing::info!("Account roles updated: id={} roles={:?}", id, role_ids);
        Ok(account)
    }

    pub async fn delete_by_id(&self, id: i64) -> AppResult<u64> {
        delete_by_id(&self.store, "User", "users", id).await
    }
}
