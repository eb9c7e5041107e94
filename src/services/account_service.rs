use std::collections::BTreeSet;

use crate::auth::{PasswordHasher, Principal, ROLE_ADMIN, ROLE_MANAGER};
use crate::db::Store;
use crate::error::{AppError, AppResult, ErrorKind};
use crate::models::{Account, NewAccount, Role};
use crate::repositories::{AccountRepository, RoleRepository};

use super::validation::{Validator, MIN_PASSWORD_LEN};

const BAD_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReq {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub struct AccountServiceImpl<S: Store, H: PasswordHasher> {
    accounts: AccountRepository<S>,
    roles: RoleRepository<S>,
    hasher: H,
    default_role: String,
}

impl<S: Store, H: PasswordHasher> AccountServiceImpl<S, H> {
    pub fn new(store: S, hasher: H, default_role: impl Into<String>) -> Self {
        Self {
            accounts: AccountRepository::new(store.clone()),
            roles: RoleRepository::new(store),
            hasher,
            default_role: default_role.into(),
        }
    }

    /// Self-service sign-up. The new account holds only the default role;
    /// a taken username or email is `AlreadyExists`.
    pub async fn register(&self, req: RegisterReq) -> AppResult<Account> {
        let username = req.username.trim();
        let email = req.email.trim();
        Validator::new()
            .not_blank("username", username)
            .email("email", email)
            .min_len("password", &req.password, MIN_PASSWORD_LEN)
            .finish()?;

        let password_hash = self.hasher.hash(&req.password)?;
        self.accounts
            .register(
                &NewAccount {
                    username: username.to_string(),
                    email: email.to_string(),
                    password_hash,
                },
                &self.default_role,
            )
            .await
    }

    /// Unknown usernames and wrong passwords fail the same way.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<Principal> {
        let credentials = match self.accounts.find_principal(username).await {
            Ok(credentials) => credentials,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Login failed: unknown username {}", username);
                return Err(AppError::Unauthenticated(BAD_CREDENTIALS.into()));
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.hasher.verify(password, &credentials.password_hash) {
            tracing::warn!("Login failed: bad password for {}", username);
            return Err(e);
        }

        tracing::info!("Login succeeded: {}", username);
        Ok(Principal::from_credentials(&credentials))
    }

    pub async fn get_account(&self, principal: &Principal, id: i64) -> AppResult<Account> {
        if principal.account_id != id {
            principal.require(ROLE_MANAGER)?;
        }
        self.accounts.find_by_id(id).await
    }

    /// Replaces the account's roles with exactly `role_names`.
    pub async fn assign_roles(
        &self,
        principal: &Principal,
        id: i64,
        role_names: &[String],
    ) -> AppResult<Account> {
        principal.require(ROLE_MANAGER)?;

        let mut role_ids = BTreeSet::new();
        for name in role_names {
            let role = self.roles.find_by_name(name.trim()).await?;
            role_ids.insert(role_id(&role)?);
        }

        let account = self.accounts.update_roles(id, &role_ids).await?;
        tracing::info!(
            "Roles assigned by {}: user={} roles={:?}",
            principal.username,
            id,
            role_names
        );
        Ok(account)
    }

    pub async fn set_role_privileges(
        &self,
        principal: &Principal,
        role_name: &str,
        privilege_ids: &BTreeSet<i64>,
    ) -> AppResult<Role> {
        principal.require(ROLE_ADMIN)?;
        let role = self.roles.find_by_name(role_name).await?;
        let updated = self
            .roles
            .update_privileges(role_id(&role)?, privilege_ids)
            .await?;
        tracing::info!("Privileges of {} set by {}", role_name, principal.username);
        Ok(updated)
    }

    pub async fn delete_account(&self, principal: &Principal, id: i64) -> AppResult<()> {
        principal.require(ROLE_MANAGER)?;
        self.accounts.delete_by_id(id).await?;
        tracing::info!("Account deleted by {}: id={}", principal.username, id);
        Ok(())
    }
}

fn role_id(role: &Role) -> AppResult<i64> {
    role.id
        .ok_or_else(|| AppError::IllegalState(format!("Role {} read without id", role.name)))
}
