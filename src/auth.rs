//! Authenticated principal and password hashing.
//!
//! There is no ambient "current user": services receive the [`Principal`]
//! explicitly and check authorities against it.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier,
};

use crate::error::{AppError, AppResult};
use crate::models::Credentials;

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ROLE_MANAGER: &str = "ROLE_MANAGER";
pub const ROLE_STAFF: &str = "ROLE_STAFF";

/// Higher roles imply every role below them.
const ROLE_HIERARCHY: [&str; 3] = [ROLE_ADMIN, ROLE_MANAGER, ROLE_STAFF];

fn rank(role: &str) -> Option<usize> {
    ROLE_HIERARCHY.iter().position(|r| *r == role)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: i64,
    pub username: String,
    pub roles: Vec<String>,
    pub privileges: Vec<String>,
}

impl Principal {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            account_id: credentials.account_id,
            username: credentials.username.clone(),
            roles: credentials.roles.iter().map(|r| r.name.clone()).collect(),
            privileges: credentials.privileges.iter().map(|p| p.name.clone()).collect(),
        }
    }

    /// Role names follow the hierarchy; anything else must be held as a role
    /// or privilege name verbatim.
    pub fn has_authority(&self, authority: &str) -> bool {
        match rank(authority) {
            Some(required) => self
                .roles
                .iter()
                .filter_map(|role| rank(role))
                .any(|held| held <= required),
            None => {
                self.roles.iter().any(|r| r == authority)
                    || self.privileges.iter().any(|p| p == authority)
            }
        }
    }

    pub fn require(&self, authority: &str) -> AppResult<()> {
        if self.has_authority(authority) {
            Ok(())
        } else {
            tracing::warn!("{} lacks authority {}", self.username, authority);
            Err(AppError::PermissionDenied(format!(
                "{} requires {}",
                self.username, authority
            )))
        }
    }
}

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> AppResult<String>;

    /// `Unauthenticated` when the password does not match.
    fn verify(&self, password: &str, hash: &str) -> AppResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::IllegalState(format!("Password hash error: {}", e)))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, password: &str, hash: &str) -> AppResult<()> {
        let parsed = PasswordHash::new(hash)
            .map_err(|_| AppError::IllegalState("Invalid password hash in database".into()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AppError::Unauthenticated("Invalid username or password".into()))
    }
}
