use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    /// Unknown when decoded from an aggregated name list.
    pub id: Option<i64>,
    pub name: String,
}

impl Privilege {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Option<i64>,
    pub name: String,
    pub privileges: Vec<Privilege>,
}

impl Role {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            privileges: Vec::new(),
        }
    }
}

/// User or employee account. Both live in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Login projection: the stored hash plus flattened role and privilege names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account_id: i64,
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub privileges: Vec<Privilege>,
}
