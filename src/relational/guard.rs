//! Referential and uniqueness preconditions checked before a write.
//!
//! This is check-then-act: a concurrent delete can still slip in between the
//! check and the write, in which case the foreign-key constraint rejects it.
//! The guard only turns the common case into a specific error.

use crate::db::{Executor, SqlValue, Statement, StoreError};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
struct Check {
    entity: &'static str,
    table: &'static str,
    column: &'static str,
    value: SqlValue,
    expect: Expect,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistenceGuard {
    checks: Vec<Check>,
}

pub fn exists_statement(table: &str, column: &str, value: impl Into<SqlValue>) -> Statement {
    Statement::new(format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1) AS present",
        table, column
    ))
    .bind(value)
}

pub async fn exists<E: Executor>(
    executor: &mut E,
    table: &str,
    column: &str,
    value: impl Into<SqlValue>,
) -> Result<bool, StoreError> {
    executor
        .fetch_exists(&exists_statement(table, column, value))
        .await
}

impl ExistenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_id(self, entity: &'static str, table: &'static str, id: i64) -> Self {
        self.require(entity, table, "id", id)
    }

    /// Fails with `NotFound` unless a row with `column = value` exists.
    pub fn require(
        mut self,
        entity: &'static str,
        table: &'static str,
        column: &'static str,
        value: impl Into<SqlValue>,
    ) -> Self {
        self.checks.push(Check {
            entity,
            table,
            column,
            value: value.into(),
            expect: Expect::Present,
        });
        self
    }

    /// Fails with `AlreadyExists` if a row with `column = value` exists.
    pub fn reject(
        mut self,
        entity: &'static str,
        table: &'static str,
        column: &'static str,
        value: impl Into<SqlValue>,
    ) -> Self {
        self.checks.push(Check {
            entity,
            table,
            column,
            value: value.into(),
            expect: Expect::Absent,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs the checks in declaration order and stops at the first failure.
    pub async fn verify<E: Executor>(&self, executor: &mut E) -> AppResult<()> {
        for check in &self.checks {
            let present = exists(executor, check.table, check.column, check.value.clone()).await?;
            let key = format!("{}: {}", check.column, check.value);
            match (check.expect, present) {
                (Expect::Present, false) => {
                    tracing::debug!("guard failed: {} missing ({})", check.entity, key);
                    return Err(AppError::not_found(check.entity, key));
                }
                (Expect::Absent, true) => {
                    tracing::debug!("guard failed: {} exists ({})", check.entity, key);
                    return Err(AppError::already_exists(check.entity, key));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
