//! Storage port consumed by the repositories.
//!
//! The relational core only ever talks to these traits: a [`Store`] hands out
//! autocommit connections and transactions, both of which are [`Executor`]s.
//! `PgStore` adapts them to a sqlx pool; `MemoryStore` backs the tests.

use async_trait::async_trait;
use thiserror::Error;

use super::{Row, SqlValue};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Column not found in result row: {0}")]
    ColumnNotFound(String),

    #[error("Column {column} could not be decoded as {expected}")]
    Decode {
        column: String,
        expected: &'static str,
    },

    #[error("Storage fault: {0}")]
    Fault(String),
}

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Parameterized SQL with `$n` placeholders and positional values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
    returning_id: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            returning_id: false,
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Marks an insert whose statement ends in `RETURNING id`.
    pub fn returning_id(mut self) -> Self {
        self.returning_id = true;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn is_returning_id(&self) -> bool {
        self.returning_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub generated_id: Option<i64>,
}

#[async_trait]
pub trait Executor: Send {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError>;

    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, StoreError>;

    async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<Row>, StoreError> {
        Ok(self.fetch_all(statement).await?.into_iter().next())
    }

    /// Runs a `SELECT EXISTS(...)` style query and reads its single boolean column.
    async fn fetch_exists(&mut self, statement: &Statement) -> Result<bool, StoreError> {
        let row = self.fetch_optional(statement).await?;
        match row.as_ref().and_then(|r| r.columns().next()) {
            Some((_, SqlValue::Bool(present))) => Ok(*present),
            Some((column, _)) => Err(StoreError::Decode {
                column: column.to_string(),
                expected: "BOOL",
            }),
            None => Ok(false),
        }
    }
}

#[async_trait]
pub trait Transaction: Executor {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Conn: Executor;
    type Tx: Transaction;

    /// Connection that commits every statement on its own.
    async fn acquire(&self) -> Result<Self::Conn, StoreError>;

    async fn begin(&self, isolation: IsolationLevel) -> Result<Self::Tx, StoreError>;
}
