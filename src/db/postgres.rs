use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::Row as _;
use sqlx::{Column, PgConnection, PgPool, Postgres, TypeInfo};

use super::{
    ExecOutcome, Executor, IsolationLevel, Row, SqlValue, Statement, Store, StoreError, Transaction,
};

/// Storage port backed by a sqlx Postgres pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgConn {
    conn: PoolConnection<Postgres>,
}

pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn bind_all(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    statement
        .params()
        .iter()
        .fold(sqlx::query(statement.sql()), |query, param| match param {
            // Bound as a TEXT-typed NULL: only valid against text columns unless
            // the statement casts the placeholder.
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::BigInt(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Decimal(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        })
}

fn decode_row(row: &PgRow) -> Result<Row, StoreError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
            "INT2" => row
                .try_get::<Option<i16>, _>(index)?
                .map(|v| SqlValue::Int(i32::from(v))),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.map(SqlValue::Int),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.map(SqlValue::BigInt),
            "NUMERIC" => row.try_get::<Option<Decimal>, _>(index)?.map(SqlValue::Decimal),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(index)?
                .map(SqlValue::Timestamp),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(index)?
                .map(|v| SqlValue::Timestamp(v.naive_utc())),
            _ => row.try_get::<Option<String>, _>(index)?.map(SqlValue::Text),
        };
        decoded.push(column.name(), value.unwrap_or(SqlValue::Null));
    }
    Ok(decoded)
}

async fn fetch_rows(conn: &mut PgConnection, statement: &Statement) -> Result<Vec<Row>, StoreError> {
    tracing::debug!("fetch: {}", statement.sql());
    let rows = bind_all(statement).fetch_all(conn).await?;
    rows.iter().map(decode_row).collect()
}

async fn execute_on(conn: &mut PgConnection, statement: &Statement) -> Result<ExecOutcome, StoreError> {
    tracing::debug!("execute: {}", statement.sql());
    if statement.is_returning_id() {
        let rows = bind_all(statement).fetch_all(conn).await?;
        let generated_id = rows
            .first()
            .map(|row| row.try_get::<i64, _>("id"))
            .transpose()?;
        Ok(ExecOutcome {
            rows_affected: rows.len() as u64,
            generated_id,
        })
    } else {
        let result = bind_all(statement).execute(conn).await?;
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            generated_id: None,
        })
    }
}

#[async_trait]
impl Executor for PgConn {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        fetch_rows(&mut self.conn, statement).await
    }

    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, StoreError> {
        execute_on(&mut self.conn, statement).await
    }
}

#[async_trait]
impl Executor for PgTx {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        fetch_rows(&mut self.tx, statement).await
    }

    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, StoreError> {
        execute_on(&mut self.tx, statement).await
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    type Conn = PgConn;
    type Tx = PgTx;

    async fn acquire(&self) -> Result<PgConn, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(PgConn { conn })
    }

    async fn begin(&self, isolation: IsolationLevel) -> Result<PgTx, StoreError> {
        let mut tx = self.pool.begin().await?;
        let set_isolation = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql());
        sqlx::query(&set_isolation).execute(&mut *tx).await?;
        Ok(PgTx { tx })
    }
}
