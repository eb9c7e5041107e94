pub mod pool;
pub mod postgres;
pub mod store;
pub mod value;

#[cfg(test)]
pub mod memory;

pub use pool::create_pool;
pub use postgres::PgStore;
pub use store::{ExecOutcome, Executor, IsolationLevel, Statement, Store, StoreError, Transaction};
pub use value::{FromSqlValue, Row, SqlValue};
