//! In-memory storage port for tests.
//!
//! Statements are dispatched to handlers registered by SQL prefix (longest
//! prefix wins). Transactions work on a snapshot of the committed tables which
//! replaces them on commit and is discarded on rollback or drop.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    ExecOutcome, Executor, IsolationLevel, Row, SqlValue, Statement, Store, StoreError, Transaction,
};

pub enum Reply {
    Rows(Vec<Row>),
    Exec(ExecOutcome),
}

impl Reply {
    pub fn affected(rows_affected: u64) -> Self {
        Reply::Exec(ExecOutcome {
            rows_affected,
            generated_id: None,
        })
    }

    pub fn inserted(id: i64) -> Self {
        Reply::Exec(ExecOutcome {
            rows_affected: 1,
            generated_id: Some(id),
        })
    }

    pub fn exists(present: bool) -> Self {
        Reply::Rows(vec![Row::new().with("present", present)])
    }
}

type Handler = Arc<dyn Fn(&Statement, &mut Tables) -> Result<Reply, StoreError> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct Tables {
    rows: BTreeMap<String, BTreeMap<i64, Row>>,
    links: BTreeMap<String, BTreeSet<(i64, i64)>>,
    sequence: i64,
}

impl Tables {
    /// Stores `row` under a fresh id, prepending the `id` column.
    pub fn insert(&mut self, table: &str, row: Row) -> i64 {
        self.sequence += 1;
        let id = self.sequence;
        let mut stored = Row::new().with("id", id);
        for (name, value) in row.columns() {
            stored.push(name, value.clone());
        }
        self.rows.entry(table.to_string()).or_default().insert(id, stored);
        id
    }

    /// Id the next insert will receive. Inserts made inside a rolled back
    /// transaction never advance it.
    pub fn next_id(&self) -> i64 {
        self.sequence + 1
    }

    pub fn get(&self, table: &str, id: i64) -> Option<&Row> {
        self.rows.get(table).and_then(|rows| rows.get(&id))
    }

    pub fn get_mut(&mut self, table: &str, id: i64) -> Option<&mut Row> {
        self.rows.get_mut(table).and_then(|rows| rows.get_mut(&id))
    }

    pub fn remove(&mut self, table: &str, id: i64) -> Option<Row> {
        self.rows.get_mut(table).and_then(|rows| rows.remove(&id))
    }

    pub fn scan(&self, table: &str) -> impl Iterator<Item = &Row> {
        self.rows.get(table).into_iter().flat_map(|rows| rows.values())
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows.get(table).map_or(0, BTreeMap::len)
    }

    pub fn link(&mut self, table: &str, parent: i64, child: i64) -> bool {
        self.links
            .entry(table.to_string())
            .or_default()
            .insert((parent, child))
    }

    pub fn unlink(&mut self, table: &str, parent: i64, child: i64) -> bool {
        self.links
            .get_mut(table)
            .map_or(false, |links| links.remove(&(parent, child)))
    }

    /// Children linked to `parent`, in ascending child id order.
    pub fn children(&self, table: &str, parent: i64) -> Vec<i64> {
        self.links
            .get(table)
            .into_iter()
            .flat_map(|links| links.iter())
            .filter(|(p, _)| *p == parent)
            .map(|(_, c)| *c)
            .collect()
    }

    /// Drops every link touching `id` on the given side.
    pub fn cascade(&mut self, table: &str, id: i64, parent_side: bool) {
        if let Some(links) = self.links.get_mut(table) {
            links.retain(|(p, c)| if parent_side { *p != id } else { *c != id });
        }
    }

    pub fn link_count(&self, table: &str) -> usize {
        self.links.get(table).map_or(0, BTreeSet::len)
    }
}

#[derive(Default)]
struct Shared {
    committed: Tables,
    handlers: Vec<(String, Handler)>,
    faults: Vec<String>,
    journal: Vec<String>,
}

impl Shared {
    fn handler_for(&mut self, statement: &Statement) -> Result<Handler, StoreError> {
        self.journal.push(statement.sql().to_string());
        if self.faults.iter().any(|f| statement.sql().starts_with(f.as_str())) {
            return Err(StoreError::Fault(format!(
                "injected failure: {}",
                statement.sql()
            )));
        }
        self.handlers
            .iter()
            .filter(|(prefix, _)| statement.sql().starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, handler)| Arc::clone(handler))
            .ok_or_else(|| StoreError::Fault(format!("no handler for: {}", statement.sql())))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, sql_prefix: &str, handler: F)
    where
        F: Fn(&Statement, &mut Tables) -> Result<Reply, StoreError> + Send + Sync + 'static,
    {
        self.lock()
            .handlers
            .push((sql_prefix.to_string(), Arc::new(handler)));
    }

    /// Every later statement starting with `sql_prefix` fails.
    pub fn fail_on(&self, sql_prefix: &str) {
        self.lock().faults.push(sql_prefix.to_string());
    }

    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Direct access to the committed tables for seeding and assertions.
    pub fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut self.lock().committed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn into_rows(reply: Reply) -> Result<Vec<Row>, StoreError> {
    match reply {
        Reply::Rows(rows) => Ok(rows),
        Reply::Exec(_) => Err(StoreError::Fault("statement returned no rows".into())),
    }
}

fn into_outcome(reply: Reply) -> Result<ExecOutcome, StoreError> {
    match reply {
        Reply::Exec(outcome) => Ok(outcome),
        Reply::Rows(rows) => Ok(ExecOutcome {
            rows_affected: rows.len() as u64,
            generated_id: None,
        }),
    }
}

pub struct MemoryConn {
    store: MemoryStore,
}

impl MemoryConn {
    fn dispatch(&mut self, statement: &Statement) -> Result<Reply, StoreError> {
        let mut shared = self.store.lock();
        let handler = shared.handler_for(statement)?;
        handler(statement, &mut shared.committed)
    }
}

#[async_trait]
impl Executor for MemoryConn {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        into_rows(self.dispatch(statement)?)
    }

    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, StoreError> {
        into_outcome(self.dispatch(statement)?)
    }
}

pub struct MemoryTx {
    store: MemoryStore,
    working: Tables,
    open: bool,
}

impl MemoryTx {
    fn dispatch(&mut self, statement: &Statement) -> Result<Reply, StoreError> {
        let handler = self.store.lock().handler_for(statement)?;
        handler(statement, &mut self.working)
    }
}

#[async_trait]
impl Executor for MemoryTx {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        into_rows(self.dispatch(statement)?)
    }

    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, StoreError> {
        into_outcome(self.dispatch(statement)?)
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(mut self) -> Result<(), StoreError> {
        self.open = false;
        let working = std::mem::take(&mut self.working);
        let mut shared = self.store.lock();
        shared.committed = working;
        shared.journal.push("COMMIT".into());
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.open = false;
        self.store.lock().journal.push("ROLLBACK".into());
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.open {
            self.store.lock().journal.push("ROLLBACK".into());
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Conn = MemoryConn;
    type Tx = MemoryTx;

    async fn acquire(&self) -> Result<MemoryConn, StoreError> {
        Ok(MemoryConn {
            store: self.clone(),
        })
    }

    async fn begin(&self, isolation: IsolationLevel) -> Result<MemoryTx, StoreError> {
        let mut shared = self.lock();
        shared
            .journal
            .push(format!("BEGIN ISOLATION LEVEL {}", isolation.as_sql()));
        Ok(MemoryTx {
            store: self.clone(),
            working: shared.committed.clone(),
            open: true,
        })
    }
}

/// Reads the positional parameter at `index` as an id.
pub fn param_id(statement: &Statement, index: usize) -> Result<i64, StoreError> {
    match statement.params().get(index) {
        Some(SqlValue::BigInt(v)) => Ok(*v),
        Some(SqlValue::Int(v)) => Ok(i64::from(*v)),
        other => Err(StoreError::Fault(format!(
            "expected id parameter at ${}, found {:?}",
            index + 1,
            other
        ))),
    }
}

pub fn param(statement: &Statement, index: usize) -> Result<SqlValue, StoreError> {
    statement
        .params()
        .get(index)
        .cloned()
        .ok_or_else(|| StoreError::Fault(format!("missing parameter ${}", index + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_counter() -> MemoryStore {
        let store = MemoryStore::new();
        store.on("INSERT INTO things", |statement, tables| {
            let id = tables.insert("things", Row::new().with("name", param(statement, 0)?));
            Ok(Reply::inserted(id))
        });
        store.on("SELECT COUNT", |_, tables| {
            Ok(Reply::Rows(vec![
                Row::new().with("count", tables.count("things") as i64)
            ]))
        });
        store
    }

    #[tokio::test]
    async fn test_rollback_discards_transaction_writes() {
        let store = store_with_counter();
        let mut tx = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
        tx.execute(&Statement::new("INSERT INTO things(name) VALUES($1)").bind("a"))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.with_tables(|t| t.count("things")), 0);
        assert_eq!(store.journal().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_commit_publishes_transaction_writes() {
        let store = store_with_counter();
        let mut tx = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
        tx.execute(&Statement::new("INSERT INTO things(name) VALUES($1)").bind("a"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut conn = store.acquire().await.unwrap();
        let rows = conn.fetch_all(&Statement::new("SELECT COUNT(*)")).await.unwrap();
        assert_eq!(rows[0].try_get::<i64>("count").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = store_with_counter();
        {
            let mut tx = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
            tx.execute(&Statement::new("INSERT INTO things(name) VALUES($1)").bind("a"))
                .await
                .unwrap();
        }
        assert_eq!(store.with_tables(|t| t.count("things")), 0);
        assert_eq!(store.journal().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_injected_fault_fails_statement() {
        let store = store_with_counter();
        store.fail_on("INSERT INTO things");
        let mut conn = store.acquire().await.unwrap();
        let result = conn
            .execute(&Statement::new("INSERT INTO things(name) VALUES($1)").bind("a"))
            .await;
        assert!(matches!(result, Err(StoreError::Fault(_))));
    }
}
