//! Atomic boundary around multi-statement writes.
//!
//! A unit moves `Pending -> Guarded -> Writing -> Committed | RolledBack`.
//! Guards run on an autocommit connection before the transaction opens; all
//! writes then share one READ COMMITTED transaction that either commits as a
//! whole or is rolled back with the originating error surfaced.

use crate::db::{Executor, IsolationLevel, Statement, Store, Transaction};
use crate::error::{AppError, AppResult};

use super::ExistenceGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Guarded,
    Writing,
    Committed,
    RolledBack,
}

pub struct UnitOfWork<'s, S: Store> {
    store: &'s S,
    label: &'static str,
}

impl<'s, S: Store> UnitOfWork<'s, S> {
    pub fn new(store: &'s S, label: &'static str) -> Self {
        Self { store, label }
    }

    pub fn state(&self) -> UnitState {
        UnitState::Pending
    }

    /// The only way out of `Pending`. Units with nothing to check pass an
    /// empty guard.
    pub async fn guard(self, guard: &ExistenceGuard) -> AppResult<GuardedUnit<'s, S>> {
        if !guard.is_empty() {
            let mut conn = self.store.acquire().await?;
            if let Err(e) = guard.verify(&mut conn).await {
                tracing::debug!("{}: {:?} -> RolledBack ({})", self.label, UnitState::Pending, e);
                return Err(e);
            }
        }
        tracing::debug!("{}: {:?} -> {:?}", self.label, UnitState::Pending, UnitState::Guarded);
        Ok(GuardedUnit {
            store: self.store,
            label: self.label,
        })
    }
}

/// Preconditions hold; no transaction is open yet.
pub struct GuardedUnit<'s, S: Store> {
    store: &'s S,
    label: &'static str,
}

impl<'s, S: Store> GuardedUnit<'s, S> {
    pub fn state(&self) -> UnitState {
        UnitState::Guarded
    }

    pub async fn begin(self) -> AppResult<ActiveUnit<S::Tx>> {
        let tx = self.store.begin(IsolationLevel::ReadCommitted).await?;
        tracing::debug!("{}: {:?} -> {:?}", self.label, UnitState::Guarded, UnitState::Writing);
        Ok(ActiveUnit {
            tx,
            label: self.label,
        })
    }
}

/// The `Writing` phase: an open transaction.
pub struct ActiveUnit<T: Transaction> {
    tx: T,
    label: &'static str,
}

impl<T: Transaction> ActiveUnit<T> {
    pub fn executor(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Primary insert. Zero affected rows is an `IllegalState`, and no
    /// dependent write should follow.
    pub async fn insert(&mut self, entity: &'static str, statement: &Statement) -> AppResult<i64> {
        let outcome = self.tx.execute(statement).await?;
        if outcome.rows_affected == 0 {
            return Err(AppError::IllegalState(format!(
                "Failed to insert {} into database",
                entity
            )));
        }
        outcome.generated_id.ok_or_else(|| {
            AppError::IllegalState(format!("Insert of {} returned no generated id", entity))
        })
    }

    /// Dependent write that must affect at least one row.
    pub async fn write(&mut self, entity: &'static str, statement: &Statement) -> AppResult<u64> {
        let outcome = self.tx.execute(statement).await?;
        if outcome.rows_affected == 0 {
            return Err(AppError::IllegalState(format!(
                "Failed to write {} to database",
                entity
            )));
        }
        Ok(outcome.rows_affected)
    }

    /// Commits on `Ok`, rolls back on `Err` and hands the original error back.
    pub async fn finish<R>(self, result: AppResult<R>) -> AppResult<R> {
        match result {
            Ok(value) => {
                self.tx.commit().await?;
                tracing::debug!("{}: Writing -> {:?}", self.label, UnitState::Committed);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("{}: Writing -> {:?}: {}", self.label, UnitState::RolledBack, e);
                if let Err(rollback_err) = self.tx.rollback().await {
                    tracing::error!("{}: rollback failed: {}", self.label, rollback_err);
                }
                Err(e)
            }
        }
    }
}
