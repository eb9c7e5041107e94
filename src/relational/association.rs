//! Many-to-many link reconciliation.
//!
//! Moves a parent's link set from its current state to a desired state with
//! one delete per removed child and one insert per added child. Children in
//! both sets are left alone, so an unchanged set issues no writes at all.

use std::collections::BTreeSet;

use crate::db::{Executor, Statement, StoreError};
use crate::error::{AppError, AppResult};

/// A `(parent_id, child_id)` link table with no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    pub table: &'static str,
    pub parent_column: &'static str,
    pub child_column: &'static str,
}

pub const PRODUCT_CATEGORIES: LinkTable = LinkTable {
    table: "products_categories",
    parent_column: "product_id",
    child_column: "category_id",
};

pub const USER_ROLES: LinkTable = LinkTable {
    table: "users_roles",
    parent_column: "user_id",
    child_column: "role_id",
};

pub const ROLE_PRIVILEGES: LinkTable = LinkTable {
    table: "roles_privileges",
    parent_column: "role_id",
    child_column: "privilege_id",
};

impl LinkTable {
    pub fn select_children_sql(&self) -> String {
        format!(
            "SELECT {} AS child_id FROM {} WHERE {} = $1",
            self.child_column, self.table, self.parent_column
        )
    }

    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {}({}, {}) VALUES($1, $2)",
            self.table, self.parent_column, self.child_column
        )
    }

    pub fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            self.table, self.parent_column, self.child_column
        )
    }

    pub fn insert(&self, parent: i64, child: i64) -> Statement {
        Statement::new(self.insert_sql()).bind(parent).bind(child)
    }

    pub fn delete(&self, parent: i64, child: i64) -> Statement {
        Statement::new(self.delete_sql()).bind(parent).bind(child)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    Remove { parent: i64, child: i64 },
    Add { parent: i64, child: i64 },
}

impl LinkOp {
    pub fn statement(&self, link: &LinkTable) -> Statement {
        match *self {
            LinkOp::Remove { parent, child } => link.delete(parent, child),
            LinkOp::Add { parent, child } => link.insert(parent, child),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationDiff {
    pub to_remove: BTreeSet<i64>,
    pub to_add: BTreeSet<i64>,
}

impl AssociationDiff {
    pub fn between(current: &BTreeSet<i64>, desired: &BTreeSet<i64>) -> Self {
        Self {
            to_remove: current.difference(desired).copied().collect(),
            to_add: desired.difference(current).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Removals first, then additions, each in ascending child id order.
    pub fn operations(&self, parent: i64) -> Vec<LinkOp> {
        self.to_remove
            .iter()
            .map(|&child| LinkOp::Remove { parent, child })
            .chain(self.to_add.iter().map(|&child| LinkOp::Add { parent, child }))
            .collect()
    }
}

pub async fn current_children<E: Executor>(
    executor: &mut E,
    link: &LinkTable,
    parent: i64,
) -> Result<BTreeSet<i64>, StoreError> {
    let statement = Statement::new(link.select_children_sql()).bind(parent);
    executor
        .fetch_all(&statement)
        .await?
        .iter()
        .map(|row| row.try_get::<i64>("child_id"))
        .collect()
}

/// Reads the current link set and applies the minimal diff towards `desired`.
///
/// Each emitted statement must touch exactly one row; anything else means the
/// link table changed underneath us and surfaces as `IllegalState`.
pub async fn synchronize<E: Executor>(
    executor: &mut E,
    link: &LinkTable,
    parent: i64,
    desired: &BTreeSet<i64>,
) -> AppResult<AssociationDiff> {
    let current = current_children(executor, link, parent).await?;
    let diff = AssociationDiff::between(&current, desired);

    for op in diff.operations(parent) {
        let outcome = executor.execute(&op.statement(link)).await?;
        if outcome.rows_affected == 0 {
            return Err(AppError::IllegalState(format!(
                "link {:?} on {} affected no rows",
                op, link.table
            )));
        }
    }

    if !diff.is_empty() {
        tracing::debug!(
            "{} parent={} removed={:?} added={:?}",
            link.table,
            parent,
            diff.to_remove,
            diff.to_add
        );
    }
    Ok(diff)
}
