//! Collapses join fan-out back into aggregates.
//!
//! A one-to-many join repeats the parent columns once per child. Rows are
//! folded through a keyed accumulator: the first row seen for a key supplies
//! the parent scalars, every row (including the first) may contribute one
//! child. Parents keep first-appearance order and children keep row order.

use std::collections::HashMap;
use std::hash::Hash;

use crate::db::{Row, StoreError};

/// Describes how one flat joined row splits into parent and child parts.
pub trait AggregateMapper {
    type Key: Eq + Hash;
    type Parent;
    type Child;

    fn key(&self, row: &Row) -> Result<Self::Key, StoreError>;

    fn parent(&self, row: &Row) -> Result<Self::Parent, StoreError>;

    /// `None` when the child column group is NULL (outer join without a match).
    fn child(&self, row: &Row) -> Result<Option<Self::Child>, StoreError>;

    fn attach(parent: &mut Self::Parent, child: Self::Child);
}

pub fn reconstruct<M, I>(mapper: &M, rows: I) -> Result<Vec<M::Parent>, StoreError>
where
    M: AggregateMapper,
    I: IntoIterator<Item = Row>,
{
    let mut slots: HashMap<M::Key, usize> = HashMap::new();
    let mut parents: Vec<M::Parent> = Vec::new();

    for row in rows {
        let key = mapper.key(&row)?;
        let slot = match slots.get(&key) {
            Some(&slot) => slot,
            None => {
                parents.push(mapper.parent(&row)?);
                slots.insert(key, parents.len() - 1);
                parents.len() - 1
            }
        };
        if let Some(child) = mapper.child(&row)? {
            M::attach(&mut parents[slot], child);
        }
    }

    Ok(parents)
}

/// Single-aggregate variant. An empty row sequence yields `None`, never a
/// default aggregate.
pub fn reconstruct_one<M, I>(mapper: &M, rows: I) -> Result<Option<M::Parent>, StoreError>
where
    M: AggregateMapper,
    I: IntoIterator<Item = Row>,
{
    Ok(reconstruct(mapper, rows)?.into_iter().next())
}
