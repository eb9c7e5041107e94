use crate::db::{Executor, Row, Statement, Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::Location;
use crate::relational::{ExistenceGuard, UnitOfWork};

use super::{delete_by_id, exists_by, id_key};

pub(crate) const INSERT: &str = "INSERT INTO locations(name) VALUES($1) RETURNING id";
pub(crate) const FIND_BY_ID: &str = "SELECT id, name FROM locations WHERE id = $1";
pub(crate) const FIND_BY_NAME: &str = "SELECT id, name FROM locations WHERE name = $1";

fn from_row(row: &Row) -> Result<Location, StoreError> {
    Ok(Location {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

#[derive(Clone)]
pub struct LocationRepository<S: Store> {
    store: S,
}

impl<S: Store> LocationRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn exists_by_id(&self, id: i64) -> AppResult<bool> {
        exists_by(&self.store, "locations", "id", id).await
    }

    pub async fn exists_by_name(&self, name: &str) -> AppResult<bool> {
        exists_by(&self.store, "locations", "name", name).await
    }

    /// `AlreadyExists` when the name is taken.
    pub async fn save(&self, name: &str) -> AppResult<Location> {
        let guard = ExistenceGuard::new().reject("Location", "locations", "name", name);
        let mut unit = UnitOfWork::new(&self.store, "location.save")
            .guard(&guard)
            .await?
            .begin()
            .await?;
        let result = unit
            .insert("location", &Statement::new(INSERT).bind(name).returning_id())
            .await;
        let id = unit.finish(result).await?;
        tracing::info!("Location saved: id={} name={}", id, name);
        Ok(Location {
            id,
            name: name.to_string(),
        })
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Location> {
        let mut conn = self.store.acquire().await?;
        let row = conn
            .fetch_optional(&Statement::new(FIND_BY_ID).bind(id))
            .await?
            .ok_or_else(|| AppError::not_found("Location", id_key(id)))?;
        Ok(from_row(&row)?)
    }

    pub async fn find_by_name(&self, name: &str) -> AppResult<Location> {
        let mut conn = self.store.acquire().await?;
        let row = conn
            .fetch_optional(&Statement::new(FIND_BY_NAME).bind(name))
            .await?
            .ok_or_else(|| AppError::not_found("Location", format!("name: {}", name)))?;
        Ok(from_row(&row)?)
    }

    /// Stock records at the location are removed by the schema cascade.
    pub async fn delete_by_id(&self, id: i64) -> AppResult<u64> {
        delete_by_id(&self.store, "Location", "locations", id).await
    }
}
