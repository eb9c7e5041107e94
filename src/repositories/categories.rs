use crate::db::{Executor, Row, Statement, Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::Category;
use crate::relational::{ExistenceGuard, UnitOfWork};

use super::{delete_by_id, exists_by, id_key};

pub(crate) const INSERT: &str = "INSERT INTO categories(name) VALUES($1) RETURNING id";
pub(crate) const FIND_BY_ID: &str = "SELECT id, name FROM categories WHERE id = $1";
pub(crate) const FIND_BY_NAME: &str = "SELECT id, name FROM categories WHERE name = $1";
pub(crate) const FIND_BY_PRODUCT: &str = "SELECT c.id, c.name FROM categories c \
     JOIN products_categories pc ON pc.category_id = c.id \
     WHERE pc.product_id = $1 ORDER BY c.id";

fn from_row(row: &Row) -> Result<Category, StoreError> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

#[derive(Clone)]
pub struct CategoryRepository<S: Store> {
    store: S,
}

impl<S: Store> CategoryRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn exists_by_id(&self, id: i64) -> AppResult<bool> {
        exists_by(&self.store, "categories", "id", id).await
    }

    pub async fn exists_by_name(&self, name: &str) -> AppResult<bool> {
        exists_by(&self.store, "categories", "name", name).await
    }

    /// `AlreadyExists` when the name is taken.
    pub async fn save(&self, name: &str) -> AppResult<Category> {
        let guard = ExistenceGuard::new().reject("Category", "categories", "name", name);
        let mut unit = UnitOfWork::new(&self.store, "category.save")
            .guard(&guard)
            .await?
            .begin()
            .await?;
        let result = unit
            .insert("category", &Statement::new(INSERT).bind(name).returning_id())
            .await;
        let id = unit.finish(result).await?;
        tracing::info!("Category saved: id={} name={}", id, name);
        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Category> {
        let mut conn = self.store.acquire().await?;
        let row = conn
            .fetch_optional(&Statement::new(FIND_BY_ID).bind(id))
            .await?
            .ok_or_else(|| AppError::not_found("Category", id_key(id)))?;
        Ok(from_row(&row)?)
    }

    pub async fn find_by_name(&self, name: &str) -> AppResult<Category> {
        let mut conn = self.store.acquire().await?;
        let row = conn
            .fetch_optional(&Statement::new(FIND_BY_NAME).bind(name))
            .await?
            .ok_or_else(|| AppError::not_found("Category", format!("name: {}", name)))?;
        Ok(from_row(&row)?)
    }

    pub async fn find_by_product_id(&self, product_id: i64) -> AppResult<Vec<Category>> {
        let mut conn = self.store.acquire().await?;
        let rows = conn
            .fetch_all(&Statement::new(FIND_BY_PRODUCT).bind(product_id))
            .await?;
        Ok(rows.iter().map(from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Links to products are removed by the schema cascade.
    pub async fn delete_by_id(&self, id: i64) -> AppResult<u64> {
        delete_by_id(&self.store, "Category", "categories", id).await
    }
}
