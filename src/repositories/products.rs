use std::collections::BTreeSet;

use crate::db::{Executor, Row, Statement, Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::{Category, NewProduct, Page, Product, ProductPatch};
use crate::relational::association::PRODUCT_CATEGORIES;
use crate::relational::{
    reconstruct, reconstruct_one, synchronize, AggregateMapper, ExistenceGuard, PartialUpdate,
    UnitOfWork,
};

use super::{delete_by_id, exists_by, id_key, update_row};

pub(crate) const INSERT: &str = "INSERT INTO products(name, description, price, created_at) \
     VALUES($1, $2, $3, NOW()) RETURNING id";

pub(crate) const FIND_BY_ID: &str = "SELECT p.id AS product_id, p.name, p.description, p.price, \
     p.created_at, c.id AS category_id, c.name AS category_name \
     FROM products p \
     LEFT JOIN products_categories pc ON pc.product_id = p.id \
     LEFT JOIN categories c ON c.id = pc.category_id \
     WHERE p.id = $1 ORDER BY c.id";

pub(crate) const FIND_PAGE: &str = "SELECT p.id AS product_id, p.name, p.description, p.price, \
     p.created_at, c.id AS category_id, c.name AS category_name \
     FROM (SELECT * FROM products ORDER BY id LIMIT $1 OFFSET $2) p \
     LEFT JOIN products_categories pc ON pc.product_id = p.id \
     LEFT JOIN categories c ON c.id = pc.category_id \
     ORDER BY p.id, c.id";

/// One row per (product, category); a product without categories comes back
/// once with NULL category columns.
struct ProductRows;

impl AggregateMapper for ProductRows {
    type Key = i64;
    type Parent = Product;
    type Child = Category;

    fn key(&self, row: &Row) -> Result<i64, StoreError> {
        row.try_get("product_id")
    }

    fn parent(&self, row: &Row) -> Result<Product, StoreError> {
        Ok(Product {
            id: row.try_get("product_id")?,
            name: row.try_get("name")?,
            description: row.try_get::<Option<String>>("description")?.unwrap_or_default(),
            price: row.try_get("price")?,
            categories: Vec::new(),
            created_at: row.try_get("created_at")?,
        })
    }

    fn child(&self, row: &Row) -> Result<Option<Category>, StoreError> {
        if row.is_null("category_id") {
            return Ok(None);
        }
        Ok(Some(Category {
            id: row.try_get("category_id")?,
            name: row.try_get("category_name")?,
        }))
    }

    fn attach(parent: &mut Product, child: Category) {
        parent.categories.push(child);
    }
}

async fn load<E: Executor>(executor: &mut E, id: i64) -> AppResult<Option<Product>> {
    let rows = executor
        .fetch_all(&Statement::new(FIND_BY_ID).bind(id))
        .await?;
    Ok(reconstruct_one(&ProductRows, rows)?)
}

fn category_guard(guard: ExistenceGuard, ids: &BTreeSet<i64>) -> ExistenceGuard {
    ids.iter()
        .fold(guard, |guard, &id| guard.require_id("Category", "categories", id))
}

#[derive(Clone)]
pub struct ProductRepository<S: Store> {
    store: S,
}

impl<S: Store> ProductRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn exists_by_id(&self, id: i64) -> AppResult<bool> {
        exists_by(&self.store, "products", "id", id).await
    }

    /// Inserts the product and one link per distinct category atomically and
    /// returns the aggregate as stored.
    pub async fn save(&self, product: &NewProduct) -> AppResult<Product> {
        let category_ids: BTreeSet<i64> = product.categories.iter().map(|c| c.id).collect();

        let mut unit = UnitOfWork::new(&self.store, "product.save")
            .guard(&category_guard(ExistenceGuard::new(), &category_ids))
            .await?
            .begin()
            .await?;

        let result: AppResult<Product> = async {
            let insert = Statement::new(INSERT)
                .bind(&product.name)
                .bind(&product.description)
                .bind(product.price)
                .returning_id();
            let id = unit.insert("product", &insert).await?;

            for &category_id in &category_ids {
                unit.write("product category", &PRODUCT_CATEGORIES.insert(id, category_id))
                    .await?;
            }

            load(unit.executor(), id).await?.ok_or_else(|| {
                AppError::IllegalState(format!("Product {} not readable after insert", id))
            })
        }
        .await;

        let saved = unit.finish(result).await?;
        tracing::info!("Product saved: id={} categories={}", saved.id, saved.categories.len());
        Ok(saved)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Product> {
        let mut conn = self.store.acquire().await?;
        load(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", id_key(id)))
    }

    pub async fn find_all(&self, page: Page) -> AppResult<Vec<Product>> {
        let mut conn = self.store.acquire().await?;
        let rows = conn
            .fetch_all(&Statement::new(FIND_PAGE).bind(page.limit).bind(page.offset))
            .await?;
        Ok(reconstruct(&ProductRows, rows)?)
    }

    /// Applies the present scalar fields and, when a category set is given,
    /// reconciles the links towards it. Both happen in one transaction.
    pub async fn update(&self, id: i64, patch: &ProductPatch) -> AppResult<Product> {
        if patch.is_empty() {
            return Err(AppError::InvalidArgument(
                "No field to update on products".to_string(),
            ));
        }

        let changes = PartialUpdate::new("products", "id")
            .set_if_present("name", patch.name.as_deref())
            .set_if_present("description", patch.description.as_deref())
            .set_if_present("price", patch.price);

        let mut guard = ExistenceGuard::new().require_id("Product", "products", id);
        if let Some(ids) = &patch.category_ids {
            guard = category_guard(guard, ids);
        }

        let mut unit = UnitOfWork::new(&self.store, "product.update")
            .guard(&guard)
            .await?
            .begin()
            .await?;

        let result: AppResult<Product> = async {
            if !changes.is_empty() {
                update_row(unit.executor(), "Product", &changes.build(id)?, id).await?;
            }
            if let Some(ids) = &patch.category_ids {
                synchronize(unit.executor(), &PRODUCT_CATEGORIES, id, ids).await?;
            }
            load(unit.executor(), id)
                .await?
                .ok_or_else(|| AppError::not_found("Product", id_key(id)))
        }
        .await;

        let updated = unit.finish(result).await?;
        tracing::info!("Product updated: id={} fields={:?}", id, changes.columns());
        Ok(updated)
    }

    pub async fn delete_by_id(&self, id: i64) -> AppResult<u64> {
        delete_by_id(&self.store, "Product", "products", id).await
    }
}
