use crate::db::{Executor, Row, Statement, Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::{Inventory, InventoryPatch, Location, NewInventory, ProductSummary};
use crate::relational::{ExistenceGuard, PartialUpdate, UnitOfWork};

use super::{delete_by_id, exists_by, id_key, update_row};

pub(crate) const INSERT: &str = "INSERT INTO inventory(product_id, location_id, quantity, updated_at) \
     VALUES($1, $2, $3, NOW()) RETURNING id";

pub(crate) const FIND_BY_ID: &str = "SELECT i.id, i.quantity, i.updated_at, \
     p.id AS product_id, p.name AS product_name, p.price AS product_price, \
     p.created_at AS product_created_at, l.id AS location_id, l.name AS location_name \
     FROM inventory i \
     JOIN products p ON p.id = i.product_id \
     JOIN locations l ON l.id = i.location_id \
     WHERE i.id = $1";

fn from_row(row: &Row) -> Result<Inventory, StoreError> {
    Ok(Inventory {
        id: row.try_get("id")?,
        product: ProductSummary {
            id: row.try_get("product_id")?,
            name: row.try_get("product_name")?,
            price: row.try_get("product_price")?,
            created_at: row.try_get("product_created_at")?,
        },
        location: Location {
            id: row.try_get("location_id")?,
            name: row.try_get("location_name")?,
        },
        quantity: row.try_get("quantity")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn load<E: Executor>(executor: &mut E, id: i64) -> AppResult<Option<Inventory>> {
    let row = executor
        .fetch_optional(&Statement::new(FIND_BY_ID).bind(id))
        .await?;
    Ok(row.as_ref().map(from_row).transpose()?)
}

/// Stock records. Several records for the same product and location are
/// allowed; nothing here merges them.
#[derive(Clone)]
pub struct InventoryRepository<S: Store> {
    store: S,
}

impl<S: Store> InventoryRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn exists_by_id(&self, id: i64) -> AppResult<bool> {
        exists_by(&self.store, "inventory", "id", id).await
    }

    pub async fn save(&self, inventory: &NewInventory) -> AppResult<Inventory> {
        let guard = ExistenceGuard::new()
            .require_id("Product", "products", inventory.product_id)
            .require_id("Location", "locations", inventory.location_id);

        let mut unit = UnitOfWork::new(&self.store, "inventory.save")
            .guard(&guard)
            .await?
            .begin()
            .await?;

        let result: AppResult<Inventory> = async {
            let insert = Statement::new(INSERT)
                .bind(inventory.product_id)
                .bind(inventory.location_id)
                .bind(inventory.quantity)
                .returning_id();
            let id = unit.insert("inventory", &insert).await?;
            load(unit.executor(), id).await?.ok_or_else(|| {
                AppError::IllegalState(format!("Inventory {} not readable after insert", id))
            })
        }
        .await;

        let saved = unit.finish(result).await?;
        tracing::info!(
            "Inventory saved: id={} product={} location={} quantity={}",
            saved.id,
            saved.product.id,
            saved.location.id,
            saved.quantity
        );
        Ok(saved)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Inventory> {
        let mut conn = self.store.acquire().await?;
        load(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory", id_key(id)))
    }

    /// Re-points or re-counts a stock record. Every referenced id present in
    /// the patch is guarded, and `updated_at` is stamped on each update.
    pub async fn update(&self, id: i64, patch: &InventoryPatch) -> AppResult<Inventory> {
        let changes = PartialUpdate::new("inventory", "id")
            .set_if_present("product_id", patch.product_id)
            .set_if_present("location_id", patch.location_id)
            .set_if_present("quantity", patch.quantity)
            .touch("updated_at");
        let statement = changes.build(id)?;

        let mut guard = ExistenceGuard::new().require_id("Inventory", "inventory", id);
        if let Some(product_id) = patch.product_id {
            guard = guard.require_id("Product", "products", product_id);
        }
        if let Some(location_id) = patch.location_id {
            guard = guard.require_id("Location", "locations", location_id);
        }

        let mut unit = UnitOfWork::new(&self.store, "inventory.update")
            .guard(&guard)
            .await?
            .begin()
            .await?;

        let result: AppResult<Inventory> = async {
            update_row(unit.executor(), "Inventory", &statement, id).await?;
            load(unit.executor(), id)
                .await?
                .ok_or_else(|| AppError::not_found("Inventory", id_key(id)))
        }
        .await;

        let updated = unit.finish(result).await?;
        tracing::info!("Inventory updated: id={} fields={:?}", id, changes.columns());
        Ok(updated)
    }

    pub async fn delete_by_id(&self, id: i64) -> AppResult<u64> {
        delete_by_id(&self.store, "Inventory", "inventory", id).await
    }
}
