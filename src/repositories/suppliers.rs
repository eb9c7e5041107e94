use crate::db::{Executor, Row, Statement, Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::{NewSupplier, Page, Supplier, SupplierPatch};
use crate::relational::{ExistenceGuard, PartialUpdate, UnitOfWork};

use super::{delete_by_id, exists_by, id_key, update_row};

pub(crate) const INSERT: &str = "INSERT INTO suppliers(name, contact_name, phone, email, address, created_at) \
     VALUES($1, $2, $3, $4, $5, NOW()) RETURNING id";
pub(crate) const FIND_BY_ID: &str = "SELECT id, name, contact_name, phone, email, address, \
     created_at, updated_at FROM suppliers WHERE id = $1";
pub(crate) const FIND_PAGE: &str = "SELECT id, name, contact_name, phone, email, address, \
     created_at, updated_at FROM suppliers ORDER BY id LIMIT $1 OFFSET $2";

fn from_row(row: &Row) -> Result<Supplier, StoreError> {
    Ok(Supplier {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        contact_name: row.try_get("contact_name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn load<E: Executor>(executor: &mut E, id: i64) -> AppResult<Option<Supplier>> {
    let row = executor
        .fetch_optional(&Statement::new(FIND_BY_ID).bind(id))
        .await?;
    Ok(row.as_ref().map(from_row).transpose()?)
}

#[derive(Clone)]
pub struct SupplierRepository<S: Store> {
    store: S,
}

impl<S: Store> SupplierRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn exists_by_id(&self, id: i64) -> AppResult<bool> {
        exists_by(&self.store, "suppliers", "id", id).await
    }

    pub async fn save(&self, supplier: &NewSupplier) -> AppResult<Supplier> {
        let mut unit = UnitOfWork::new(&self.store, "supplier.save")
            .guard(&ExistenceGuard::new())
            .await?
            .begin()
            .await?;
        let result: AppResult<Supplier> = async {
            let insert = Statement::new(INSERT)
                .bind(&supplier.name)
                .bind(&supplier.contact_name)
                .bind(&supplier.phone)
                .bind(&supplier.email)
                .bind(&supplier.address)
                .returning_id();
            let id = unit.insert("supplier", &insert).await?;
            load(unit.executor(), id).await?.ok_or_else(|| {
                AppError::IllegalState(format!("Supplier {} not readable after insert", id))
            })
        }
        .await;

        let saved = unit.finish(result).await?;
        tracing::info!("Supplier saved: id={} name={}", saved.id, saved.name);
        Ok(saved)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Supplier> {
        let mut conn = self.store.acquire().await?;
        load(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Supplier", id_key(id)))
    }

    pub async fn find_all(&self, page: Page) -> AppResult<Vec<Supplier>> {
        let mut conn = self.store.acquire().await?;
        let rows = conn
            .fetch_all(&Statement::new(FIND_PAGE).bind(page.limit).bind(page.offset))
            .await?;
        Ok(rows.iter().map(from_row).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn update(&self, id: i64, patch: &SupplierPatch) -> AppResult<Supplier> {
        let changes = PartialUpdate::new("suppliers", "id")
            .set_if_present("name", patch.name.as_deref())
            .set_if_present("contact_name", patch.contact_name.as_deref())
            .set_if_present("phone", patch.phone.as_deref())
            .set_if_present("email", patch.email.as_deref())
            .set_if_present("address", patch.address.as_deref())
            .touch("updated_at");
        let statement = changes.build(id)?;

        let mut unit = UnitOfWork::new(&self.store, "supplier.update")
            .guard(&ExistenceGuard::new().require_id("Supplier", "suppliers", id))
            .await?
            .begin()
            .await?;

        let result: AppResult<Supplier> = async {
            update_row(unit.executor(), "Supplier", &statement, id).await?;
            load(unit.executor(), id)
                .await?
                .ok_or_else(|| AppError::not_found("Supplier", id_key(id)))
        }
        .await;

        let updated = unit.finish(result).await?;
        tracing::info!("Supplier updated: id={} fields={:?}", id, changes.columns());
        Ok(updated)
    }

    pub async fn delete_by_id(&self, id: i64) -> AppResult<u64> {
        delete_by_id(&self.store, "Supplier", "suppliers", id).await
    }
}
