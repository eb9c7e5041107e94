use crate::auth::{Principal, ROLE_MANAGER, ROLE_STAFF};
use crate::db::Store;
use crate::error::AppResult;
use crate::models::{NewSupplier, Page, Supplier, SupplierPatch};
use crate::repositories::SupplierRepository;

use super::validation::Validator;

const MIN_NAME_LEN: usize = 2;

pub struct SupplierServiceImpl<S: Store> {
    suppliers: SupplierRepository<S>,
}

impl<S: Store> SupplierServiceImpl<S> {
    pub fn new(store: S) -> Self {
        Self {
            suppliers: SupplierRepository::new(store),
        }
    }

    pub async fn create_supplier(
        &self,
        principal: &Principal,
        req: NewSupplier,
    ) -> AppResult<Supplier> {
        principal.require(ROLE_STAFF)?;
        Validator::new()
            .not_blank("name", &req.name)
            .min_len("name", req.name.trim(), MIN_NAME_LEN)
            .not_blank("contact_name", &req.contact_name)
            .phone("phone", &req.phone)
            .email("email", &req.email)
            .not_blank("address", &req.address)
            .finish()?;

        let supplier = self.suppliers.save(&req).await?;
        tracing::info!("Supplier created by {}: id={}", principal.username, supplier.id);
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: i64) -> AppResult<Supplier> {
        self.suppliers.find_by_id(id).await
    }

    pub async fn list_suppliers(&self, page: Page) -> AppResult<Vec<Supplier>> {
        self.suppliers.find_all(page).await
    }

    pub async fn update_supplier(
        &self,
        principal: &Principal,
        id: i64,
        patch: SupplierPatch,
    ) -> AppResult<Supplier> {
        principal.require(ROLE_STAFF)?;
        let mut validator = Validator::new();
        if let Some(name) = &patch.name {
            validator.min_len("name", name.trim(), MIN_NAME_LEN);
        }
        if let Some(contact_name) = &patch.contact_name {
            validator.not_blank("contact_name", contact_name);
        }
        if let Some(phone) = &patch.phone {
            validator.phone("phone", phone);
        }
        if let Some(email) = &patch.email {
            validator.email("email", email);
        }
        if let Some(address) = &patch.address {
            validator.not_blank("address", address);
        }
        validator.finish()?;

        let supplier = self.suppliers.update(id, &patch).await?;
        tracing::info!("Supplier updated by {}: id={}", principal.username, id);
        Ok(supplier)
    }

    pub async fn delete_supplier(&self, principal: &Principal, id: i64) -> AppResult<()> {
        principal.require(ROLE_MANAGER)?;
        self.suppliers.delete_by_id(id).await?;
        tracing::info!("Supplier deleted by {}: id={}", principal.username, id);
        Ok(())
    }
}
