use crate::auth::{Principal, ROLE_MANAGER, ROLE_STAFF};
use crate::db::Store;
use crate::error::AppResult;
use crate::models::{Inventory, InventoryPatch, NewInventory};
use crate::repositories::InventoryRepository;

use super::validation::Validator;

pub struct InventoryServiceImpl<S: Store> {
    inventory: InventoryRepository<S>,
}

impl<S: Store> InventoryServiceImpl<S> {
    pub fn new(store: S) -> Self {
        Self {
            inventory: InventoryRepository::new(store),
        }
    }

    pub async fn create_inventory(
        &self,
        principal: &Principal,
        req: NewInventory,
    ) -> AppResult<Inventory> {
        principal.require(ROLE_STAFF)?;
        Validator::new()
            .positive_id("product_id", req.product_id)
            .positive_id("location_id", req.location_id)
            .non_negative("quantity", req.quantity)
            .finish()?;

        let inventory = self.inventory.save(&req).await?;
        tracing::info!("Inventory created by {}: id={}", principal.username, inventory.id);
        Ok(inventory)
    }

    pub async fn get_inventory(&self, id: i64) -> AppResult<Inventory> {
        self.inventory.find_by_id(id).await
    }

    pub async fn update_inventory(
        &self,
        principal: &Principal,
        id: i64,
        patch: InventoryPatch,
    ) -> AppResult<Inventory> {
        principal.require(ROLE_STAFF)?;
        let mut validator = Validator::new();
        if let Some(product_id) = patch.product_id {
            validator.positive_id("product_id", product_id);
        }
        if let Some(location_id) = patch.location_id {
            validator.positive_id("location_id", location_id);
        }
        if let Some(quantity) = patch.quantity {
            validator.non_negative("quantity", quantity);
        }
        validator.finish()?;

        let inventory = self.inventory.update(id, &patch).await?;
        tracing::info!("Inventory updated by {}: id={}", principal.username, id);
        Ok(inventory)
    }

    pub async fn delete_inventory(&self, principal: &Principal, id: i64) -> AppResult<()> {
        principal.require(ROLE_MANAGER)?;
        self.inventory.delete_by_id(id).await?;
        tracing::info!("Inventory deleted by {}: id={}", principal.username, id);
        Ok(())
    }
}
