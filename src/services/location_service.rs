use crate::auth::{Principal, ROLE_MANAGER, ROLE_STAFF};
use crate::db::Store;
use crate::error::AppResult;
use crate::models::Location;
use crate::repositories::LocationRepository;

use super::validation::Validator;

pub struct LocationServiceImpl<S: Store> {
    locations: LocationRepository<S>,
}

impl<S: Store> LocationServiceImpl<S> {
    pub fn new(store: S) -> Self {
        Self {
            locations: LocationRepository::new(store),
        }
    }

    pub async fn create_location(&self, principal: &Principal, name: &str) -> AppResult<Location> {
        principal.require(ROLE_STAFF)?;
        Validator::new().not_blank("name", name).finish()?;

        let location = self.locations.save(name.trim()).await?;
        tracing::info!("Location created by {}: id={}", principal.username, location.id);
        Ok(location)
    }

    pub async fn get_location(&self, id: i64) -> AppResult<Location> {
        self.locations.find_by_id(id).await
    }

    pub async fn get_location_by_name(&self, name: &str) -> AppResult<Location> {
        self.locations.find_by_name(name).await
    }

    pub async fn delete_location(&self, principal: &Principal, id: i64) -> AppResult<()> {
        principal.require(ROLE_MANAGER)?;
        self.locations.delete_by_id(id).await?;
        tracing::info!("Location deleted by {}: id={}", principal.username, id);
        Ok(())
    }
}
