use crate::auth::{Principal, ROLE_MANAGER, ROLE_STAFF};
use crate::db::Store;
use crate::error::AppResult;
use crate::models::Category;
use crate::repositories::CategoryRepository;

use super::validation::Validator;

pub struct CategoryServiceImpl<S: Store> {
    categories: CategoryRepository<S>,
}

impl<S: Store> CategoryServiceImpl<S> {
    pub fn new(store: S) -> Self {
        Self {
            categories: CategoryRepository::new(store),
        }
    }

    pub async fn create_category(&self, principal: &Principal, name: &str) -> AppResult<Category> {
        principal.require(ROLE_STAFF)?;
        Validator::new().not_blank("name", name).finish()?;

        let category = self.categories.save(name.trim()).await?;
        tracing::info!("Category created by {}: id={}", principal.username, category.id);
        Ok(category)
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Category> {
        self.categories.find_by_id(id).await
    }

    pub async fn get_category_by_name(&self, name: &str) -> AppResult<Category> {
        self.categories.find_by_name(name).await
    }

    pub async fn list_product_categories(&self, product_id: i64) -> AppResult<Vec<Category>> {
        self.categories.find_by_product_id(product_id).await
    }

    pub async fn delete_category(&self, principal: &Principal, id: i64) -> AppResult<()> {
        principal.require(ROLE_MANAGER)?;
        self.categories.delete_by_id(id).await?;
        tracing::info!("Category deleted by {}: id={}", principal.username, id);
        Ok(())
    }
}
