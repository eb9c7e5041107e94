use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::auth::{Principal, ROLE_MANAGER, ROLE_STAFF};
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{Category, NewProduct, Page, Product, ProductPatch};
use crate::repositories::{CategoryRepository, ProductRepository};

use super::validation::Validator;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateProductReq {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// Category names, resolved to ids before insert.
    pub categories: Vec<String>,
}

/// `None` leaves a field alone. `categories: Some(vec![])` clears all links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateProductReq {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub categories: Option<Vec<String>>,
}

pub struct ProductServiceImpl<S: Store> {
    products: ProductRepository<S>,
    categories: CategoryRepository<S>,
}

impl<S: Store> ProductServiceImpl<S> {
    pub fn new(store: S) -> Self {
        Self {
            products: ProductRepository::new(store.clone()),
            categories: CategoryRepository::new(store),
        }
    }

    async fn resolve_categories(&self, names: &[String]) -> AppResult<Vec<Category>> {
        let mut categories = Vec::with_capacity(names.len());
        for name in names {
            categories.push(self.categories.find_by_name(name.trim()).await?);
        }
        Ok(categories)
    }

    pub async fn create_product(
        &self,
        principal: &Principal,
        req: CreateProductReq,
    ) -> AppResult<Product> {
        principal.require(ROLE_STAFF)?;
        Validator::new()
            .not_blank("name", &req.name)
            .non_negative_decimal("price", req.price)
            .finish()?;

        let categories = self.resolve_categories(&req.categories).await?;
        let product = self
            .products
            .save(&NewProduct {
                name: req.name.trim().to_string(),
                description: req.description,
                price: req.price,
                categories,
            })
            .await?;

        tracing::info!("Product created by {}: id={}", principal.username, product.id);
        Ok(product)
    }

    pub async fn get_product(&self, id: i64) -> AppResult<Product> {
        self.products.find_by_id(id).await
    }

    pub async fn list_products(&self, page: Page) -> AppResult<Vec<Product>> {
        self.products.find_all(page).await
    }

    pub async fn update_product(
        &self,
        principal: &Principal,
        id: i64,
        req: UpdateProductReq,
    ) -> AppResult<Product> {
        principal.require(ROLE_STAFF)?;
        let mut validator = Validator::new();
        if let Some(name) = &req.name {
            validator.not_blank("name", name);
        }
        if let Some(price) = req.price {
            validator.non_negative_decimal("price", price);
        }
        validator.finish()?;

        if !self.products.exists_by_id(id).await? {
            return Err(AppError::not_found("Product", format!("id: {}", id)));
        }
        let category_ids = match &req.categories {
            Some(names) => Some(
                self.resolve_categories(names)
                    .await?
                    .into_iter()
                    .map(|c| c.id)
                    .collect::<BTreeSet<i64>>(),
            ),
            None => None,
        };

        let patch = ProductPatch {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
            price: req.price,
            category_ids,
        };
        let product = self.products.update(id, &patch).await?;

        tracing::info!("Product updated by {}: id={}", principal.username, id);
        Ok(product)
    }

    pub async fn delete_product(&self, principal: &Principal, id: i64) -> AppResult<()> {
        principal.require(ROLE_MANAGER)?;
        self.products.delete_by_id(id).await?;
        tracing::info!("Product deleted by {}: id={}", principal.username, id);
        Ok(())
    }
}
