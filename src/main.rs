use anyhow::Context;

use catalog_admin::auth::Argon2Hasher;
use catalog_admin::config::Config;
use catalog_admin::db::{create_pool, PgStore};
use catalog_admin::services::{
    AccountServiceImpl, CategoryServiceImpl, InventoryServiceImpl, LocationServiceImpl,
    ProductServiceImpl, SupplierServiceImpl,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_admin=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("DATABASE_URL must be set")?;

    tracing::info!("Starting catalog-admin...");
    tracing::info!("Connecting to database...");

    let pool = create_pool(&config).await?;
    tracing::info!("Database connection established");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Schema up to date");

    let store = PgStore::new(pool);

    // Create services
    let _products = ProductServiceImpl::new(store.clone());
    let _categories = CategoryServiceImpl::new(store.clone());
    let _locations = LocationServiceImpl::new(store.clone());
    let _inventory = InventoryServiceImpl::new(store.clone());
    let _suppliers = SupplierServiceImpl::new(store.clone());
    let _accounts = AccountServiceImpl::new(store, Argon2Hasher, config.default_role.clone());

    tracing::info!(
        "catalog-admin ready (max_connections={}, default_role={})",
        config.max_connections,
        config.default_role
    );

    Ok(())
}
