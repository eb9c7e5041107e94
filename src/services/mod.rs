pub mod account_service;
pub mod category_service;
pub mod inventory_service;
pub mod location_service;
pub mod product_service;
pub mod supplier_service;
pub mod validation;

pub use account_service::AccountServiceImpl;
pub use category_service::CategoryServiceImpl;
pub use inventory_service::InventoryServiceImpl;
pub use location_service::LocationServiceImpl;
pub use product_service::ProductServiceImpl;
pub use supplier_service::SupplierServiceImpl;
