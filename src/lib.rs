pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod relational;
pub mod repositories;
pub mod services;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{AppError, AppResult};
