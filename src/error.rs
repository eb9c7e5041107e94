use thiserror::Error;

use crate::db::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("{entity} not found with {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists with {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Coarse classification callers match on instead of inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    IllegalState,
    Unauthenticated,
    PermissionDenied,
    Infrastructure,
}

impl AppError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        AppError::AlreadyExists {
            entity,
            key: key.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Storage(_) => ErrorKind::Infrastructure,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            AppError::InvalidArgument(_) | AppError::Validation(_) => ErrorKind::InvalidArgument,
            AppError::IllegalState(_) => ErrorKind::IllegalState,
            AppError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            AppError::PermissionDenied(_) => ErrorKind::PermissionDenied,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
