//! Store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },

    /// Duplicate entity.
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists { entity_type: &'static str, id: String },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Foreign key constraint violation.
    #[error("Foreign key constraint violation: {0}")]
    ForeignKeyViolation(String),

    /// A persisted value could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(entity_type: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity_type,
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
