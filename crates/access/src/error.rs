//! Access error types.

use diary_store::StoreError;
use thiserror::Error;

use crate::Denial;

/// Errors that can occur during access-checked operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Authorization denial propagated with `?`.
    #[error(transparent)]
    Denied(#[from] Denial),

    /// The app is full.
    #[error("App is full ({max_students} students)")]
    CapacityExceeded { max_students: u32 },

    /// The student was already enrolled; nothing changed.
    #[error("Already enrolled ({enrolled_count} students)")]
    AlreadyEnrolled { enrolled_count: u32 },

    /// Input rejected before reaching the store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for access-checked operations.
pub type AccessResult<T> = Result<T, AccessError>;
