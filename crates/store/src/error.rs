use thiserror::Error;

/// Errors that can occur when reading or writing local state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness rule was violated.
    #[error("{entity} already exists for {key}")]
    Duplicate { entity: &'static str, key: String },

    /// A compare-and-set status write found a different status.
    #[error("{entity} {id} status changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        entity: &'static str,
        id: String,
        expected: String,
        actual: String,
    },

    /// A stored column could not be decoded into a domain value.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The backend refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true for errors caused by the current state of the data rather
    /// than by the backend.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Duplicate { .. } | StoreError::StatusConflict { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
