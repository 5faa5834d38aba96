use thiserror::Error;

use common::Version;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record was modified since it was loaded.
    #[error(
        "Concurrency conflict for {entity} {id}: expected {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// Two orders were allocated the same order number.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Builds a concurrency conflict, recording it in logs and metrics.
    pub fn conflict(
        entity: &'static str,
        id: impl ToString,
        expected: Version,
        actual: Version,
    ) -> Self {
        let id = id.to_string();
        tracing::debug!(entity, %id, %expected, %actual, "version conflict on save");
        metrics::counter!("store_concurrency_conflicts_total", "entity" => entity).increment(1);
        StoreError::ConcurrencyConflict {
            entity,
            id,
            expected,
            actual,
        }
    }

    /// Returns true if the error is an optimistic concurrency failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
