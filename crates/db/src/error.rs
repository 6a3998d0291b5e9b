//! Typed error type for the db crate.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Optimistic concurrency check failed on a workflow save.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i32, actual: i32 },

    /// A run in a terminal status can no longer be written.
    #[error("run {0} is already finalized")]
    RunFinalized(Uuid),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}
