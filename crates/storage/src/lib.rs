//! Storage Layer
//!
//! SQLite persistence for users, devices and their motion samples, plus the
//! one-shot bootstrap seeder.

mod models;
mod repository;
mod schema;
mod seed;

pub use models::{Device, DeviceStat, NewDeviceStat, TimeWindow, User, MAX_READING_MAGNITUDE};
pub use repository::{Repository, StoreCounts};
pub use seed::{
    load_seed_file, seed_from_data, seed_if_empty, SeedData, SeedDevice, SeedOutcome,
    SeedReport, SeedStat, SeedUser,
};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),
    #[error("Foreign key constraint violation: {0}")]
    ForeignKeyViolation(String),
    #[error("{entity} {id} still has {count} {dependents}")]
    HasDependents {
        entity: &'static str,
        id: i64,
        dependents: &'static str,
        count: i64,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to read seed file {path}: {source}")]
    SeedFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StorageError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StorageError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StorageError::ForeignKeyViolation(db_err.message().to_string())
            }
            _ => StorageError::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
