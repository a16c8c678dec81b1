//! Shared error types for the services crate.

use thiserror::Error;

use sporty_core::CatalogError;
use sporty_core::model::{LessonId, QuizError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Every attempt hit a retryable failure. Callers should re-fetch before
    /// trying again.
    #[error("progress write gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: StorageError },
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("lesson not found: {0}")]
    LessonNotFound(LessonId),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Store(#[from] ProgressStoreError),
}

/// Errors emitted while loading the curriculum catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error("curriculum unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("curriculum rejected: {0}")]
    Catalog(#[from] CatalogError),
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),
}
