use async_trait::async_trait;
use sporty_core::CurriculumDraft;
use sporty_core::model::{Progress, ProgressKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The database rejected the write (unique, foreign key, not null or
    /// check constraint). Retrying the same write fails the same way.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl StorageError {
    /// Whether reloading and retrying the operation can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Conflict | StorageError::Connection(_))
    }
}

/// Monotonic write counter for a stored progress aggregate; starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(u64);

impl Version {
    pub const INITIAL: Version = Version(1);

    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A stored value together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

/// Persistence contract for progress aggregates.
///
/// Writes are compare-and-set on the version: a save succeeds only when the
/// stored version still equals `expected` (or, with `expected == None`, when
/// nothing is stored yet).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the aggregate for a key.
    ///
    /// Returns `Ok(None)` when nothing has been stored for the key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<Versioned<Progress>>, StorageError>;

    /// Store a new snapshot and return its version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the stored version is not
    /// `expected`, or other storage errors.
    async fn save_progress(
        &self,
        progress: &Progress,
        expected: Option<Version>,
    ) -> Result<Version, StorageError>;
}

/// Source of the raw curriculum graph.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Load the full curriculum.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no curriculum is available, or other
    /// storage errors.
    async fn load_curriculum(&self) -> Result<CurriculumDraft, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<ProgressKey, Versioned<Progress>>>>,
    curriculum: Arc<Mutex<Option<CurriculumDraft>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository that serves the given curriculum.
    #[must_use]
    pub fn with_curriculum(draft: CurriculumDraft) -> Self {
        let repo = Self::new();
        if let Ok(mut guard) = repo.curriculum.lock() {
            *guard = Some(draft);
        }
        repo
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<Versioned<Progress>>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn save_progress(
        &self,
        progress: &Progress,
        expected: Option<Version>,
    ) -> Result<Version, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let stored = guard.get(progress.key()).map(|v| v.version);
        if stored != expected {
            return Err(StorageError::Conflict);
        }
        let version = expected.map_or(Version::INITIAL, Version::next);
        guard.insert(
            progress.key().clone(),
            Versioned {
                value: progress.clone(),
                version,
            },
        );
        Ok(version)
    }
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn load_curriculum(&self) -> Result<CurriculumDraft, StorageError> {
        let guard = self
            .curriculum
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clone().ok_or(StorageError::NotFound)
    }
}

/// Aggregates the persistence and content collaborators behind trait objects
/// for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub content: Arc<dyn ContentRepository>,
}

impl Storage {
    /// In-memory storage serving the given curriculum.
    #[must_use]
    pub fn in_memory(curriculum: CurriculumDraft) -> Self {
        let repo = InMemoryRepository::with_curriculum(curriculum);
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let content: Arc<dyn ContentRepository> = Arc::new(repo);
        Self { progress, content }
    }
}
