use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sporty_core::CurriculumDraft;
use tracing::debug;

use crate::repository::{ContentRepository, StorageError};

/// Curriculum read from a JSON document (a file on disk or an inline string).
///
/// The document shape is `{"sports": [{ ...sport, "modules": [{ ...module,
/// "lessons": [...] }] }]}` with camelCase field names.
#[derive(Debug, Clone)]
pub enum JsonContentSource {
    File(PathBuf),
    Inline(String),
}

impl JsonContentSource {
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    #[must_use]
    pub fn from_string(json: impl Into<String>) -> Self {
        Self::Inline(json.into())
    }

    fn parse(raw: &str) -> Result<CurriculumDraft, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn read(path: &Path) -> Result<String, StorageError> {
        tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Connection(format!("{}: {e}", path.display())),
        })
    }
}

#[async_trait]
impl ContentRepository for JsonContentSource {
    async fn load_curriculum(&self) -> Result<CurriculumDraft, StorageError> {
        match self {
            JsonContentSource::File(path) => {
                debug!(path = %path.display(), "reading curriculum file");
                let raw = Self::read(path).await?;
                Self::parse(&raw)
            }
            JsonContentSource::Inline(raw) => Self::parse(raw),
        }
    }
}
