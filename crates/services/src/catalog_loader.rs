use std::sync::Arc;

use sporty_core::CurriculumCatalog;
use storage::repository::ContentRepository;
use tracing::info;

use crate::error::CatalogLoadError;

/// Load and validate the curriculum once, at startup.
///
/// # Errors
///
/// Returns `CatalogLoadError` if the content source fails or the curriculum
/// does not pass the catalog's integrity checks. No partial catalog is built.
pub async fn load_catalog(
    content: &dyn ContentRepository,
) -> Result<Arc<CurriculumCatalog>, CatalogLoadError> {
    let draft = content.load_curriculum().await?;
    let catalog = CurriculumCatalog::load(draft)?;
    let lessons: usize = catalog
        .sports()
        .iter()
        .map(|sport| catalog.lesson_count(&sport.id))
        .sum();
    info!(
        sports = catalog.sports().len(),
        lessons, "curriculum catalog loaded"
    );
    Ok(Arc::new(catalog))
}
