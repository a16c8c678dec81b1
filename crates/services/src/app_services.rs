use std::sync::Arc;

use sporty_core::{Clock, CurriculumCatalog, CurriculumDraft};
use storage::repository::Storage;

use crate::catalog_loader::load_catalog;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::progress_store::ProgressStore;

/// Assembles the catalog, store and service from one configuration.
#[derive(Clone)]
pub struct AppServices {
    config: EngineConfig,
    catalog: Arc<CurriculumCatalog>,
    store: Arc<ProgressStore>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// stored curriculum cannot be loaded.
    pub async fn new_sqlite(config: EngineConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        Self::from_storage(storage, config, clock).await
    }

    /// Build services from environment configuration and the system clock.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for invalid settings, otherwise see
    /// [`AppServices::new_sqlite`].
    pub async fn from_env() -> Result<Self, AppServicesError> {
        let config = EngineConfig::from_env()?;
        Self::new_sqlite(config, Clock::default_clock()).await
    }

    /// Build services over in-memory storage holding `curriculum`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Catalog` if the curriculum is rejected.
    pub async fn in_memory(
        curriculum: CurriculumDraft,
        config: EngineConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(curriculum), config, clock).await
    }

    /// Build services over any storage backends.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Catalog` if the curriculum cannot be loaded.
    pub async fn from_storage(
        storage: Storage,
        config: EngineConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let catalog = load_catalog(storage.content.as_ref()).await?;
        let store = Arc::new(ProgressStore::from_config(
            Arc::clone(&storage.progress),
            clock,
            &config,
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&catalog),
            Arc::clone(&store),
        ));

        Ok(Self {
            config,
            catalog,
            store,
            progress,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CurriculumCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn store(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
