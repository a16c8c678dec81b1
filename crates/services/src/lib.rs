#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_loader;
pub mod config;
pub mod error;
pub mod progress_service;
pub mod progress_store;

pub use sporty_core::{Calendar, Clock};

pub use app_services::AppServices;
pub use catalog_loader::load_catalog;
pub use config::EngineConfig;
pub use error::{
    AppServicesError, CatalogLoadError, ConfigError, ProgressServiceError, ProgressStoreError,
};
pub use progress_service::{ModuleProgress, ProgressService};
pub use progress_store::{ProgressChanged, ProgressStore, RetryPolicy};
