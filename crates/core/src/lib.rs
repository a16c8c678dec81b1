#![forbid(unsafe_code)]

pub mod catalog;
pub mod engine;
pub mod error;
pub mod model;
pub mod time;

pub use catalog::{CatalogError, CurriculumCatalog, CurriculumDraft, LockState, SportDraft};
pub use engine::ProgressEvent;
pub use error::Error;
pub use time::{Calendar, Clock};
