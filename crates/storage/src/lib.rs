#![forbid(unsafe_code)]

pub mod json_content;
pub mod repository;
pub mod sqlite;

pub use json_content::JsonContentSource;
pub use repository::{
    ContentRepository, InMemoryRepository, ProgressRepository, Storage, StorageError, Version,
    Versioned,
};
