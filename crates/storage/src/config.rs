//! Storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for opening a persistent store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Create the database if it does not exist yet.
    pub create_if_missing: bool,
    /// Maximum number of open files, engine default when `None`.
    pub max_open_files: Option<i32>,
    /// Background thread parallelism, engine default when `None`.
    pub parallelism: Option<i32>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/chainstate"),
            create_if_missing: true,
            max_open_files: Some(1000),
            parallelism: None,
        }
    }
}

impl StorageConfig {
    /// Configuration rooted at `path` with defaults for everything else.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}
