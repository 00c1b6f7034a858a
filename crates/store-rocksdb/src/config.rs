//! RocksDB store configuration

use std::path::PathBuf;

/// Configuration for the RocksDB-backed store
#[derive(Debug, Clone)]
pub struct RocksStoreConfig {
    /// Directory holding the database files
    pub path: PathBuf,

    /// Create the database if it does not exist yet
    pub create_if_missing: bool,
}

impl RocksStoreConfig {
    /// Create a new configuration with the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
        }
    }
}
