//! File store - write path, failover, and discovery

mod service;

pub use service::FileStore;

use crate::config;
use std::path::PathBuf;

/// File store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Field delimiter for header and data lines
    pub separator: String,
    /// Storage roots in failover priority order
    pub data_dirs: Vec<PathBuf>,
    /// Strftime pattern deriving time-bucket subdirectories
    pub dir_pattern: String,
    /// Per-stream-type ceiling on simultaneously open files
    pub max_open_files: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            separator: config::SEPARATOR.to_string(),
            data_dirs: vec![PathBuf::from("data")],
            dir_pattern: config::DIR_PATTERN.to_string(),
            max_open_files: config::MAX_OPEN_FILES,
        }
    }
}
