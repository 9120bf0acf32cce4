//! Error types for flatlog

use thiserror::Error;

/// Result type alias for flatlog operations
pub type Result<T> = std::result::Result<T, FlatlogError>;

/// Flatlog error types
#[derive(Error, Debug)]
pub enum FlatlogError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No candidate file could be resolved within the probing bound
    #[error("No usable candidate file in {dir} after probing {probed} indices")]
    CandidatesExhausted { dir: String, probed: usize },
}

impl FlatlogError {
    /// Check if error is retryable (on another storage root)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlatlogError::Io(_) | FlatlogError::CandidatesExhausted { .. }
        )
    }

    /// Check if error is a startup configuration problem
    pub fn is_config(&self) -> bool {
        matches!(self, FlatlogError::Config(_))
    }
}
