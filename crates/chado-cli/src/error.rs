//! Error types for the chado CLI
//!
//! User-facing errors with actionable messages; engine errors pass through
//! with their own context.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Engine operation failed
    #[error("{0}")]
    Engine(#[from] chado_engine::EngineError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check the path and permissions.")]
    Io(#[from] std::io::Error),

    /// Command-line argument could not be interpreted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
