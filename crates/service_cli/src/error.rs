//! CLI error types.

use bias_kernel::KernelError;
use thiserror::Error;

/// Errors surfaced by `biasrun` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Input file missing.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Command-line argument rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Scenario or run failure.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialisation failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
