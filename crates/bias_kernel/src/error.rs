//! Error types for the reference kernel.

use bias_core::GeometryError;
use bias_engine::{ConfigError, EngineError};
use thiserror::Error;

/// Errors raised while building or running a slab scenario.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// Scenario parameter outside its valid range.
    #[error("Invalid scenario parameter '{name}': {reason}")]
    InvalidScenario {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Scenario document could not be parsed.
    #[error("Scenario parse error: {0}")]
    Parse(String),

    /// Biasing configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Engine failure while producing a final state.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Geometry construction failure.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl KernelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        KernelError::InvalidScenario {
            name,
            reason: reason.into(),
        }
    }
}
