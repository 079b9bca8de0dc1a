//! Error types for the biasing engine.

use bias_core::{GeometryError, UnknownParticle};
use thiserror::Error;

use crate::protocol::OperationHandle;
use crate::registry::AuxState;

/// Configuration errors.
///
/// Fatal: the run must not start with an undefined bias.
///
/// # Examples
/// ```
/// use bias_engine::ConfigError;
///
/// let err = ConfigError::UnknownPolicy("importance".to_string());
/// assert_eq!(format!("{}", err), "Unknown biasing policy: importance");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Policy string not recognised.
    #[error("Unknown biasing policy: {0}")]
    UnknownPolicy(String),

    /// A required option was not supplied.
    #[error("Missing required option: {0}")]
    MissingOption(&'static str),

    /// Splitting factor below one or not finite.
    #[error("Invalid splitting factor: {0} (must be finite and >= 1)")]
    InvalidSplittingFactor(f64),

    /// Maximum replay level of zero.
    #[error("Invalid maximum replay level: {0} (must be >= 1)")]
    InvalidReplayLevel(u32),

    /// Cone half-angle outside (0, 180] degrees.
    #[error("Invalid bias-cone half-angle: {0} degrees")]
    InvalidConeAngle(f64),

    /// Zero-length or non-finite direction vector.
    #[error("Invalid direction for {0}: must be a finite non-zero vector")]
    InvalidDirection(&'static str),

    /// Incidence angle outside [0, 90] degrees.
    #[error("Invalid maximum incidence angle: {0} degrees")]
    InvalidIncidenceAngle(f64),

    /// Non-positive free-flight weight threshold.
    #[error("Invalid free-flight weight threshold: {0}")]
    InvalidWeightThreshold(f64),

    /// Acceptance trial cap of zero.
    #[error("Invalid acceptance trial cap: must be >= 1")]
    ZeroMaxTrials,

    /// Exhaustion policy string not recognised.
    #[error("Unknown exhaustion policy: {0}")]
    UnknownExhaustionPolicy(String),

    /// Process class name not recognised.
    #[error("Unknown process class: {0}")]
    UnknownProcessClass(String),

    /// Key not part of the configuration surface.
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Value that cannot be parsed for its key.
    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Offending value.
        value: String,
    },

    /// Unknown particle name.
    #[error(transparent)]
    Particle(#[from] UnknownParticle),

    /// Unknown or degenerate region/acceptance volume.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Malformed TOML document.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Runtime errors surfaced to the host kernel.
///
/// Invariant violations that the engine can heal are logged instead of
/// returned; these are the cases where it cannot produce a final state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Configuration failure at run start.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A biasing callback arrived before `start_run`.
    #[error("Biasing worker used before start_run")]
    NotStarted,

    /// The physics list has no process of this name.
    #[error("Missing interaction process: {0}")]
    MissingProcess(String),

    /// An operation handle this worker did not issue.
    #[error("Operation {0:?} was not issued by this operator")]
    UnknownOperation(OperationHandle),

    /// A stored track key refers to a recycled registry slot.
    #[error("Stale registry entry for track {0}")]
    StaleTrackKey(bias_core::TrackId),

    /// Auxiliary state transition that the state machine forbids.
    #[error("Invalid auxiliary state transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state.
        from: AuxState,
        /// Requested state.
        to: AuxState,
    },
}
