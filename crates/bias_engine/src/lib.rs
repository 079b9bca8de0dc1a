//! # Bias Engine (Layer 3: Variance Reduction)
//!
//! Weight-preserving variance-reduction operators for particle transport.
//!
//! ## Layer 3 Role
//!
//! bias_engine plugs into a host transport kernel through a fixed callback
//! protocol and rewrites selected steps of selected tracks:
//! - Forced collision with free-flight survival weighting ([`operators::force_collision`])
//! - Process splitting with angular Russian roulette ([`operators::splitting`])
//! - Pure free flight ([`operators::free_flight`])
//! - Last-vertex splitting ([`operators::last_vertex`], [`last_vertex`])
//! - Acceptance/direction gating of primaries ([`gate`])
//!
//! Every operation multiplies weights so that the expected score of any
//! tally is unchanged; only the variance moves.
//!
//! ## Threading
//!
//! One [`BiasingWorker`] per transport worker. The configuration is shared
//! read-only behind an `Arc`; everything mutable is owned by the worker and
//! merged into [`stats::RunStatistics`] once, at end of run.
//!
//! ## Usage Example
//!
//! ```rust
//! use bias_engine::config::{BiasingConfig, BiasingPolicy};
//!
//! let config = BiasingConfig::from_toml_str(
//!     r#"
//!     policy = "compton-splitting"
//!     regions = ["slab"]
//!     splitting_factor = 10.0
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.policy(), BiasingPolicy::ComptonSplitting);
//! assert_eq!(config.splitting_factor().whole(), 10);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(unknown_lints)]

pub mod config;
pub mod error;
pub mod gate;
pub mod last_vertex;
pub mod law;
pub mod operations;
pub mod operators;
pub mod process;
pub mod protocol;
pub mod registry;
pub mod roulette;
pub mod stats;
pub mod worker;

// Re-export commonly used items for convenience
pub use config::{BiasingConfig, BiasingPolicy, SplittingFactor};
pub use error::{ConfigError, EngineError};
pub use gate::{AcceptanceGate, GateSample};
pub use operators::{BiasingOperator, Operator};
pub use process::{InterestingProcess, ProcessCatalogue, SplitMode};
pub use protocol::{
    AppliedOutcome, HostContext, OccurrenceProposal, OperationHandle, OperationKind,
    ProcessView, TrackingVerdict,
};
pub use registry::{AuxState, OperatorId};
pub use stats::{RunStatistics, RunSummary, WorkerStats};
pub use worker::{BiasingWorker, WorkerState};
