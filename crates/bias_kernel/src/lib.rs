//! # Bias Kernel (Reference Host)
//!
//! A small slab transport kernel that drives [`bias_engine`] end to end.
//!
//! ## Role
//!
//! bias_kernel is not a general transport code. It implements exactly the
//! host side of the biasing callback protocol, for one geometry:
//! - A water slab in a vacuum world, with an optional detector plane ([`world`])
//! - Photon physics: Compton, photoelectric, pair production and at-rest
//!   annihilation ([`physics`])
//! - A point source, optionally gated by the engine's acceptance test ([`source`])
//! - History-based tallies of transmission, deposit and detector weight ([`tally`])
//! - A rayon runner with one kernel and one engine per worker ([`runner`])
//!
//! Running the same scenario with and without a `[biasing]` table is how
//! the engine's weight conservation is checked.
//!
//! ## Usage Example
//!
//! ```rust
//! use bias_kernel::{run_parallel, ScenarioConfig};
//!
//! let scenario = ScenarioConfig::from_toml_str(
//!     r#"
//!     histories = 50
//!     [slab]
//!     thickness = 10.0
//!     half_width = 100.0
//!     [source]
//!     energy = 1.0
//!     position = [0.0, 0.0, -20.0]
//!     direction = [0.0, 0.0, 1.0]
//!     [biasing]
//!     policy = "force-collision"
//!     regions = ["slab"]
//!     "#,
//! )
//! .unwrap();
//!
//! let report = run_parallel(&scenario).unwrap();
//! assert_eq!(report.policy.as_deref(), Some("force-collision"));
//! assert_eq!(report.tally.histories, 50);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(unknown_lints)]

pub mod error;
pub mod kernel;
pub mod physics;
pub mod runner;
pub mod scenario;
pub mod source;
pub mod tally;
pub mod world;

pub use error::KernelError;
pub use kernel::{KernelStats, TransportKernel};
pub use runner::{run_parallel, RunReport};
pub use scenario::ScenarioConfig;
pub use tally::{Estimate, HistoryScore, SlabTally, TallyReport};
pub use world::SlabWorld;
