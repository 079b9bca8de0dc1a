//! Biasing operations.
//!
//! Operations produce final states and weight corrections; operators
//! decide when to apply them.
//!
//! ## Module Structure
//!
//! - [`cloning`]: copies an entering track into two weighted tracks
//! - [`free_flight`]: non-interacting traversal with survival weighting
//! - [`forced_interaction`]: interaction forced before the region exit
//! - [`splitting`]: `N`-fold replay of one interaction

pub mod cloning;
pub mod forced_interaction;
pub mod free_flight;
pub mod splitting;

pub use cloning::{CloningOperation, CLONE_CREATOR};
pub use forced_interaction::ForcedInteractionOperation;
pub use free_flight::{FreeFlightOperation, FreeFlightRecord, Restoration};
pub use splitting::{ParentHandling, SplitResult, SplittingOperation};
