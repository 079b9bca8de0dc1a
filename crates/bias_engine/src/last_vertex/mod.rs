//! Last-vertex splitting.
//!
//! Interactions inside the region are recorded as they happen. When a
//! tracked particle leaves the region, the last recorded interaction in its
//! lineage is re-simulated `N` times from the stored snapshot and the
//! exiting track is replaced by the replay products. Siblings that the
//! replay regenerates are discarded when popped.
//!
//! - [`fsm`]: per-track replay state machine
//! - [`recorder`]: vertex arena and lineage resolution

pub mod fsm;
pub mod recorder;

pub use fsm::{transition, InvalidReplayTransition, ReplayEvent, ReplayState};
pub use recorder::{LineageEntry, VertexId, VertexRecord, VertexRecorder};
