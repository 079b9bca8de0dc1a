//! Values exchanged with the host kernel across the callback protocol.

use std::fmt;

use bias_core::{PhysicsList, TrackId, TrackStatus, TransportRng};
use serde::{Deserialize, Serialize};

use crate::registry::OperatorId;

/// Kind of biasing operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Split an entering track into a forced and a free-flight copy.
    Cloning,
    /// Cross a region without interacting.
    ForceFreeFlight,
    /// Interact inside a region, at a truncated-exponential distance.
    ForcedInteraction,
    /// Replay one interaction `N` times.
    Splitting,
    /// Replay a recorded vertex when a track leaves the region.
    LastVertexReplay,
}

/// Operation chosen by an operator, returned to the kernel and handed back
/// on application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle {
    /// Issuing operator.
    pub operator: OperatorId,
    /// Operation kind.
    pub kind: OperationKind,
}

impl OperationHandle {
    /// Creates a handle.
    #[inline]
    pub fn new(operator: OperatorId, kind: OperationKind) -> Self {
        Self { operator, kind }
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind, self.operator)
    }
}

/// A candidate process and its current rate (1/mm).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessView<'a> {
    /// Native process name.
    pub name: &'a str,
    /// Macroscopic cross-section at the track's current state.
    pub rate: f64,
}

/// Replacement for a process's native interaction length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OccurrenceProposal {
    /// Operation in charge of the occurrence.
    pub operation: OperationHandle,
    /// Interaction length to use instead of the native one (mm).
    pub interaction_length: f64,
}

/// Kernel services an operation needs while producing a final state.
pub struct HostContext<'a> {
    /// Worker random stream.
    pub rng: &'a mut TransportRng,
    /// Physics collaborators.
    pub physics: &'a mut dyn PhysicsList,
}

/// What the kernel did with an interaction outcome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppliedOutcome {
    /// Identifiers the kernel assigned to the stacked secondaries, in the
    /// order they were proposed.
    pub secondaries: Vec<TrackId>,
    /// Status of the interacting track after the outcome.
    pub status: TrackStatus,
    /// Name of the process whose final state was applied, if any.
    pub process: Option<String>,
}

/// Verdict returned when a track is popped from the stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackingVerdict {
    /// Transport the track.
    #[default]
    Continue,
    /// Kill the track without transporting it.
    Kill,
    /// Re-stack the track and try again later in the event.
    Postpone,
}
