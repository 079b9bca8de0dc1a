//! Biasing operators.
//!
//! An operator decides, at each callback of the transport protocol, whether
//! a biasing operation takes over from native physics. Operators are
//! dispatched statically through [`Operator`]; one is built per worker from
//! the shared configuration.
//!
//! ## Design Philosophy
//!
//! - **Static dispatch**: every callback is a `match` over [`Operator`]
//! - **Side-tables only**: operators never store state in tracks; per-track
//!   state lives in the [`WorkerState`] registry or in operator maps keyed
//!   by [`TrackId`](bias_core::TrackId)
//! - **Self-healing**: invariant violations are logged and counted through
//!   [`WorkerState::violation`], never panicked on
//!
//! ## Policies
//!
//! | Policy | Operator |
//! |--------|----------|
//! | `force-collision` | [`ForceCollisionOperator`] |
//! | `compton-splitting`, `brem-splitting`, `pair-splitting`, `generic-splitting` | [`SplittingOperator`] |
//! | `free-flight` | [`FreeFlightOperator`] |
//! | `last-vertex-splitting` | [`LastVertexOperator`] |

pub mod force_collision;
pub mod free_flight;
pub mod last_vertex;
pub mod splitting;

use std::sync::Arc;

use bias_core::{GeometryStore, ParticleChange, PlacedVolume, Step, Track};

use crate::config::{BiasingConfig, BiasingPolicy};
use crate::error::{ConfigError, EngineError};
use crate::gate::AcceptanceGate;
use crate::operations::SplittingOperation;
use crate::protocol::{
    AppliedOutcome, HostContext, OccurrenceProposal, OperationHandle, ProcessView,
    TrackingVerdict,
};
use crate::registry::OperatorId;
use crate::roulette::{AngularRoulette, SurvivalRegion};
use crate::worker::WorkerState;

pub use force_collision::ForceCollisionOperator;
pub use free_flight::FreeFlightOperator;
pub use last_vertex::LastVertexOperator;
pub use splitting::SplittingOperator;

/// Callbacks an operator receives from the host kernel.
///
/// Every method has a pass-through default, so an operator only implements
/// the callbacks it acts on.
pub trait BiasingOperator {
    /// Identifier used in operation handles and registry ownership.
    fn id(&self) -> OperatorId;

    /// Resolves geometry-dependent parts of the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown or degenerate volumes.
    fn start_run(&mut self, _geometry: &dyn GeometryStore) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Discards per-event state.
    fn start_event(&mut self, _state: &mut WorkerState) {}

    /// Decides what happens to a track popped from the stack.
    fn start_tracking(&mut self, _state: &mut WorkerState, _track: &Track) -> TrackingVerdict {
        TrackingVerdict::Continue
    }

    /// Non-physics operation for the coming step.
    fn propose_non_physics(
        &mut self,
        _state: &mut WorkerState,
        _track: &Track,
    ) -> Option<OperationHandle> {
        None
    }

    /// Final state of a non-physics operation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownOperation`] for handles the operator
    /// did not issue.
    fn apply_non_physics(
        &mut self,
        _state: &mut WorkerState,
        handle: OperationHandle,
        _track: &Track,
        _ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        Err(EngineError::UnknownOperation(handle))
    }

    /// Replacement interaction length for `calling`.
    fn propose_occurrence(
        &mut self,
        _state: &mut WorkerState,
        _track: &Track,
        _calling: &str,
        _candidates: &[ProcessView<'_>],
        _ctx: &mut HostContext<'_>,
    ) -> Option<OccurrenceProposal> {
        None
    }

    /// Reports that `track` moved `length` while `process` was a candidate.
    fn along_move_by(
        &mut self,
        _state: &mut WorkerState,
        _track: &Track,
        _process: &str,
        _length: f64,
    ) {
    }

    /// Biased final state for the end of `step`, if any.
    fn propose_final_state(
        &mut self,
        _state: &mut WorkerState,
        _track: &Track,
        _step: &Step,
        _limiting_process: Option<&str>,
    ) -> Option<OperationHandle> {
        None
    }

    /// Produces the biased final state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the handle is foreign or the physics list
    /// lacks the process to replay.
    fn apply_final_state(
        &mut self,
        _state: &mut WorkerState,
        handle: OperationHandle,
        _process: Option<&str>,
        _track: &Track,
        _step: &Step,
        _ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        Err(EngineError::UnknownOperation(handle))
    }

    /// Reports what the kernel did with an interaction outcome.
    fn operation_applied(
        &mut self,
        _state: &mut WorkerState,
        _track: &Track,
        _handle: Option<OperationHandle>,
        _outcome: &AppliedOutcome,
    ) {
    }

    /// Reports that `track` finished.
    fn end_tracking(&mut self, _state: &mut WorkerState, _track: &Track) {}
}

/// Static dispatch over the operators.
#[derive(Clone, Debug)]
pub enum Operator {
    /// `force-collision`
    ForceCollision(ForceCollisionOperator),
    /// The four splitting policies
    Splitting(SplittingOperator),
    /// `free-flight`
    FreeFlight(FreeFlightOperator),
    /// `last-vertex-splitting`
    LastVertex(LastVertexOperator),
}

macro_rules! dispatch {
    ($self:ident, $op:ident => $body:expr) => {
        match $self {
            Operator::ForceCollision($op) => $body,
            Operator::Splitting($op) => $body,
            Operator::FreeFlight($op) => $body,
            Operator::LastVertex($op) => $body,
        }
    };
}

impl Operator {
    /// Builds the operator selected by the configured policy.
    pub fn from_config(config: Arc<BiasingConfig>, id: OperatorId) -> Self {
        match config.policy() {
            BiasingPolicy::ForceCollision => {
                Operator::ForceCollision(ForceCollisionOperator::new(config, id))
            }
            BiasingPolicy::ComptonSplitting
            | BiasingPolicy::BremSplitting
            | BiasingPolicy::PairSplitting
            | BiasingPolicy::GenericSplitting => {
                Operator::Splitting(SplittingOperator::new(config, id))
            }
            BiasingPolicy::FreeFlight => Operator::FreeFlight(FreeFlightOperator::new(config, id)),
            BiasingPolicy::LastVertexSplitting => {
                Operator::LastVertex(LastVertexOperator::new(config, id))
            }
        }
    }

    /// Policy name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::ForceCollision(_) => "force-collision",
            Operator::Splitting(op) => op.policy().as_str(),
            Operator::FreeFlight(_) => "free-flight",
            Operator::LastVertex(_) => "last-vertex-splitting",
        }
    }
}

impl BiasingOperator for Operator {
    fn id(&self) -> OperatorId {
        dispatch!(self, op => op.id())
    }

    fn start_run(&mut self, geometry: &dyn GeometryStore) -> Result<(), ConfigError> {
        dispatch!(self, op => op.start_run(geometry))
    }

    fn start_event(&mut self, state: &mut WorkerState) {
        dispatch!(self, op => op.start_event(state))
    }

    fn start_tracking(&mut self, state: &mut WorkerState, track: &Track) -> TrackingVerdict {
        dispatch!(self, op => op.start_tracking(state, track))
    }

    fn propose_non_physics(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
    ) -> Option<OperationHandle> {
        dispatch!(self, op => op.propose_non_physics(state, track))
    }

    fn apply_non_physics(
        &mut self,
        state: &mut WorkerState,
        handle: OperationHandle,
        track: &Track,
        ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        dispatch!(self, op => op.apply_non_physics(state, handle, track, ctx))
    }

    fn propose_occurrence(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        calling: &str,
        candidates: &[ProcessView<'_>],
        ctx: &mut HostContext<'_>,
    ) -> Option<OccurrenceProposal> {
        dispatch!(self, op => op.propose_occurrence(state, track, calling, candidates, ctx))
    }

    fn along_move_by(&mut self, state: &mut WorkerState, track: &Track, process: &str, length: f64) {
        dispatch!(self, op => op.along_move_by(state, track, process, length))
    }

    fn propose_final_state(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        step: &Step,
        limiting_process: Option<&str>,
    ) -> Option<OperationHandle> {
        dispatch!(self, op => op.propose_final_state(state, track, step, limiting_process))
    }

    fn apply_final_state(
        &mut self,
        state: &mut WorkerState,
        handle: OperationHandle,
        process: Option<&str>,
        track: &Track,
        step: &Step,
        ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        dispatch!(self, op => op.apply_final_state(state, handle, process, track, step, ctx))
    }

    fn operation_applied(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        handle: Option<OperationHandle>,
        outcome: &AppliedOutcome,
    ) {
        dispatch!(self, op => op.operation_applied(state, track, handle, outcome))
    }

    fn end_tracking(&mut self, state: &mut WorkerState, track: &Track) {
        dispatch!(self, op => op.end_tracking(state, track))
    }
}

/// Resolves every configured region volume.
pub(crate) fn resolve_regions(
    config: &BiasingConfig,
    geometry: &dyn GeometryStore,
) -> Result<Vec<PlacedVolume>, ConfigError> {
    config
        .regions()
        .iter()
        .map(|name| geometry.placed(name).cloned().map_err(ConfigError::from))
        .collect()
}

/// Builds the splitting operation, with angular roulette when enabled.
///
/// The survival region is the acceptance gate when one is configured, the
/// bias cone otherwise.
pub(crate) fn build_splitting(
    config: &BiasingConfig,
    geometry: &dyn GeometryStore,
) -> Result<SplittingOperation, ConfigError> {
    let splitting = SplittingOperation::new(config.splitting_factor());
    if !config.russian_roulette() {
        return Ok(splitting);
    }
    let region = match (config.acceptance(), config.bias_cone()) {
        (Some(acceptance), _) => {
            SurvivalRegion::Acceptance(AcceptanceGate::resolve(acceptance, geometry)?)
        }
        (None, Some(cone)) => SurvivalRegion::Cone(*cone),
        (None, None) => return Err(ConfigError::MissingOption("bias_cone")),
    };
    let roulette = AngularRoulette::new(region, config.splitting_factor().value());
    Ok(splitting.with_roulette(roulette, config.particles()))
}

/// Region volume that contains `track`, if any.
pub(crate) fn region_of<'a>(regions: &'a [PlacedVolume], track: &Track) -> Option<&'a PlacedVolume> {
    let name = track.volume.as_deref()?;
    regions.iter().find(|volume| volume.name() == name)
}

/// Returns `true` if `step` leaves any of `regions`.
pub(crate) fn exits_region(config: &BiasingConfig, step: &Step) -> bool {
    config.regions().iter().any(|region| step.exits(region))
}

/// Region `track` just entered through its boundary, if any.
pub(crate) fn entered_region<'a>(config: &'a BiasingConfig, track: &Track) -> Option<&'a str> {
    config
        .regions()
        .iter()
        .map(String::as_str)
        .find(|region| track.entered_through_boundary(region))
}
