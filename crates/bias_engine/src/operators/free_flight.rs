//! Forced free flight through the region, without cloning.
//!
//! Configured particles that enter the region cross it without
//! interacting. On exit their weight is multiplied by the survival
//! probability of the path they took.

use std::sync::Arc;

use bias_core::{GeometryStore, ParticleChange, Step, Track};
use tracing::debug;

use super::{entered_region, exits_region, resolve_regions, BiasingOperator};
use crate::config::BiasingConfig;
use crate::error::{ConfigError, EngineError};
use crate::operations::{FreeFlightOperation, Restoration};
use crate::protocol::{HostContext, OccurrenceProposal, OperationHandle, OperationKind, ProcessView};
use crate::registry::{AuxState, OperatorId};
use crate::worker::WorkerState;

/// Operator of the `free-flight` policy.
#[derive(Clone, Debug)]
pub struct FreeFlightOperator {
    id: OperatorId,
    config: Arc<BiasingConfig>,
    free_flight: FreeFlightOperation,
}

impl FreeFlightOperator {
    /// Creates the operator.
    pub fn new(config: Arc<BiasingConfig>, id: OperatorId) -> Self {
        let free_flight = FreeFlightOperation::new(config.free_flight_weight_threshold());
        Self {
            id,
            config,
            free_flight,
        }
    }
}

impl BiasingOperator for FreeFlightOperator {
    fn id(&self) -> OperatorId {
        self.id
    }

    fn start_run(&mut self, geometry: &dyn GeometryStore) -> Result<(), ConfigError> {
        resolve_regions(&self.config, geometry).map(|_| ())
    }

    fn start_event(&mut self, _state: &mut WorkerState) {
        self.free_flight.clear();
    }

    fn propose_non_physics(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
    ) -> Option<OperationHandle> {
        entered_region(&self.config, track)?;
        if self.config.applies_to(track.particle)
            && track.weight > 0.0
            && state.registry.state(track.id) == AuxState::Free
        {
            match state
                .registry
                .transition(track.id, AuxState::ToBeFreeFlight, self.id)
            {
                Ok(_) => {
                    self.free_flight.begin(track.id, track.weight);
                    debug!(track = %track.id, weight = track.weight, "free flight started");
                }
                Err(err) => state.violation(track.id, &err.to_string()),
            }
        }
        None
    }

    fn propose_occurrence(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        calling: &str,
        candidates: &[ProcessView<'_>],
        _ctx: &mut HostContext<'_>,
    ) -> Option<OccurrenceProposal> {
        if state.registry.state(track.id) != AuxState::ToBeFreeFlight {
            return None;
        }
        let rate = candidates
            .iter()
            .find(|c| c.name == calling)
            .map_or(0.0, |c| c.rate);
        self.free_flight.record_rate(track.id, calling, rate);
        Some(OccurrenceProposal {
            operation: OperationHandle::new(self.id, OperationKind::ForceFreeFlight),
            interaction_length: self.free_flight.interaction_length(),
        })
    }

    fn along_move_by(&mut self, state: &mut WorkerState, track: &Track, process: &str, length: f64) {
        if state.registry.state(track.id) == AuxState::ToBeFreeFlight {
            self.free_flight.accumulate(track.id, process, length);
        }
    }

    fn propose_final_state(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        step: &Step,
        _limiting_process: Option<&str>,
    ) -> Option<OperationHandle> {
        (state.registry.state(track.id) == AuxState::ToBeFreeFlight
            && exits_region(&self.config, step))
        .then(|| OperationHandle::new(self.id, OperationKind::ForceFreeFlight))
    }

    fn apply_final_state(
        &mut self,
        state: &mut WorkerState,
        handle: OperationHandle,
        _process: Option<&str>,
        track: &Track,
        _step: &Step,
        ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        if handle.kind != OperationKind::ForceFreeFlight {
            return Err(EngineError::UnknownOperation(handle));
        }
        state.registry.clear(track.id);
        let Some((change, restoration)) = self.free_flight.restore(track, ctx.rng) else {
            state.violation(track.id, "free-flight weight already restored");
            return Ok(ParticleChange::new());
        };
        state.stats.free_flights_restored += 1;
        if restoration == Restoration::Killed {
            state.stats.threshold_kills += 1;
        }
        debug!(track = %track.id, ?restoration, "free flight ended");
        Ok(change)
    }

    fn end_tracking(&mut self, state: &mut WorkerState, track: &Track) {
        if self.free_flight.forget(track.id).is_some() {
            state.violation(track.id, "free flight ended without weight restoration");
            state.registry.clear(track.id);
        }
    }
}
