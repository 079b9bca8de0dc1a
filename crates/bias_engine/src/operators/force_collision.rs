//! Forced collision.
//!
//! On entry into the region a configured particle is cloned. The original
//! keeps weight 0 and crosses the region in forced free flight; its weight
//! is restored to `w * exp(-∫Σ dl)` at the exit. The clone carries `w` and
//! is forced to interact before the exit at a distance drawn from the
//! shared truncated law; its weight is then multiplied by the interaction
//! probability `P`, also when the process declines the interaction. Together
//! the two copies reproduce the unbiased expectation while every entering
//! particle contributes an interaction.
//!
//! With a splitting factor, the forced interaction is split; a clone
//! already at the maximum replay level is killed instead.

use std::collections::HashMap;
use std::sync::Arc;

use bias_core::{GeometryStore, ParticleChange, PlacedVolume, Step, Track, TrackId};
use tracing::debug;

use super::{build_splitting, entered_region, exits_region, region_of, resolve_regions, BiasingOperator};
use crate::config::BiasingConfig;
use crate::error::{ConfigError, EngineError};
use crate::operations::{
    CloningOperation, ForcedInteractionOperation, FreeFlightOperation, ParentHandling,
    Restoration, SplittingOperation,
};
use crate::protocol::{
    AppliedOutcome, HostContext, OccurrenceProposal, OperationHandle, OperationKind, ProcessView,
};
use crate::registry::{AuxState, OperatorId};
use crate::worker::WorkerState;

/// Operator of the `force-collision` policy.
#[derive(Clone, Debug)]
pub struct ForceCollisionOperator {
    id: OperatorId,
    config: Arc<BiasingConfig>,
    regions: Vec<PlacedVolume>,
    cloning: CloningOperation,
    free_flight: FreeFlightOperation,
    forced: ForcedInteractionOperation,
    splitting: Option<SplittingOperation>,
    split_products: HashMap<TrackId, u32>,
}

impl ForceCollisionOperator {
    /// Creates the operator; regions are resolved at run start.
    pub fn new(config: Arc<BiasingConfig>, id: OperatorId) -> Self {
        let free_flight = FreeFlightOperation::new(config.free_flight_weight_threshold());
        Self {
            id,
            config,
            regions: Vec::new(),
            cloning: CloningOperation::new(),
            free_flight,
            forced: ForcedInteractionOperation::new(),
            splitting: None,
            split_products: HashMap::new(),
        }
    }

    fn handle(&self, kind: OperationKind) -> OperationHandle {
        OperationHandle::new(self.id, kind)
    }

    fn kill_clone(&mut self, state: &mut WorkerState, track: &Track) -> ParticleChange {
        self.forced.abandon(track.id);
        state.registry.clear(track.id);
        state.stats.abandoned_episodes += 1;
        debug!(track = %track.id, "forced clone abandoned");
        let mut change = ParticleChange::kill();
        change.propose_weight(0.0);
        change
    }

    fn force(
        &mut self,
        state: &mut WorkerState,
        name: &str,
        track: &Track,
        step: &Step,
        ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        let level = state.registry.split_level(track.id);
        if self.splitting.is_some() && level >= self.config.max_replay_level() {
            self.forced.abandon(track.id);
            state.registry.clear(track.id);
            state.stats.replay_cap_exhaustions += 1;
            debug!(track = %track.id, level, "replay level exhausted");
            let mut change = ParticleChange::kill();
            change.propose_weight(0.0);
            return Ok(change);
        }
        let process = ctx
            .physics
            .process_mut(name)
            .ok_or_else(|| EngineError::MissingProcess(name.to_string()))?;

        let mut change = match &self.splitting {
            Some(splitting) => {
                let class = self.config.catalogue().classify(name);
                let result = splitting.split(
                    process,
                    track,
                    step,
                    class.split_mode(),
                    ParentHandling::InPlace,
                    ctx.rng,
                );
                state.stats.split_interactions += 1;
                state.stats.split_replays += u64::from(result.replays);
                state.stats.split_secondaries += u64::from(result.secondaries);
                state.stats.declined_replays += u64::from(result.declined);
                state.stats.roulette_survivals += u64::from(result.roulette_survivals);
                state.stats.roulette_kills += u64::from(result.roulette_kills);
                self.split_products.insert(track.id, level + 1);
                result.change
            }
            None => process.post_step_do_it(track, step, ctx.rng),
        };
        if change.is_declined() {
            // The clone keeps its state but still carries only `w * P`.
            change = ParticleChange::new();
        }

        let factor = self.forced.finalize(track, &mut change);
        state.registry.clear(track.id);
        state.stats.forced_interactions += 1;
        debug!(
            track = %track.id,
            process = name,
            weight_factor = factor.unwrap_or(1.0),
            "forced interaction"
        );
        Ok(change)
    }
}

impl BiasingOperator for ForceCollisionOperator {
    fn id(&self) -> OperatorId {
        self.id
    }

    fn start_run(&mut self, geometry: &dyn GeometryStore) -> Result<(), ConfigError> {
        self.regions = resolve_regions(&self.config, geometry)?;
        if !self.config.splitting_factor().is_unity() {
            self.splitting = Some(build_splitting(&self.config, geometry)?);
        }
        Ok(())
    }

    fn start_event(&mut self, _state: &mut WorkerState) {
        self.free_flight.clear();
        self.forced.clear();
        self.split_products.clear();
    }

    fn propose_non_physics(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
    ) -> Option<OperationHandle> {
        entered_region(&self.config, track)?;
        if !self.config.applies_to(track.particle)
            || track.weight <= 0.0
            || state.registry.state(track.id) != AuxState::Free
        {
            return None;
        }
        match state
            .registry
            .transition(track.id, AuxState::ToBeCloned, self.id)
        {
            Ok(_) => Some(self.handle(OperationKind::Cloning)),
            Err(err) => {
                state.violation(track.id, &err.to_string());
                None
            }
        }
    }

    fn apply_non_physics(
        &mut self,
        state: &mut WorkerState,
        handle: OperationHandle,
        track: &Track,
        _ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        if handle.kind != OperationKind::Cloning {
            return Err(EngineError::UnknownOperation(handle));
        }
        self.cloning.set_clone_weights(0.0, track.weight);
        let change = self.cloning.generate(track);
        self.free_flight.begin(track.id, track.weight);
        if let Err(err) = state
            .registry
            .transition(track.id, AuxState::ToBeFreeFlight, self.id)
        {
            state.violation(track.id, &err.to_string());
        }
        state.stats.clones += 1;
        debug!(track = %track.id, weight = track.weight, "cloned on region entry");
        Ok(change)
    }

    fn propose_occurrence(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        calling: &str,
        candidates: &[ProcessView<'_>],
        ctx: &mut HostContext<'_>,
    ) -> Option<OccurrenceProposal> {
        match state.registry.state(track.id) {
            AuxState::ToBeFreeFlight => {
                let rate = candidates
                    .iter()
                    .find(|c| c.name == calling)
                    .map_or(0.0, |c| c.rate);
                self.free_flight.record_rate(track.id, calling, rate);
                Some(OccurrenceProposal {
                    operation: self.handle(OperationKind::ForceFreeFlight),
                    interaction_length: self.free_flight.interaction_length(),
                })
            }
            AuxState::ToBeForced => {
                let key = state.registry.key(track.id)?;
                if self.forced.needs_initialisation(key, track) {
                    if self.forced.has_episode(track.id) {
                        state.stats.law_reinitialisations += 1;
                    }
                    let max_length = region_of(&self.regions, track)
                        .map_or(0.0, |volume| volume.distance_to_out(&track.position, &track.direction));
                    match self.forced.initialize(key, track, max_length, candidates, ctx.rng) {
                        Ok(draw) => {
                            if draw.clamped {
                                state.stats.clamped_samples += 1;
                            }
                            debug!(
                                track = %track.id,
                                length = draw.length,
                                max_length,
                                "forced interaction sampled"
                            );
                        }
                        Err(degeneracy) => {
                            debug!(track = %track.id, ?degeneracy, "forced episode degenerate");
                        }
                    }
                }
                Some(OccurrenceProposal {
                    operation: self.handle(OperationKind::ForcedInteraction),
                    interaction_length: self.forced.interaction_length(track.id, calling),
                })
            }
            AuxState::Free | AuxState::ToBeCloned => None,
        }
    }

    fn along_move_by(&mut self, state: &mut WorkerState, track: &Track, process: &str, length: f64) {
        match state.registry.state(track.id) {
            AuxState::ToBeFreeFlight => self.free_flight.accumulate(track.id, process, length),
            AuxState::ToBeForced => self.forced.update_for_step(track.id, track.step_number, length),
            _ => {}
        }
    }

    fn propose_final_state(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        step: &Step,
        limiting_process: Option<&str>,
    ) -> Option<OperationHandle> {
        match state.registry.state(track.id) {
            AuxState::ToBeFreeFlight if exits_region(&self.config, step) => {
                Some(self.handle(OperationKind::ForceFreeFlight))
            }
            AuxState::ToBeForced => {
                let wins = limiting_process.is_some_and(|p| self.forced.winner(track.id) == Some(p));
                let stranded = !self.forced.has_episode(track.id)
                    || exits_region(&self.config, step)
                    || !track.is_alive();
                (wins || stranded).then(|| self.handle(OperationKind::ForcedInteraction))
            }
            _ => None,
        }
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
        match handle.kind {
            OperationKind::ForceFreeFlight => {
                let Some((change, restoration)) = self.free_flight.restore(track, ctx.rng) else {
                    state.violation(track.id, "free-flight weight already restored");
                    return Ok(ParticleChange::new());
                };
                state.registry.clear(track.id);
                state.stats.free_flights_restored += 1;
                if restoration == Restoration::Killed {
                    state.stats.threshold_kills += 1;
                }
                debug!(track = %track.id, ?restoration, "free flight ended");
                Ok(change)
            }
            OperationKind::ForcedInteraction => {
                let winner = self.forced.winner(track.id).map(str::to_string);
                match (winner, process) {
                    (Some(winner), Some(process)) if winner == process => {
                        self.force(state, process, track, step, ctx)
                    }
                    _ => Ok(self.kill_clone(state, track)),
                }
            }
            _ => Err(EngineError::UnknownOperation(handle)),
        }
    }

    fn operation_applied(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        handle: Option<OperationHandle>,
        outcome: &AppliedOutcome,
    ) {
        let Some(handle) = handle else {
            return;
        };
        match handle.kind {
            OperationKind::Cloning => {
                let Some(&clone) = outcome.secondaries.first() else {
                    state.violation(track.id, "cloning produced no clone");
                    return;
                };
                state.registry.attach(clone);
                if let Err(err) = state.registry.transition(clone, AuxState::ToBeForced, self.id) {
                    state.violation(clone, &err.to_string());
                }
            }
            OperationKind::ForcedInteraction => {
                if let Some(level) = self.split_products.remove(&track.id) {
                    for &product in &outcome.secondaries {
                        state.registry.set_split_level(product, level);
                    }
                    state.registry.set_split_level(track.id, level);
                }
            }
            _ => {}
        }
    }

    fn end_tracking(&mut self, state: &mut WorkerState, track: &Track) {
        if self.free_flight.forget(track.id).is_some() {
            state.violation(track.id, "free flight ended without weight restoration");
            state.registry.clear(track.id);
        }
        if self.forced.abandon(track.id) {
            state.violation(track.id, "forced clone ended without interacting");
            state.registry.clear(track.id);
        }
        self.split_products.remove(&track.id);
    }
}
