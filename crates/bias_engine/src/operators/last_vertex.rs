//! Last-vertex splitting.
//!
//! Interesting interactions inside the region are recorded as vertices.
//! When a configured particle leaves the region, the vertex its lineage
//! resolves to is re-simulated `N` times from the stored snapshot; the
//! exiting track is killed and replaced by the replay products, and
//! siblings the replay regenerates are discarded when they are popped.

use std::collections::HashMap;
use std::sync::Arc;

use bias_core::{GeometryStore, ParticleChange, Step, Track, TrackId};
use tracing::debug;

use super::{build_splitting, entered_region, exits_region, resolve_regions, BiasingOperator};
use crate::config::BiasingConfig;
use crate::error::{ConfigError, EngineError};
use crate::last_vertex::{transition, ReplayEvent, ReplayState, VertexId, VertexRecorder};
use crate::operations::{ParentHandling, SplittingOperation};
use crate::process::InterestingProcess;
use crate::protocol::{AppliedOutcome, HostContext, OperationHandle, OperationKind, TrackingVerdict};
use crate::registry::OperatorId;
use crate::worker::WorkerState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReplayDecision {
    Replay(VertexId),
    Exhausted(VertexId),
}

/// Operator of the `last-vertex-splitting` policy.
#[derive(Clone, Debug)]
pub struct LastVertexOperator {
    id: OperatorId,
    config: Arc<BiasingConfig>,
    splitting: SplittingOperation,
    recorder: VertexRecorder,
    decisions: HashMap<TrackId, ReplayDecision>,
    replays: HashMap<TrackId, VertexId>,
}

impl LastVertexOperator {
    /// Creates the operator; roulette is resolved at run start.
    pub fn new(config: Arc<BiasingConfig>, id: OperatorId) -> Self {
        let splitting = SplittingOperation::new(config.splitting_factor());
        Self {
            id,
            config,
            splitting,
            recorder: VertexRecorder::new(),
            decisions: HashMap::new(),
            replays: HashMap::new(),
        }
    }

    /// Vertices and lineage of the current event.
    #[inline]
    pub fn recorder(&self) -> &VertexRecorder {
        &self.recorder
    }

    /// Applies `event` to the replay state of `id`, healing invalid pairs.
    fn step_fsm(
        &mut self,
        state: &mut WorkerState,
        id: TrackId,
        event: ReplayEvent,
        heal: ReplayState,
    ) -> ReplayState {
        let current = self.recorder.state(id);
        let next = match transition(current, event) {
            Ok(next) => next,
            Err(err) => {
                state.violation(id, &err.to_string());
                heal
            }
        };
        self.recorder.entry_mut(id).state = next;
        next
    }

    fn replay(
        &mut self,
        state: &mut WorkerState,
        vertex: VertexId,
        track: &Track,
        ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        let record = self
            .recorder
            .vertex(vertex)
            .cloned()
            .ok_or(EngineError::StaleTrackKey(track.id))?;
        let emitter = record.emitter_track();
        let step = Step::at_rest(&emitter, &record.process);
        let process = ctx
            .physics
            .process_mut(&record.process)
            .ok_or_else(|| EngineError::MissingProcess(record.process.clone()))?;
        let result = self.splitting.split(
            process,
            &emitter,
            &step,
            record.class.split_mode(),
            ParentHandling::Detached,
            ctx.rng,
        );

        let stats = &mut state.stats;
        stats.vertex_replays += 1;
        stats.split_replays += u64::from(result.replays);
        stats.split_secondaries += u64::from(result.secondaries);
        stats.declined_replays += u64::from(result.declined);
        stats.roulette_survivals += u64::from(result.roulette_survivals);
        stats.roulette_kills += u64::from(result.roulette_kills);

        self.step_fsm(state, track.id, ReplayEvent::Exit, ReplayState::Replaying);
        self.recorder.mark_replayed(vertex);
        for sibling in self.recorder.unfinished_siblings(vertex, track.id) {
            self.step_fsm(state, sibling, ReplayEvent::Discard, ReplayState::Discard);
        }
        self.replays.insert(track.id, vertex);
        debug!(
            track = %track.id,
            emitter = %record.emitter,
            process = %record.process,
            level = record.level,
            replays = result.replays,
            products = result.secondaries,
            "last vertex replayed"
        );
        Ok(result.change)
    }
}

impl BiasingOperator for LastVertexOperator {
    fn id(&self) -> OperatorId {
        self.id
    }

    fn start_run(&mut self, geometry: &dyn GeometryStore) -> Result<(), ConfigError> {
        resolve_regions(&self.config, geometry)?;
        self.splitting = build_splitting(&self.config, geometry)?;
        Ok(())
    }

    fn start_event(&mut self, _state: &mut WorkerState) {
        self.recorder.reset();
        self.decisions.clear();
        self.replays.clear();
    }

    fn start_tracking(&mut self, state: &mut WorkerState, track: &Track) -> TrackingVerdict {
        match self.step_fsm(state, track.id, ReplayEvent::Start, ReplayState::Tracking) {
            ReplayState::Discard => {
                state.stats.discarded_siblings += 1;
                debug!(track = %track.id, "sibling discarded");
                TrackingVerdict::Kill
            }
            ReplayState::SuspendedForAnnihilation { leader } => {
                state.stats.postponed_twins += 1;
                debug!(track = %track.id, leader = %leader, "annihilation twin postponed");
                TrackingVerdict::Postpone
            }
            _ => {
                let twin = self.recorder.entry(track.id).and_then(|e| e.twin);
                if let Some(twin) = twin {
                    if self.recorder.state(twin) == ReplayState::Pending {
                        self.step_fsm(
                            state,
                            twin,
                            ReplayEvent::Suspend { leader: track.id },
                            ReplayState::Pending,
                        );
                    }
                }
                TrackingVerdict::Continue
            }
        }
    }

    fn propose_non_physics(
        &mut self,
        _state: &mut WorkerState,
        track: &Track,
    ) -> Option<OperationHandle> {
        if entered_region(&self.config, track).is_some() {
            self.recorder.reset_lineage(track.id);
        }
        None
    }

    fn propose_final_state(
        &mut self,
        _state: &mut WorkerState,
        track: &Track,
        step: &Step,
        limiting_process: Option<&str>,
    ) -> Option<OperationHandle> {
        if let Some(process) = limiting_process {
            if self.config.is_region(track.volume.as_deref()) {
                let class = self.config.catalogue().classify(process);
                if self.config.is_interesting(class) {
                    self.recorder.stash(track, process, class);
                }
            }
            return None;
        }

        if !self.config.applies_to(track.particle) || !exits_region(&self.config, step) {
            return None;
        }
        let vertex = self.recorder.resolve(track.id)?;
        let record = self.recorder.vertex(vertex)?;
        if record.replayed {
            return None;
        }
        let decision = if record.level >= self.config.max_replay_level() {
            ReplayDecision::Exhausted(vertex)
        } else {
            ReplayDecision::Replay(vertex)
        };
        self.decisions.insert(track.id, decision);
        Some(OperationHandle::new(self.id, OperationKind::LastVertexReplay))
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
        if handle.kind != OperationKind::LastVertexReplay {
            return Err(EngineError::UnknownOperation(handle));
        }
        match self.decisions.remove(&track.id) {
            Some(ReplayDecision::Replay(vertex)) => self.replay(state, vertex, track, ctx),
            Some(ReplayDecision::Exhausted(vertex)) => {
                state.stats.replay_cap_exhaustions += 1;
                debug!(track = %track.id, vertex = vertex.0, "replay level exhausted");
                let mut change = ParticleChange::kill();
                change.propose_weight(0.0);
                Ok(change)
            }
            None => {
                state.violation(track.id, "replay applied without a decision");
                Ok(ParticleChange::new())
            }
        }
    }

    fn operation_applied(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        handle: Option<OperationHandle>,
        outcome: &AppliedOutcome,
    ) {
        if handle.is_some_and(|h| h.kind == OperationKind::LastVertexReplay) {
            if let Some(vertex) = self.replays.remove(&track.id) {
                self.recorder
                    .adopt_replay_products(vertex, &outcome.secondaries);
            }
            return;
        }

        let process = outcome.process.as_deref();
        if self
            .recorder
            .commit(track.id, process, &outcome.secondaries)
            .is_some()
        {
            state.stats.vertices_recorded += 1;
        }
        let annihilation = process.is_some_and(|p| {
            self.config.catalogue().classify(p) == InterestingProcess::Annihilation
        });
        if let (true, [first, second]) = (annihilation, outcome.secondaries.as_slice()) {
            self.recorder.pair_twins(*first, *second);
        }
    }

    fn end_tracking(&mut self, state: &mut WorkerState, track: &Track) {
        let ended = self.step_fsm(
            state,
            track.id,
            ReplayEvent::End,
            ReplayState::Finished { replayed: false },
        );
        let replayed = ended == (ReplayState::Finished { replayed: true });
        let twin = self.recorder.entry(track.id).and_then(|e| e.twin);
        if let Some(twin) = twin {
            if self.recorder.state(twin)
                == (ReplayState::SuspendedForAnnihilation { leader: track.id })
            {
                let event = if replayed {
                    ReplayEvent::Discard
                } else {
                    ReplayEvent::Resume
                };
                self.step_fsm(state, twin, event, ReplayState::Pending);
            }
        }
        self.decisions.remove(&track.id);
        self.replays.remove(&track.id);
    }
}
