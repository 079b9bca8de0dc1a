//! Per-worker biasing façade.
//!
//! A [`BiasingWorker`] is the single entry point a transport worker talks
//! to. It owns the operator chosen by the configuration together with all
//! mutable per-worker state, so workers never share anything while they
//! track; statistics are merged once, at the end of the run.

use std::sync::Arc;

use bias_core::{EventId, GeometryStore, ParticleChange, Step, Track, TrackId, TransportRng, Vec3};
use tracing::{debug, info, warn};

use crate::config::BiasingConfig;
use crate::error::EngineError;
use crate::gate::{AcceptanceGate, GateSample};
use crate::operators::{BiasingOperator, Operator};
use crate::protocol::{
    AppliedOutcome, HostContext, OccurrenceProposal, OperationHandle, ProcessView,
    TrackingVerdict,
};
use crate::registry::{OperatorId, TrackStateRegistry};
use crate::stats::{RunStatistics, WorkerStats};

/// Mutable state shared by the operator callbacks of one worker.
#[derive(Clone, Debug, Default)]
pub struct WorkerState {
    /// Auxiliary biasing state per track.
    pub registry: TrackStateRegistry,
    /// Counters.
    pub stats: WorkerStats,
    worker: usize,
    event: EventId,
    flagged: bool,
    audit: Vec<EventId>,
}

impl WorkerState {
    /// Creates the state of worker `worker`.
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Self::default()
        }
    }

    /// Current event.
    #[inline]
    pub fn event(&self) -> EventId {
        self.event
    }

    /// Events flagged for audit so far.
    #[inline]
    pub fn audit(&self) -> &[EventId] {
        &self.audit
    }

    /// Logs a healed invariant violation for `track`, counts it and flags
    /// the current event for audit.
    pub fn violation(&mut self, track: TrackId, what: &str) {
        warn!(
            worker = self.worker,
            event = self.event.0,
            track = %track,
            state = ?self.registry.state(track),
            "invariant violation: {what}"
        );
        self.stats.invariant_violations += 1;
        self.flagged = true;
    }

    fn begin_event(&mut self, event: EventId) {
        self.event = event;
        self.flagged = false;
        self.stats.events += 1;
        let stale = self.registry.reset_event();
        if stale > 0 {
            debug!(worker = self.worker, stale, "registry slots left from previous event");
        }
    }

    fn close_event(&mut self) {
        if self.flagged {
            self.audit.push(self.event);
            self.stats.audited_events += 1;
            self.flagged = false;
        }
    }
}

/// Biasing engine of one transport worker.
///
/// The host kernel calls the methods in protocol order: `start_run` once,
/// then for every event `start_event`, the tracking callbacks for every
/// track, and `end_event`; finally `end_run`.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use bias_core::{BoxSolid, EventId, PlacedVolume, Transform, Vec3, VolumeStore};
/// use bias_engine::config::{BiasingConfig, BiasingPolicy};
/// use bias_engine::stats::RunStatistics;
/// use bias_engine::BiasingWorker;
///
/// let slab = PlacedVolume::new(
///     "slab",
///     Arc::new(BoxSolid::new(Vec3::new(100.0, 100.0, 5.0))),
///     Transform::identity(),
/// )
/// .unwrap();
/// let geometry = VolumeStore::new().with_volume(slab);
///
/// let config = BiasingConfig::builder()
///     .policy(BiasingPolicy::ForceCollision)
///     .region("slab")
///     .build()
///     .unwrap();
///
/// let mut worker = BiasingWorker::new(Arc::new(config), 0);
/// worker.start_run(&geometry).unwrap();
/// worker.start_event(EventId(1));
/// worker.end_event();
///
/// let run = RunStatistics::new();
/// worker.end_run(&run);
/// assert_eq!(run.snapshot().stats.events, 1);
/// ```
#[derive(Clone, Debug)]
pub struct BiasingWorker {
    index: usize,
    config: Arc<BiasingConfig>,
    operator: Operator,
    state: WorkerState,
    gate: Option<AcceptanceGate>,
    started: bool,
}

impl BiasingWorker {
    /// Creates the engine of worker `index`.
    pub fn new(config: Arc<BiasingConfig>, index: usize) -> Self {
        let operator = Operator::from_config(Arc::clone(&config), OperatorId(0));
        Self {
            index,
            config,
            operator,
            state: WorkerState::new(index),
            gate: None,
            started: false,
        }
    }

    /// Worker index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Shared configuration.
    #[inline]
    pub fn config(&self) -> &BiasingConfig {
        &self.config
    }

    /// The active operator.
    #[inline]
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Per-worker state.
    #[inline]
    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Counters collected so far.
    #[inline]
    pub fn stats(&self) -> &WorkerStats {
        &self.state.stats
    }

    /// Acceptance gate, once resolved.
    #[inline]
    pub fn gate(&self) -> Option<&AcceptanceGate> {
        self.gate.as_ref()
    }

    /// Resolves region and acceptance volumes against `geometry`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an unknown volume or a solid of
    /// zero extent; the run must not start.
    pub fn start_run(&mut self, geometry: &dyn GeometryStore) -> Result<(), EngineError> {
        self.operator.start_run(geometry)?;
        self.gate = self
            .config
            .acceptance()
            .map(|acceptance| AcceptanceGate::resolve(acceptance, geometry))
            .transpose()?;
        self.started = true;
        info!(
            worker = self.index,
            policy = self.operator.name(),
            regions = ?self.config.regions(),
            particles = ?self.config.particles(),
            splitting_factor = self.config.splitting_factor().value(),
            max_replay_level = self.config.max_replay_level(),
            russian_roulette = self.config.russian_roulette(),
            acceptance = self.gate.as_ref().map(|g| g.volume_name()),
            "biasing run started"
        );
        Ok(())
    }

    /// Discards every per-event state.
    pub fn start_event(&mut self, event: EventId) {
        self.state.begin_event(event);
        self.operator.start_event(&mut self.state);
    }

    /// Draws a primary `(position, direction)` through the acceptance gate.
    ///
    /// Returns `None` when no acceptance volume is configured. Rejected
    /// trials are counted so that the source can normalise by them.
    pub fn gate_primary<F>(&mut self, rng: &mut TransportRng, draw: F) -> Option<GateSample>
    where
        F: FnMut(&mut TransportRng) -> (Vec3, Vec3),
    {
        let gate = self.gate.as_ref()?;
        let sample = gate.sample(rng, draw);
        let stats = &mut self.state.stats;
        stats.acceptance_rejections += u64::from(sample.rejected());
        match sample {
            GateSample::Accepted { rejected, .. } => {
                stats.acceptance_trials += u64::from(rejected) + 1;
            }
            GateSample::Exhausted { rejected, .. } => {
                stats.acceptance_trials += u64::from(rejected);
                stats.acceptance_exhaustions += 1;
            }
        }
        Some(sample)
    }

    /// Attaches `track` and asks the operator whether to transport it.
    pub fn start_tracking(&mut self, track: &Track) -> TrackingVerdict {
        if !self.started {
            return TrackingVerdict::Continue;
        }
        self.state.registry.attach(track.id);
        self.operator.start_tracking(&mut self.state, track)
    }

    /// Non-physics operation for the coming step.
    pub fn propose_non_physics(&mut self, track: &Track) -> Option<OperationHandle> {
        if !self.started {
            return None;
        }
        self.operator.propose_non_physics(&mut self.state, track)
    }

    /// Final state of the non-physics operation `handle`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` before `start_run` or for a foreign handle.
    pub fn apply_non_physics(
        &mut self,
        handle: OperationHandle,
        track: &Track,
        ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        self.check(handle)?;
        self.operator
            .apply_non_physics(&mut self.state, handle, track, ctx)
    }

    /// Replacement interaction length for `calling`.
    ///
    /// `candidates` lists every process applicable to the track with its
    /// current rate.
    pub fn propose_occurrence(
        &mut self,
        track: &Track,
        calling: &str,
        candidates: &[ProcessView<'_>],
        ctx: &mut HostContext<'_>,
    ) -> Option<OccurrenceProposal> {
        if !self.started {
            return None;
        }
        self.operator
            .propose_occurrence(&mut self.state, track, calling, candidates, ctx)
    }

    /// Reports that `track` moved `length` with `process` as a candidate.
    pub fn along_move_by(&mut self, track: &Track, process: &str, length: f64) {
        if self.started {
            self.operator
                .along_move_by(&mut self.state, track, process, length);
        }
    }

    /// Biased final state for the end of `step`, if any.
    ///
    /// `limiting_process` is `None` when geometry limited the step.
    pub fn propose_final_state(
        &mut self,
        track: &Track,
        step: &Step,
        limiting_process: Option<&str>,
    ) -> Option<OperationHandle> {
        if !self.started {
            return None;
        }
        self.operator
            .propose_final_state(&mut self.state, track, step, limiting_process)
    }

    /// Produces the biased final state for `handle`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` before `start_run`, for a foreign handle, or
    /// when the physics list lacks a process the operation must run.
    pub fn apply_final_state(
        &mut self,
        handle: OperationHandle,
        process: Option<&str>,
        track: &Track,
        step: &Step,
        ctx: &mut HostContext<'_>,
    ) -> Result<ParticleChange, EngineError> {
        self.check(handle)?;
        self.operator
            .apply_final_state(&mut self.state, handle, process, track, step, ctx)
    }

    /// Reports an applied interaction outcome (biased or native).
    pub fn operation_applied(
        &mut self,
        track: &Track,
        handle: Option<OperationHandle>,
        outcome: &AppliedOutcome,
    ) {
        if !self.started {
            return;
        }
        let handle = match handle {
            Some(h) if h.operator != self.operator.id() => {
                self.state
                    .violation(track.id, &format!("foreign operation handle {h}"));
                None
            }
            other => other,
        };
        self.operator
            .operation_applied(&mut self.state, track, handle, outcome);
    }

    /// Evicts the state of a finished track.
    pub fn end_tracking(&mut self, track: &Track) {
        if !self.started {
            return;
        }
        self.operator.end_tracking(&mut self.state, track);
        if let Some(last) = self.state.registry.evict(track.id) {
            if last.is_biasing() {
                self.state
                    .violation(track.id, &format!("track ended while {last:?}"));
            }
        }
    }

    /// Closes the current event.
    pub fn end_event(&mut self) {
        self.state.close_event();
    }

    /// Merges this worker's counters into the run-wide statistics.
    pub fn end_run(&mut self, run: &RunStatistics) {
        run.merge(self.index, &self.state.stats, &self.state.audit);
        info!(
            worker = self.index,
            events = self.state.stats.events,
            invariant_violations = self.state.stats.invariant_violations,
            "biasing run finished"
        );
    }

    fn check(&self, handle: OperationHandle) -> Result<(), EngineError> {
        if !self.started {
            return Err(EngineError::NotStarted);
        }
        if handle.operator != self.operator.id() {
            return Err(EngineError::UnknownOperation(handle));
        }
        Ok(())
    }
}
