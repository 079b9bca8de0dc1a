//! Straight-line transport kernel for the slab world.
//!
//! The kernel owns track lifetime and drives the biasing engine through
//! the callback protocol. Per event it pops tracks from a LIFO stack and,
//! for each step of a photon:
//!
//! 1. offers a non-physics operation (cloning on region entry)
//! 2. asks every candidate process for its interaction length, letting
//!    the engine replace it
//! 3. moves the track to the nearest of the interaction point and the
//!    next boundary
//! 4. reports the move, then asks for a biased final state and falls
//!    back to native physics
//! 5. applies the outcome, stacks the secondaries and reports them
//!
//! Charged particles are not transported. Electrons deposit their kinetic
//! energy on the spot; positrons do the same and then annihilate at rest.

use std::collections::VecDeque;
use std::sync::Arc;

use bias_core::{
    EventId, ParticleChange, ParticleKind, PhysicsList, ProcessList, Step, StepPoint, StepStatus,
    Track, TrackIdAllocator, TrackStatus, TransportRng,
};
use bias_engine::stats::RunStatistics;
use bias_engine::{
    AppliedOutcome, BiasingWorker, HostContext, OperationHandle, ProcessView, TrackingVerdict,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::KernelError;
use crate::source::Source;
use crate::tally::{HistoryScore, SlabTally};
use crate::world::{SlabWorld, BOUNDARY_PUSH, DETECTOR, SLAB};

/// Photons below this kinetic energy deposit it locally (MeV).
pub const PHOTON_CUT: f64 = 1e-3;

/// Steps after which a photon is abandoned as stuck.
const MAX_STEPS: u32 = 100_000;

/// Native name of the at-rest annihilation process.
const ANNIHILATION: &str = "annihil";

/// Transport counters of one worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStats {
    /// Events run.
    pub events: u64,
    /// Events without a primary (acceptance exhaustion).
    pub skipped_events: u64,
    /// Tracks popped from the stack and transported.
    pub tracks: u64,
    /// Tracks the engine killed before transport.
    pub killed_at_start: u64,
    /// Times a track was postponed.
    pub postponements: u64,
    /// Postponed tracks tracked anyway to break a stalled cycle.
    pub forced_trackings: u64,
    /// Photon steps taken.
    pub steps: u64,
    /// Photons abandoned after too many steps.
    pub stuck_tracks: u64,
}

impl KernelStats {
    /// Adds another worker's counters.
    pub fn merge(&mut self, other: &KernelStats) {
        self.events += other.events;
        self.skipped_events += other.skipped_events;
        self.tracks += other.tracks;
        self.killed_at_start += other.killed_at_start;
        self.postponements += other.postponements;
        self.forced_trackings += other.forced_trackings;
        self.steps += other.steps;
        self.stuck_tracks += other.stuck_tracks;
    }
}

/// Transport kernel of one worker.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use bias_core::{EventId, TransportRng};
/// use bias_kernel::kernel::TransportKernel;
/// use bias_kernel::physics::{standard_physics, WATER_ELECTRON_DENSITY};
/// use bias_kernel::scenario::ScenarioConfig;
///
/// let scenario = ScenarioConfig::from_toml_str(
///     r#"
///     histories = 10
///     [slab]
///     thickness = 10.0
///     half_width = 100.0
///     [source]
///     energy = 1.0
///     position = [0.0, 0.0, -20.0]
///     direction = [0.0, 0.0, 1.0]
///     "#,
/// )
/// .unwrap();
///
/// let mut kernel = TransportKernel::new(
///     Arc::new(scenario.build_world().unwrap()),
///     standard_physics(WATER_ELECTRON_DENSITY),
///     scenario.build_source().unwrap(),
///     None,
///     TransportRng::from_seed(7),
/// );
/// kernel.start_run().unwrap();
/// for event in 0..10 {
///     kernel.run_event(EventId(event)).unwrap();
/// }
/// assert_eq!(kernel.tally().histories(), 10);
/// ```
pub struct TransportKernel {
    world: Arc<SlabWorld>,
    physics: ProcessList,
    source: Source,
    biasing: Option<BiasingWorker>,
    rng: TransportRng,
    ids: TrackIdAllocator,
    stack: Vec<Track>,
    postponed: VecDeque<Track>,
    tally: SlabTally,
    stats: KernelStats,
}

impl TransportKernel {
    /// Creates a kernel; `biasing: None` runs the unbiased reference.
    pub fn new(
        world: Arc<SlabWorld>,
        physics: ProcessList,
        source: Source,
        biasing: Option<BiasingWorker>,
        rng: TransportRng,
    ) -> Self {
        Self {
            world,
            physics,
            source,
            biasing,
            rng,
            ids: TrackIdAllocator::new(),
            stack: Vec::new(),
            postponed: VecDeque::new(),
            tally: SlabTally::new(),
            stats: KernelStats::default(),
        }
    }

    /// Scores accumulated so far.
    #[inline]
    pub fn tally(&self) -> &SlabTally {
        &self.tally
    }

    /// Transport counters.
    #[inline]
    pub fn stats(&self) -> &KernelStats {
        &self.stats
    }

    /// The biasing engine, if any.
    #[inline]
    pub fn biasing(&self) -> Option<&BiasingWorker> {
        self.biasing.as_ref()
    }

    /// Resolves the engine's volumes against the world.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Engine`] when the biasing configuration names
    /// a volume the world lacks.
    pub fn start_run(&mut self) -> Result<(), KernelError> {
        if let Some(biasing) = self.biasing.as_mut() {
            biasing.start_run(self.world.as_ref())?;
        }
        Ok(())
    }

    /// Runs one source event and scores it.
    ///
    /// Returns the event's score, or `None` when the source produced no
    /// primary.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Engine`] if the engine fails to produce a
    /// final state.
    pub fn run_event(&mut self, event: EventId) -> Result<Option<HistoryScore>, KernelError> {
        self.stats.events += 1;
        self.ids.reset();
        self.stack.clear();
        self.postponed.clear();
        if let Some(biasing) = self.biasing.as_mut() {
            biasing.start_event(event);
        }

        let id = self.ids.allocate();
        let draw = self
            .source
            .generate(self.biasing.as_mut(), &mut self.rng, id);
        self.tally.record_empty(draw.empty_trials);

        let score = match draw.primary {
            Some(primary) => {
                self.stack.push(primary);
                let mut score = HistoryScore::default();
                self.drain(&mut score)?;
                self.tally.record(&score);
                Some(score)
            }
            None => {
                self.stats.skipped_events += 1;
                debug!(event = event.0, "event without primary");
                None
            }
        };

        if let Some(biasing) = self.biasing.as_mut() {
            biasing.end_event();
        }
        Ok(score)
    }

    /// Merges the engine counters into `run` and returns the tally.
    pub fn end_run(self, run: &RunStatistics) -> (SlabTally, KernelStats) {
        if let Some(mut biasing) = self.biasing {
            biasing.end_run(run);
        }
        info!(
            events = self.stats.events,
            tracks = self.stats.tracks,
            steps = self.stats.steps,
            "transport finished"
        );
        (self.tally, self.stats)
    }

    fn drain(&mut self, score: &mut HistoryScore) -> Result<(), KernelError> {
        let mut stalled = 0usize;
        loop {
            let mut track = match self.stack.pop() {
                Some(track) => track,
                None => match self.postponed.pop_front() {
                    Some(track) => track,
                    None => return Ok(()),
                },
            };
            if track.volume.is_none() {
                track.volume = self.world.locate(&track.position).map(str::to_string);
            }

            let verdict = self
                .biasing
                .as_mut()
                .map_or(TrackingVerdict::Continue, |b| b.start_tracking(&track));
            match verdict {
                TrackingVerdict::Continue => {}
                TrackingVerdict::Kill => {
                    self.stats.killed_at_start += 1;
                    track.status = TrackStatus::StopAndKill;
                    self.end_tracking(&track);
                    stalled = 0;
                    continue;
                }
                TrackingVerdict::Postpone if stalled <= self.postponed.len() => {
                    self.stats.postponements += 1;
                    stalled += 1;
                    self.postponed.push_back(track);
                    continue;
                }
                TrackingVerdict::Postpone => {
                    self.stats.forced_trackings += 1;
                    warn!(track = %track.id, "postponed tracks made no progress, tracking anyway");
                }
            }
            stalled = 0;
            self.transport(track, score)?;
        }
    }

    fn transport(&mut self, mut track: Track, score: &mut HistoryScore) -> Result<(), KernelError> {
        self.stats.tracks += 1;
        match track.particle {
            ParticleKind::Gamma => {
                while track.is_alive() {
                    if track.step_number >= MAX_STEPS {
                        self.stats.stuck_tracks += 1;
                        warn!(track = %track.id, steps = track.step_number, "photon abandoned");
                        track.status = TrackStatus::StopAndKill;
                        break;
                    }
                    self.step(&mut track, score)?;
                }
            }
            ParticleKind::Electron | ParticleKind::Positron => self.stop_charged(&mut track, score)?,
            ParticleKind::Other(_) => track.status = TrackStatus::StopAndKill,
        }

        if track.status == TrackStatus::Suspended {
            track.status = TrackStatus::Alive;
            self.postponed.push_back(track);
            return Ok(());
        }
        self.end_tracking(&track);
        Ok(())
    }

    fn end_tracking(&mut self, track: &Track) {
        if let Some(biasing) = self.biasing.as_mut() {
            biasing.end_tracking(track);
        }
    }

    fn step(&mut self, track: &mut Track, score: &mut HistoryScore) -> Result<(), KernelError> {
        track.step_number += 1;
        self.stats.steps += 1;
        let in_matter = self.world.has_material(track.volume.as_deref());

        if track.kinetic_energy < PHOTON_CUT {
            if in_matter {
                score.deposited += track.kinetic_energy * track.weight;
            }
            track.kinetic_energy = 0.0;
            track.status = TrackStatus::StopAndKill;
            return Ok(());
        }

        let non_physics = match self.biasing.as_mut() {
            Some(biasing) => match biasing.propose_non_physics(track) {
                Some(handle) => {
                    let mut ctx = HostContext {
                        rng: &mut self.rng,
                        physics: &mut self.physics,
                    };
                    Some((handle, biasing.apply_non_physics(handle, track, &mut ctx)?))
                }
                None => None,
            },
            None => None,
        };
        if let Some((handle, change)) = non_physics {
            self.apply(track, change, Some(handle), None, in_matter, score);
            if !track.is_alive() {
                return Ok(());
            }
        }

        // Candidate processes and their interaction lengths.
        let candidates: Vec<(String, f64)> = if in_matter {
            self.physics
                .applicable(track.particle)
                .filter(|p| !p.is_at_rest())
                .map(|p| (p.name().to_string(), p.macroscopic_cross_section(track)))
                .collect()
        } else {
            Vec::new()
        };
        let views: Vec<ProcessView<'_>> = candidates
            .iter()
            .map(|(name, rate)| ProcessView { name, rate: *rate })
            .collect();
        let mut physics_length = f64::INFINITY;
        let mut winner: Option<&str> = None;
        for (name, rate) in &candidates {
            let proposal = match self.biasing.as_mut() {
                Some(biasing) => {
                    let mut ctx = HostContext {
                        rng: &mut self.rng,
                        physics: &mut self.physics,
                    };
                    biasing.propose_occurrence(track, name, &views, &mut ctx)
                }
                None => None,
            };
            let length = match proposal {
                Some(proposal) => proposal.interaction_length,
                None => self.rng.gen_exponential(*rate),
            };
            if length < physics_length {
                physics_length = length;
                winner = Some(name.as_str());
            }
        }

        let geometry_length = self.world.distance_to_boundary(
            &track.position,
            &track.direction,
            track.volume.as_deref(),
        );
        let pre = StepPoint::of(track);
        let (length, limiting) = if geometry_length <= physics_length {
            track.advance(geometry_length + BOUNDARY_PUSH);
            let volume = self.world.locate(&track.position).map(str::to_string);
            track.last_step_status = if volume.is_some() {
                StepStatus::GeomBoundary
            } else {
                StepStatus::WorldBoundary
            };
            track.volume = volume;
            (geometry_length, None)
        } else {
            track.advance(physics_length);
            track.last_step_status = StepStatus::PostStepProcess;
            (physics_length, winner.map(str::to_string))
        };

        if let Some(biasing) = self.biasing.as_mut() {
            for (name, _) in &candidates {
                biasing.along_move_by(track, name, length);
            }
        }

        let step = Step {
            pre,
            post: StepPoint::of(track),
            length,
            limiting_process: limiting.clone(),
        };
        if let Some((change, handle)) = self.final_state(track, &step, limiting.as_deref())? {
            self.apply(track, change, handle, limiting, in_matter, score);
        }

        if track.is_alive() {
            if track.particle.is_photon()
                && step.exits(SLAB)
                && track.position.z >= self.world.downstream_face()
                && track.direction.z > 0.0
            {
                score.transmitted += track.weight;
            }
            if step.post.volume.as_deref() == Some(DETECTOR)
                && step.pre.volume.as_deref() != Some(DETECTOR)
            {
                score.detected += track.weight;
            }
            if track.last_step_status == StepStatus::WorldBoundary {
                track.status = TrackStatus::StopAndKill;
            }
        }
        Ok(())
    }

    /// Deposits a charged particle's energy where it stands; positrons then
    /// annihilate at rest.
    fn stop_charged(&mut self, track: &mut Track, score: &mut HistoryScore) -> Result<(), KernelError> {
        let in_matter = self.world.has_material(track.volume.as_deref());
        if in_matter {
            score.deposited += track.kinetic_energy * track.weight;
        }
        track.kinetic_energy = 0.0;

        if track.particle == ParticleKind::Positron {
            track.step_number += 1;
            let step = Step::at_rest(track, ANNIHILATION);
            if let Some((change, handle)) = self.final_state(track, &step, Some(ANNIHILATION))? {
                self.apply(
                    track,
                    change,
                    handle,
                    Some(ANNIHILATION.to_string()),
                    in_matter,
                    score,
                );
            }
        }
        if track.is_alive() {
            track.status = TrackStatus::StopAndKill;
        }
        Ok(())
    }

    /// Biased final state if the engine proposes one, else the native one
    /// of the limiting process. `None` when geometry limited the step and
    /// nothing is to be applied.
    fn final_state(
        &mut self,
        track: &Track,
        step: &Step,
        limiting: Option<&str>,
    ) -> Result<Option<(ParticleChange, Option<OperationHandle>)>, KernelError> {
        if let Some(biasing) = self.biasing.as_mut() {
            if let Some(handle) = biasing.propose_final_state(track, step, limiting) {
                let mut ctx = HostContext {
                    rng: &mut self.rng,
                    physics: &mut self.physics,
                };
                let change = biasing.apply_final_state(handle, limiting, track, step, &mut ctx)?;
                return Ok(Some((change, Some(handle))));
            }
        }
        let Some(name) = limiting else {
            return Ok(None);
        };
        let change = match self.physics.process_mut(name) {
            Some(process) => process.post_step_do_it(track, step, &mut self.rng),
            None => {
                warn!(process = name, "limiting process missing from the physics list");
                ParticleChange::declined()
            }
        };
        Ok(Some((change, None)))
    }

    /// Applies `change` to `track`, stacks its secondaries and reports the
    /// outcome to the engine.
    fn apply(
        &mut self,
        track: &mut Track,
        mut change: ParticleChange,
        handle: Option<OperationHandle>,
        process: Option<String>,
        in_matter: bool,
        score: &mut HistoryScore,
    ) {
        if change.is_declined() {
            if let Some(biasing) = self.biasing.as_mut() {
                let outcome = AppliedOutcome {
                    status: track.status,
                    ..AppliedOutcome::default()
                };
                biasing.operation_applied(track, handle, &outcome);
            }
            return;
        }

        if in_matter {
            score.deposited += change.local_energy_deposit() * track.weight;
        }
        change.apply_to(track);

        let secondaries = change.take_secondaries();
        let mut assigned = Vec::with_capacity(secondaries.len());
        if track.status != TrackStatus::KillTrackAndSecondaries {
            for mut secondary in secondaries {
                secondary.id = self.ids.allocate();
                assigned.push(secondary.id);
                self.stack.push(secondary);
            }
        }

        if let Some(biasing) = self.biasing.as_mut() {
            let outcome = AppliedOutcome {
                secondaries: assigned,
                status: track.status,
                process,
            };
            biasing.operation_applied(track, handle, &outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{standard_physics, WATER_ELECTRON_DENSITY};
    use crate::scenario::{DetectorSettings, SlabSettings};
    use approx::assert_relative_eq;
    use bias_core::Vec3;

    fn kernel(electron_density: f64, detector: bool) -> TransportKernel {
        let slab = SlabSettings {
            thickness: 10.0,
            half_width: 100.0,
        };
        let det = DetectorSettings {
            distance: 10.0,
            thickness: 1.0,
            half_width: 100.0,
        };
        let origin = Vec3::new(0.0, 0.0, -20.0);
        let world = SlabWorld::build(&slab, detector.then_some(&det), &origin).unwrap();
        let source = Source::new(ParticleKind::Gamma, 1.0, origin, Some(Vec3::z()));
        let mut kernel = TransportKernel::new(
            Arc::new(world),
            standard_physics(electron_density),
            source,
            None,
            TransportRng::from_seed(17),
        );
        kernel.start_run().unwrap();
        kernel
    }

    #[test]
    fn test_vacuum_slab_transmits_everything() {
        // A vanishing density leaves no interaction in 10 mm.
        let mut kernel = kernel(1e-30, true);
        for event in 0..20 {
            let score = kernel.run_event(EventId(event)).unwrap().unwrap();
            assert_relative_eq!(score.transmitted, 1.0);
            assert_relative_eq!(score.detected, 1.0);
            assert_eq!(score.deposited, 0.0);
        }
        assert_eq!(kernel.stats().tracks, 20);
    }

    #[test]
    fn test_energy_is_conserved_per_history() {
        // Without a detector every photon either deposits or leaves; the
        // total deposited never exceeds the source energy.
        let mut kernel = kernel(WATER_ELECTRON_DENSITY, false);
        for event in 0..500 {
            let score = kernel.run_event(EventId(event)).unwrap().unwrap();
            assert!(score.deposited >= 0.0);
            assert!(score.deposited <= 1.0 + 1e-12);
            assert!(score.transmitted <= 1.0 + 1e-12);
        }
        let report = kernel.tally().report();
        assert_eq!(report.histories, 500);
        // About 93% of the beam crosses 10 mm of water unscattered.
        assert!(report.transmission.mean > 0.4);
        assert!(report.deposit.mean > 0.0);
    }

    #[test]
    fn test_kernel_stats_merge() {
        let mut a = KernelStats {
            events: 2,
            steps: 10,
            ..KernelStats::default()
        };
        let b = KernelStats {
            events: 3,
            postponements: 1,
            ..KernelStats::default()
        };
        a.merge(&b);
        assert_eq!(a.events, 5);
        assert_eq!(a.steps, 10);
        assert_eq!(a.postponements, 1);
    }

    #[test]
    fn test_end_run_returns_tally() {
        let mut kernel = kernel(1e-30, false);
        kernel.run_event(EventId(0)).unwrap();
        let run = RunStatistics::new();
        let (tally, stats) = kernel.end_run(&run);
        assert_eq!(tally.histories(), 1);
        assert_eq!(stats.events, 1);
        assert_eq!(run.snapshot().workers, 0);
    }
}
