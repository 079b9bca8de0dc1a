//! Multiplicative splitting of one interaction class.

use std::collections::HashMap;
use std::sync::Arc;

use bias_core::{GeometryStore, ParticleChange, Step, Track, TrackId};
use tracing::debug;

use super::{build_splitting, BiasingOperator};
use crate::config::{BiasingConfig, BiasingPolicy};
use crate::error::{ConfigError, EngineError};
use crate::operations::{ParentHandling, SplittingOperation};
use crate::process::SplitMode;
use crate::protocol::{AppliedOutcome, HostContext, OperationHandle, OperationKind};
use crate::registry::OperatorId;
use crate::worker::WorkerState;

/// Operator of the Compton, bremsstrahlung, pair and generic splitting
/// policies.
///
/// Interactions of the policy's class that happen inside the region are
/// replayed `N` times. Products inherit a split level one deeper than the
/// interacting track. A track already at the maximum replay level is
/// killed at its next such interaction.
#[derive(Clone, Debug)]
pub struct SplittingOperator {
    id: OperatorId,
    config: Arc<BiasingConfig>,
    splitting: SplittingOperation,
    in_flight: HashMap<TrackId, Pending>,
}

/// Final state handed to the kernel and awaiting `operation_applied`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Split { level: u32, mode: SplitMode },
    Exhausted,
}

impl SplittingOperator {
    /// Creates the operator; roulette is resolved at run start.
    pub fn new(config: Arc<BiasingConfig>, id: OperatorId) -> Self {
        let splitting = SplittingOperation::new(config.splitting_factor());
        Self {
            id,
            config,
            splitting,
            in_flight: HashMap::new(),
        }
    }

    /// Configured policy.
    #[inline]
    pub fn policy(&self) -> BiasingPolicy {
        self.config.policy()
    }
}

impl BiasingOperator for SplittingOperator {
    fn id(&self) -> OperatorId {
        self.id
    }

    fn start_run(&mut self, geometry: &dyn GeometryStore) -> Result<(), ConfigError> {
        super::resolve_regions(&self.config, geometry)?;
        self.splitting = build_splitting(&self.config, geometry)?;
        Ok(())
    }

    fn start_event(&mut self, _state: &mut WorkerState) {
        self.in_flight.clear();
    }

    fn propose_final_state(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        _step: &Step,
        limiting_process: Option<&str>,
    ) -> Option<OperationHandle> {
        let process = limiting_process?;
        if !self.config.is_region(track.volume.as_deref()) {
            return None;
        }
        let class = self.config.catalogue().classify(process);
        if !self.policy().splits(class) {
            return None;
        }
        Some(OperationHandle::new(self.id, OperationKind::Splitting))
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
        let (OperationKind::Splitting, Some(name)) = (handle.kind, process) else {
            return Err(EngineError::UnknownOperation(handle));
        };
        let level = state.registry.split_level(track.id);
        if level >= self.config.max_replay_level() {
            state.stats.replay_cap_exhaustions += 1;
            self.in_flight.insert(track.id, Pending::Exhausted);
            debug!(track = %track.id, process = name, level, "replay level exhausted");
            let mut change = ParticleChange::kill();
            change.propose_weight(0.0);
            return Ok(change);
        }
        let physics_process = ctx
            .physics
            .process_mut(name)
            .ok_or_else(|| EngineError::MissingProcess(name.to_string()))?;
        let mode = self.config.catalogue().classify(name).split_mode();
        let result = self.splitting.split(
            physics_process,
            track,
            step,
            mode,
            ParentHandling::InPlace,
            ctx.rng,
        );

        let stats = &mut state.stats;
        stats.split_interactions += 1;
        stats.split_replays += u64::from(result.replays);
        stats.split_secondaries += u64::from(result.secondaries);
        stats.declined_replays += u64::from(result.declined);
        stats.roulette_survivals += u64::from(result.roulette_survivals);
        stats.roulette_kills += u64::from(result.roulette_kills);

        let level = level + 1;
        self.in_flight.insert(track.id, Pending::Split { level, mode });
        debug!(
            track = %track.id,
            process = name,
            replays = result.replays,
            declined = result.declined,
            level,
            "interaction split"
        );
        Ok(result.change)
    }

    fn operation_applied(
        &mut self,
        state: &mut WorkerState,
        track: &Track,
        handle: Option<OperationHandle>,
        outcome: &AppliedOutcome,
    ) {
        match handle {
            Some(h) if h.kind == OperationKind::Splitting => {
                let (level, mode) = match self.in_flight.remove(&track.id) {
                    Some(Pending::Split { level, mode }) => (level, mode),
                    Some(Pending::Exhausted) => return,
                    None => {
                        state.violation(track.id, "split outcome without a split in flight");
                        return;
                    }
                };
                for &product in &outcome.secondaries {
                    state.registry.set_split_level(product, level);
                }
                if mode == SplitMode::ScatteredPrimary {
                    state.registry.set_split_level(track.id, level);
                }
            }
            _ => {
                let level = state.registry.split_level(track.id);
                if level > 0 {
                    for &product in &outcome.secondaries {
                        state.registry.set_split_level(product, level);
                    }
                }
            }
        }
    }

    fn end_tracking(&mut self, _state: &mut WorkerState, track: &Track) {
        self.in_flight.remove(&track.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bias_core::{
        BoxSolid, InteractionProcess, ParticleKind, PlacedVolume, ProcessList, Transform,
        TransportRng, Vec3, VolumeStore,
    };

    struct Scatter;

    impl InteractionProcess for Scatter {
        fn name(&self) -> &str {
            "compt"
        }

        fn applies_to(&self, particle: ParticleKind) -> bool {
            particle == ParticleKind::Gamma
        }

        fn macroscopic_cross_section(&self, _track: &Track) -> f64 {
            0.01
        }

        fn post_step_do_it(
            &mut self,
            track: &Track,
            _step: &Step,
            _rng: &mut TransportRng,
        ) -> ParticleChange {
            let mut change = ParticleChange::new();
            change.propose_energy(track.kinetic_energy * 0.8);
            change
        }
    }

    fn operator(max_replay_level: u32) -> SplittingOperator {
        let config = BiasingConfig::builder()
            .policy(BiasingPolicy::ComptonSplitting)
            .region("slab")
            .splitting_factor(4.0)
            .max_replay_level(max_replay_level)
            .build()
            .unwrap();
        let slab = PlacedVolume::new(
            "slab",
            Arc::new(BoxSolid::new(Vec3::new(50.0, 50.0, 5.0))),
            Transform::identity(),
        )
        .unwrap();
        let mut op = SplittingOperator::new(Arc::new(config), OperatorId(0));
        op.start_run(&VolumeStore::new().with_volume(slab)).unwrap();
        op
    }

    fn photon() -> Track {
        Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0).in_volume("slab")
    }

    #[test]
    fn test_only_policy_class_is_split() {
        let mut op = operator(1);
        let mut state = WorkerState::new(0);
        let track = photon();
        let step = Step::at_rest(&track, "compt");
        assert!(op.propose_final_state(&mut state, &track, &step, Some("phot")).is_none());
        assert!(op.propose_final_state(&mut state, &track, &step, None).is_none());
        assert!(op.propose_final_state(&mut state, &track, &step, Some("compt")).is_some());

        let outside = Track::new(TrackId(2), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0)
            .in_volume("world");
        assert!(op.propose_final_state(&mut state, &outside, &step, Some("compt")).is_none());
    }

    #[test]
    fn test_products_carry_deeper_level_and_cap_applies() {
        let mut op = operator(1);
        let mut state = WorkerState::new(0);
        let track = photon();
        let step = Step::at_rest(&track, "compt");
        let mut rng = TransportRng::from_seed(1);
        let mut physics = ProcessList::new().with_process(Scatter);
        let mut ctx = HostContext {
            rng: &mut rng,
            physics: &mut physics,
        };

        let handle = op.propose_final_state(&mut state, &track, &step, Some("compt")).unwrap();
        let change = op
            .apply_final_state(&mut state, handle, Some("compt"), &track, &step, &mut ctx)
            .unwrap();
        assert_eq!(change.secondaries().len(), 3);
        assert_eq!(change.weight(), Some(0.25));

        let outcome = AppliedOutcome {
            secondaries: vec![TrackId(2), TrackId(3), TrackId(4)],
            ..AppliedOutcome::default()
        };
        op.operation_applied(&mut state, &track, Some(handle), &outcome);
        assert_eq!(state.registry.split_level(TrackId(3)), 1);
        assert_eq!(state.registry.split_level(track.id), 1);

        // Already at the cap: the next Compton kills the track.
        let handle = op.propose_final_state(&mut state, &track, &step, Some("compt")).unwrap();
        let change = op
            .apply_final_state(&mut state, handle, Some("compt"), &track, &step, &mut ctx)
            .unwrap();
        assert!(change.status().is_killed());
        assert_eq!(change.weight(), Some(0.0));
        assert!(change.secondaries().is_empty());
        op.operation_applied(&mut state, &track, Some(handle), &AppliedOutcome::default());
        assert_eq!(state.stats.replay_cap_exhaustions, 1);
        assert_eq!(state.stats.split_interactions, 1);
        assert_eq!(state.stats.split_secondaries, 3);
        assert_eq!(state.stats.invariant_violations, 0);
    }

    #[test]
    fn test_missing_process_is_an_error() {
        let mut op = operator(1);
        let mut state = WorkerState::new(0);
        let track = photon();
        let step = Step::at_rest(&track, "compt");
        let mut rng = TransportRng::from_seed(1);
        let mut physics = ProcessList::new();
        let mut ctx = HostContext {
            rng: &mut rng,
            physics: &mut physics,
        };
        let handle = OperationHandle::new(OperatorId(0), OperationKind::Splitting);
        assert_eq!(
            op.apply_final_state(&mut state, handle, Some("compt"), &track, &step, &mut ctx),
            Err(EngineError::MissingProcess("compt".to_string()))
        );
    }
}
