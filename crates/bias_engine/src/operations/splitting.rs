//! Multiplicative splitting.
//!
//! One interaction is replayed `n` times from the same pre-interaction
//! state, with `n = k + Bernoulli(f)` for a splitting factor `N = k + f`.
//! Every product carries `w / N`, so the expected total weight equals the
//! weight that entered the interaction. Local deposits are averaged over
//! the replays for the same reason.
//!
//! Replays the process declines are counted and not retried. Products of
//! the configured particles then play angular Russian roulette.

use bias_core::{
    InteractionProcess, Kinematics, ParticleChange, ParticleKind, Step, Track, TransportRng,
};

use crate::config::SplittingFactor;
use crate::process::SplitMode;
use crate::roulette::{AngularRoulette, RouletteOutcome};

/// What happens to the interacting track's own replayed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentHandling {
    /// The interacting track continues as one of the replays.
    InPlace,
    /// The interacting track is not continued; replayed states of the
    /// emitter become new tracks and local deposits are dropped. Used when
    /// a recorded vertex is re-simulated.
    Detached,
}

/// Final state and counters of one split interaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplitResult {
    /// Combined final state.
    pub change: ParticleChange,
    /// Replays attempted.
    pub replays: u32,
    /// Replays the process declined.
    pub declined: u32,
    /// Tracks emitted (after roulette).
    pub secondaries: u32,
    /// Off-region products that survived roulette.
    pub roulette_survivals: u32,
    /// Products killed by roulette.
    pub roulette_kills: u32,
}

/// Multiplicative splitting with optional angular roulette.
///
/// # Examples
///
/// ```rust
/// use bias_engine::config::SplittingFactor;
/// use bias_engine::operations::SplittingOperation;
/// use bias_core::TransportRng;
///
/// let splitting = SplittingOperation::new(SplittingFactor::new(2.5).unwrap());
/// let mut rng = TransportRng::from_seed(1);
/// let n = splitting.replay_count(&mut rng);
/// assert!(n == 2 || n == 3);
/// ```
#[derive(Clone, Debug)]
pub struct SplittingOperation {
    factor: SplittingFactor,
    roulette: Option<AngularRoulette>,
    roulette_particles: Vec<ParticleKind>,
}

impl SplittingOperation {
    /// Creates a splitting operation without roulette.
    pub fn new(factor: SplittingFactor) -> Self {
        Self {
            factor,
            roulette: None,
            roulette_particles: Vec::new(),
        }
    }

    /// Adds angular roulette for products of `particles`.
    pub fn with_roulette(mut self, roulette: AngularRoulette, particles: &[ParticleKind]) -> Self {
        self.roulette = Some(roulette);
        self.roulette_particles = particles.to_vec();
        self
    }

    /// Splitting factor `N`.
    #[inline]
    pub fn factor(&self) -> SplittingFactor {
        self.factor
    }

    /// Roulette, if enabled.
    #[inline]
    pub fn roulette(&self) -> Option<&AngularRoulette> {
        self.roulette.as_ref()
    }

    /// Number of replays for one interaction: `k + Bernoulli(f)`.
    pub fn replay_count(&self, rng: &mut TransportRng) -> u32 {
        let fraction = self.factor.fraction();
        let extra = fraction > 0.0 && rng.gen_bool(fraction);
        self.factor.whole() + u32::from(extra)
    }

    /// Replays `process` for `track` and combines the replays into one
    /// final state.
    ///
    /// In [`SplitMode::ScatteredPrimary`] the track continues (in place) as
    /// its first accepted replay at `w/N` and every further surviving
    /// replay becomes a new track of the same particle. In
    /// [`SplitMode::SecondariesOnly`] the track continues as its first
    /// accepted replay with its weight unchanged; only the products are
    /// split. If every replay is declined the final state is declined too.
    pub fn split(
        &self,
        process: &mut dyn InteractionProcess,
        track: &Track,
        step: &Step,
        mode: SplitMode,
        handling: ParentHandling,
        rng: &mut TransportRng,
    ) -> SplitResult {
        let n_factor = self.factor.value();
        let split_weight = track.weight / n_factor;
        let replays = self.replay_count(rng);

        let mut result = SplitResult {
            replays,
            ..SplitResult::default()
        };
        let mut change = ParticleChange::new();
        let mut parent_taken = false;
        let mut deposit = 0.0;
        let mut products = Vec::new();

        for _ in 0..replays {
            let mut replay = process.post_step_do_it(track, step, rng);
            if replay.is_declined() {
                result.declined += 1;
                continue;
            }
            deposit += replay.local_energy_deposit();
            for mut secondary in replay.take_secondaries() {
                secondary.weight = split_weight;
                products.push(secondary);
            }

            let emitter = replayed_kinematics(track, &replay);
            let alive = !replay.status().is_killed();
            match handling {
                ParentHandling::InPlace if !parent_taken => {
                    parent_taken = true;
                    copy_parent_state(&replay, &mut change);
                    if mode == SplitMode::ScatteredPrimary {
                        change.propose_weight(split_weight);
                    }
                }
                ParentHandling::InPlace => {
                    if mode == SplitMode::ScatteredPrimary && alive {
                        products.push(self.sibling(track, emitter, split_weight, step));
                    }
                }
                ParentHandling::Detached => {
                    parent_taken = true;
                    if mode == SplitMode::ScatteredPrimary && alive {
                        products.push(self.sibling(track, emitter, split_weight, step));
                    }
                }
            }
        }

        if !parent_taken {
            let mut declined = ParticleChange::declined();
            declined.propose_weight(track.weight);
            result.change = declined;
            return result;
        }

        if handling == ParentHandling::Detached {
            change = ParticleChange::kill();
            change.propose_weight(0.0);
        } else {
            change.propose_local_energy_deposit(deposit / n_factor);
            if mode == SplitMode::ScatteredPrimary && !change.status().is_killed() {
                self.play_parent_roulette(track, &mut change, &mut result, rng);
            }
        }

        for mut product in products {
            if self.plays_roulette(product.particle) {
                if let Some(roulette) = &self.roulette {
                    match roulette.apply(&mut product, rng) {
                        RouletteOutcome::Accepted => {}
                        RouletteOutcome::Survived { .. } => result.roulette_survivals += 1,
                        RouletteOutcome::Killed => {
                            result.roulette_kills += 1;
                            continue;
                        }
                    }
                }
            }
            result.secondaries += 1;
            change.add_secondary(product);
        }

        result.change = change;
        result
    }

    fn plays_roulette(&self, particle: ParticleKind) -> bool {
        self.roulette.is_some() && self.roulette_particles.contains(&particle)
    }

    fn play_parent_roulette(
        &self,
        track: &Track,
        change: &mut ParticleChange,
        result: &mut SplitResult,
        rng: &mut TransportRng,
    ) {
        if !self.plays_roulette(track.particle) {
            return;
        }
        let Some(roulette) = &self.roulette else {
            return;
        };
        let direction = change.direction().unwrap_or(track.direction);
        match roulette.play(&track.position, &direction, rng) {
            RouletteOutcome::Accepted => {}
            RouletteOutcome::Survived { multiplier } => {
                result.roulette_survivals += 1;
                let weight = change.weight().unwrap_or(track.weight);
                change.propose_weight(weight * multiplier);
            }
            RouletteOutcome::Killed => {
                result.roulette_kills += 1;
                change.propose_status(bias_core::TrackStatus::StopAndKill);
                change.propose_weight(0.0);
            }
        }
    }

    fn sibling(&self, track: &Track, kinematics: Kinematics, weight: f64, step: &Step) -> Track {
        let creator = step.limiting_process.as_deref().unwrap_or("splitting");
        Track::secondary(track, track.particle, kinematics, weight, creator)
    }
}

fn replayed_kinematics(track: &Track, replay: &ParticleChange) -> Kinematics {
    let mut kinematics = track.kinematics();
    if let Some(energy) = replay.energy() {
        kinematics.kinetic_energy = energy;
    }
    if let Some(direction) = replay.direction() {
        kinematics.direction = direction;
    }
    if let Some(polarization) = replay.polarization() {
        kinematics.polarization = polarization;
    }
    kinematics
}

fn copy_parent_state(replay: &ParticleChange, change: &mut ParticleChange) {
    change.propose_status(replay.status());
    if let Some(energy) = replay.energy() {
        change.propose_energy(energy);
    }
    if let Some(direction) = replay.direction() {
        change.propose_direction(direction);
    }
    if let Some(polarization) = replay.polarization() {
        change.propose_polarization(polarization);
    }
    if let Some(weight) = replay.weight() {
        change.propose_weight(weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roulette::{BiasCone, SurvivalRegion};
    use approx::assert_relative_eq;
    use bias_core::{StepPoint, TrackId, TrackStatus, Vec3};
    use proptest::prelude::*;

    /// Scatters into a random direction with half the energy and emits one
    /// electron; deposits 0.1 MeV. Declines every `decline_every`-th call.
    struct Scatter {
        calls: u32,
        decline_every: Option<u32>,
    }

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
            rng: &mut TransportRng,
        ) -> ParticleChange {
            self.calls += 1;
            if let Some(every) = self.decline_every {
                if self.calls % every == 0 {
                    return ParticleChange::declined();
                }
            }
            let mut change = ParticleChange::new();
            change.propose_energy(track.kinetic_energy / 2.0);
            change.propose_direction(rng.isotropic_direction());
            change.propose_local_energy_deposit(0.1);
            change.add_secondary(Track::secondary(
                track,
                ParticleKind::Electron,
                track.kinematics(),
                track.weight,
                "compt",
            ));
            change
        }
    }

    fn scatter() -> Scatter {
        Scatter {
            calls: 0,
            decline_every: None,
        }
    }

    fn photon(weight: f64) -> (Track, Step) {
        let track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0)
            .with_weight(weight)
            .in_volume("slab");
        let point = StepPoint::of(&track);
        let step = Step {
            pre: point.clone(),
            post: point,
            length: 1.0,
            limiting_process: Some("compt".to_string()),
        };
        (track, step)
    }

    fn splitting(factor: f64) -> SplittingOperation {
        SplittingOperation::new(SplittingFactor::new(factor).unwrap())
    }

    fn total_weight(track: &Track, change: &ParticleChange) -> (f64, usize) {
        let photons: Vec<_> = change
            .secondaries()
            .iter()
            .filter(|t| t.particle == ParticleKind::Gamma)
            .collect();
        let parent = change.weight().unwrap_or(track.weight);
        (
            parent + photons.iter().map(|t| t.weight).sum::<f64>(),
            photons.len() + 1,
        )
    }

    #[test]
    fn test_integer_factor_conserves_weight() {
        let (track, step) = photon(0.8);
        let mut rng = TransportRng::from_seed(1);
        let result = splitting(4.0).split(
            &mut scatter(),
            &track,
            &step,
            SplitMode::ScatteredPrimary,
            ParentHandling::InPlace,
            &mut rng,
        );
        assert_eq!(result.replays, 4);
        let (photon_weight, photons) = total_weight(&track, &result.change);
        assert_eq!(photons, 4);
        assert_relative_eq!(photon_weight, 0.8, epsilon = 1e-14);
        let electrons = result
            .change
            .secondaries()
            .iter()
            .filter(|t| t.particle == ParticleKind::Electron)
            .count();
        assert_eq!(electrons, 4);
        assert_relative_eq!(result.change.local_energy_deposit(), 0.1, epsilon = 1e-14);
        assert_eq!(result.secondaries, 7);
    }

    #[test]
    fn test_secondaries_only_keeps_parent_weight() {
        let (track, step) = photon(0.6);
        let mut rng = TransportRng::from_seed(2);
        let result = splitting(3.0).split(
            &mut scatter(),
            &track,
            &step,
            SplitMode::SecondariesOnly,
            ParentHandling::InPlace,
            &mut rng,
        );
        assert_eq!(result.change.weight(), None);
        assert_eq!(result.change.secondaries().len(), 3);
        for product in result.change.secondaries() {
            assert_relative_eq!(product.weight, 0.2, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_declined_replays_are_not_retried() {
        let (track, step) = photon(1.0);
        let mut rng = TransportRng::from_seed(3);
        let mut process = Scatter {
            calls: 0,
            decline_every: Some(2),
        };
        let result = splitting(4.0).split(
            &mut process,
            &track,
            &step,
            SplitMode::ScatteredPrimary,
            ParentHandling::InPlace,
            &mut rng,
        );
        assert_eq!(process.calls, 4);
        assert_eq!(result.declined, 2);
        let (weight, photons) = total_weight(&track, &result.change);
        assert_eq!(photons, 2);
        assert_relative_eq!(weight, 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_all_declined_leaves_parent_unchanged() {
        let (track, step) = photon(1.0);
        let mut rng = TransportRng::from_seed(4);
        let mut process = Scatter {
            calls: 0,
            decline_every: Some(1),
        };
        let result = splitting(3.0).split(
            &mut process,
            &track,
            &step,
            SplitMode::ScatteredPrimary,
            ParentHandling::InPlace,
            &mut rng,
        );
        assert!(result.change.is_declined());
        assert_eq!(result.change.weight(), Some(1.0));
        assert!(result.change.secondaries().is_empty());
        assert_eq!(result.declined, 3);
    }

    #[test]
    fn test_detached_kills_parent_and_drops_deposit() {
        let (track, step) = photon(0.9);
        let mut rng = TransportRng::from_seed(5);
        let result = splitting(3.0).split(
            &mut scatter(),
            &track,
            &step,
            SplitMode::ScatteredPrimary,
            ParentHandling::Detached,
            &mut rng,
        );
        assert_eq!(result.change.status(), TrackStatus::StopAndKill);
        assert_eq!(result.change.weight(), Some(0.0));
        assert_eq!(result.change.local_energy_deposit(), 0.0);
        let photons: f64 = result
            .change
            .secondaries()
            .iter()
            .filter(|t| t.particle == ParticleKind::Gamma)
            .map(|t| t.weight)
            .sum();
        assert_relative_eq!(photons, 0.9, epsilon = 1e-14);
    }

    #[test]
    fn test_fractional_factor_expectation() {
        let (track, step) = photon(1.0);
        let mut rng = TransportRng::from_seed(6);
        let op = splitting(2.5);
        let n = 10_000;
        let mut replays = 0u64;
        let mut weight = 0.0;
        for _ in 0..n {
            let result = op.split(
                &mut scatter(),
                &track,
                &step,
                SplitMode::ScatteredPrimary,
                ParentHandling::InPlace,
                &mut rng,
            );
            replays += u64::from(result.replays);
            weight += total_weight(&track, &result.change).0;
        }
        // Per-trial sd is 0.5 replays and 0.2 weight.
        assert_relative_eq!(replays as f64 / n as f64, 2.5, epsilon = 0.02);
        assert_relative_eq!(weight / n as f64, 1.0, epsilon = 0.008);
    }

    #[test]
    fn test_roulette_preserves_expected_weight() {
        let (track, step) = photon(1.0);
        let mut rng = TransportRng::from_seed(7);
        let cone = BiasCone::new(Vec3::z(), 30.0).unwrap();
        let op = splitting(5.0).with_roulette(
            AngularRoulette::new(SurvivalRegion::Cone(cone), 5.0),
            &[ParticleKind::Gamma],
        );
        let n = 20_000;
        let mut weight = 0.0;
        let mut kills = 0;
        for _ in 0..n {
            let result = op.split(
                &mut scatter(),
                &track,
                &step,
                SplitMode::ScatteredPrimary,
                ParentHandling::InPlace,
                &mut rng,
            );
            kills += result.roulette_kills;
            let photons: f64 = result
                .change
                .secondaries()
                .iter()
                .filter(|t| t.particle == ParticleKind::Gamma)
                .map(|t| t.weight)
                .sum();
            weight += photons + result.change.weight().unwrap_or(0.0);
            for electron in result
                .change
                .secondaries()
                .iter()
                .filter(|t| t.particle == ParticleKind::Electron)
            {
                assert_relative_eq!(electron.weight, 0.2, epsilon = 1e-15);
            }
        }
        assert!(kills > 0);
        assert_relative_eq!(weight / n as f64, 1.0, epsilon = 0.03);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_replay_count_brackets_factor(factor in 1.0f64..20.0, seed in 0u64..10_000) {
            let op = splitting(factor);
            let mut rng = TransportRng::from_seed(seed);
            let n = op.replay_count(&mut rng);
            prop_assert!(n == op.factor().whole() || n == op.factor().whole() + 1);
            prop_assert!(f64::from(n) >= factor.floor());
            prop_assert!(f64::from(n) <= factor.ceil());
        }
    }
}
