//! Forced-interaction operation.
//!
//! Each forced clone owns one [`SharedInteractionLaw`] episode. The episode
//! is initialised at the clone's first step inside the region with the
//! rates of every candidate process, sampled once, and finished when the
//! winning process interacts (or the clone leaves the region).

use std::collections::HashMap;

use bias_core::{ParticleChange, Track, TrackId, TransportRng};

use crate::law::{LawDegeneracy, LawDraw, SharedInteractionLaw};
use crate::protocol::ProcessView;
use crate::registry::TrackKey;

#[derive(Clone, Debug)]
struct Episode {
    key: TrackKey,
    law: SharedInteractionLaw,
}

/// Forced interactions for every forced clone of one worker.
#[derive(Clone, Debug, Default)]
pub struct ForcedInteractionOperation {
    episodes: HashMap<TrackId, Episode>,
}

impl ForcedInteractionOperation {
    /// Creates the operation with no episode in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the episode for `key` must be (re)initialised:
    /// none exists, it belongs to an earlier track with the same id, or the
    /// track's momentum changed since it was sampled.
    pub fn needs_initialisation(&self, key: TrackKey, track: &Track) -> bool {
        match self.episodes.get(&key.id) {
            None => true,
            Some(episode) => {
                episode.key != key
                    || !episode.law.is_sampled()
                    || episode.law.momentum_changed(track)
            }
        }
    }

    /// Returns `true` if an episode exists for `id`.
    #[inline]
    pub fn has_episode(&self, id: TrackId) -> bool {
        self.episodes.contains_key(&id)
    }

    /// Starts an episode bounded by `max_length`, pools `candidates` and
    /// samples it.
    ///
    /// # Errors
    ///
    /// Returns the degeneracy if the episode cannot be forced; no episode
    /// is kept in that case.
    pub fn initialize(
        &mut self,
        key: TrackKey,
        track: &Track,
        max_length: f64,
        candidates: &[ProcessView<'_>],
        rng: &mut TransportRng,
    ) -> Result<LawDraw, LawDegeneracy> {
        let mut law = SharedInteractionLaw::new();
        law.initialize(track, max_length);
        for candidate in candidates {
            law.add_cross_section(candidate.name, candidate.rate);
        }
        match law.sample(rng) {
            Ok(draw) => {
                self.episodes.insert(key.id, Episode { key, law });
                Ok(draw)
            }
            Err(degeneracy) => {
                self.episodes.remove(&key.id);
                Err(degeneracy)
            }
        }
    }

    /// Interaction length reported for `process`.
    pub fn interaction_length(&self, id: TrackId, process: &str) -> f64 {
        self.episodes
            .get(&id)
            .map_or(f64::INFINITY, |episode| episode.law.remaining_length_for(process))
    }

    /// Shrinks the episode of `id` by one step.
    pub fn update_for_step(&mut self, id: TrackId, step_number: u32, length: f64) {
        if let Some(episode) = self.episodes.get_mut(&id) {
            episode.law.update_for_step(step_number, length);
        }
    }

    /// Process that must interact.
    #[inline]
    pub fn winner(&self, id: TrackId) -> Option<&str> {
        self.episodes.get(&id).and_then(|episode| episode.law.winner())
    }

    /// Interaction probability of the episode (1 if none).
    #[inline]
    pub fn weight_factor(&self, id: TrackId) -> f64 {
        self.episodes
            .get(&id)
            .map_or(1.0, |episode| episode.law.weight_factor())
    }

    /// Applies the episode's weight factor to a final state produced by the
    /// winning process, and ends the episode.
    ///
    /// The factor is applied exactly once per episode: a second call for
    /// the same track finds no episode and leaves `change` untouched.
    /// Returns the factor applied.
    pub fn finalize(&mut self, track: &Track, change: &mut ParticleChange) -> Option<f64> {
        let episode = self.episodes.remove(&track.id)?;
        let factor = episode.law.weight_factor();
        change.scale_weights(track.weight, factor);
        Some(factor)
    }

    /// Ends the episode of `id` without interacting.
    pub fn abandon(&mut self, id: TrackId) -> bool {
        self.episodes.remove(&id).is_some()
    }

    /// Drops every episode.
    pub fn clear(&mut self) {
        self.episodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TrackStateRegistry;
    use approx::assert_relative_eq;
    use bias_core::{ParticleKind, Vec3};

    fn photon() -> Track {
        Track::new(TrackId(2), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0)
            .with_weight(0.5)
    }

    fn candidates() -> [ProcessView<'static>; 2] {
        [
            ProcessView { name: "compt", rate: 0.006 },
            ProcessView { name: "phot", rate: 0.001 },
        ]
    }

    #[test]
    fn test_only_winner_gets_finite_length() {
        let mut registry = TrackStateRegistry::new();
        let track = photon();
        let key = registry.attach(track.id);
        let mut op = ForcedInteractionOperation::new();
        let mut rng = TransportRng::from_seed(4);

        assert!(op.needs_initialisation(key, &track));
        let draw = op.initialize(key, &track, 10.0, &candidates(), &mut rng).unwrap();
        assert!(!op.needs_initialisation(key, &track));

        let winner = op.winner(track.id).unwrap().to_string();
        let loser = if winner == "compt" { "phot" } else { "compt" };
        assert_eq!(op.interaction_length(track.id, &winner), draw.length);
        assert!(op.interaction_length(track.id, loser).is_infinite());
    }

    #[test]
    fn test_weight_factor_applied_once() {
        let mut registry = TrackStateRegistry::new();
        let track = photon();
        let key = registry.attach(track.id);
        let mut op = ForcedInteractionOperation::new();
        let mut rng = TransportRng::from_seed(5);
        op.initialize(key, &track, 10.0, &candidates(), &mut rng).unwrap();

        let expected = -(-0.07f64).exp_m1();
        let mut change = ParticleChange::new();
        let factor = op.finalize(&track, &mut change).unwrap();
        assert_relative_eq!(factor, expected, epsilon = 1e-15);
        assert_relative_eq!(change.weight().unwrap(), 0.5 * expected, epsilon = 1e-15);

        assert!(op.finalize(&track, &mut change).is_none());
        assert_relative_eq!(change.weight().unwrap(), 0.5 * expected, epsilon = 1e-15);
    }

    #[test]
    fn test_degenerate_episode_not_kept() {
        let mut registry = TrackStateRegistry::new();
        let track = photon();
        let key = registry.attach(track.id);
        let mut op = ForcedInteractionOperation::new();
        let mut rng = TransportRng::from_seed(6);

        assert_eq!(
            op.initialize(key, &track, 0.0, &candidates(), &mut rng),
            Err(LawDegeneracy::ZeroLength)
        );
        assert!(!op.has_episode(track.id));

        let zero = [ProcessView { name: "compt", rate: 0.0 }];
        assert_eq!(
            op.initialize(key, &track, 10.0, &zero, &mut rng),
            Err(LawDegeneracy::ZeroRate)
        );
    }

    #[test]
    fn test_stale_key_and_momentum_change_reinitialise() {
        let mut registry = TrackStateRegistry::new();
        let mut track = photon();
        let key = registry.attach(track.id);
        let mut op = ForcedInteractionOperation::new();
        let mut rng = TransportRng::from_seed(7);
        op.initialize(key, &track, 10.0, &candidates(), &mut rng).unwrap();

        registry.evict(track.id);
        let fresh = registry.attach(track.id);
        assert!(op.needs_initialisation(fresh, &track));
        assert!(!op.needs_initialisation(key, &track));

        track.direction = Vec3::x();
        assert!(op.needs_initialisation(key, &track));
    }

    #[test]
    fn test_update_shrinks_remaining_length() {
        let mut registry = TrackStateRegistry::new();
        let track = photon();
        let key = registry.attach(track.id);
        let mut op = ForcedInteractionOperation::new();
        let mut rng = TransportRng::from_seed(8);
        let draw = op.initialize(key, &track, 10.0, &candidates(), &mut rng).unwrap();
        let winner = op.winner(track.id).unwrap().to_string();

        let step = draw.length / 2.0;
        op.update_for_step(track.id, 1, step);
        op.update_for_step(track.id, 1, step);
        assert_relative_eq!(
            op.interaction_length(track.id, &winner),
            draw.length - step,
            epsilon = 1e-12
        );
    }
}
