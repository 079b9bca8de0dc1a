//! Shared fixtures for bias_engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bias_core::{
    BoxSolid, InteractionProcess, ParticleChange, ParticleKind, PlacedVolume, Step, Track,
    TrackId, TransportRng, Transform, Vec3, VolumeStore,
};

/// Compton-like scatter: random energy loss and direction, one electron.
pub struct ToyCompton;

impl InteractionProcess for ToyCompton {
    fn name(&self) -> &str {
        "compt"
    }

    fn applies_to(&self, particle: ParticleKind) -> bool {
        particle == ParticleKind::Gamma
    }

    fn macroscopic_cross_section(&self, _track: &Track) -> f64 {
        0.009
    }

    fn post_step_do_it(
        &mut self,
        track: &Track,
        _step: &Step,
        rng: &mut TransportRng,
    ) -> ParticleChange {
        let fraction = 0.3 + 0.6 * rng.gen_uniform();
        let scattered = track.kinetic_energy * fraction;
        let mut change = ParticleChange::new();
        change.propose_energy(scattered);
        change.propose_direction(rng.isotropic_direction());

        let mut electron = track.kinematics();
        electron.kinetic_energy = track.kinetic_energy - scattered;
        change.add_secondary(Track::secondary(
            track,
            ParticleKind::Electron,
            electron,
            track.weight,
            "compt",
        ));
        change
    }
}

/// Absorption that deposits the full energy locally.
pub struct ToyAbsorber;

impl InteractionProcess for ToyAbsorber {
    fn name(&self) -> &str {
        "phot"
    }

    fn applies_to(&self, particle: ParticleKind) -> bool {
        particle == ParticleKind::Gamma
    }

    fn macroscopic_cross_section(&self, _track: &Track) -> f64 {
        0.001
    }

    fn post_step_do_it(
        &mut self,
        track: &Track,
        _step: &Step,
        _rng: &mut TransportRng,
    ) -> ParticleChange {
        let mut change = ParticleChange::kill();
        change.propose_local_energy_deposit(track.kinetic_energy);
        change
    }
}

/// A process that rejects every sampled interaction.
pub struct AlwaysDeclines;

impl InteractionProcess for AlwaysDeclines {
    fn name(&self) -> &str {
        "compt"
    }

    fn applies_to(&self, _particle: ParticleKind) -> bool {
        true
    }

    fn macroscopic_cross_section(&self, _track: &Track) -> f64 {
        0.01
    }

    fn post_step_do_it(
        &mut self,
        _track: &Track,
        _step: &Step,
        _rng: &mut TransportRng,
    ) -> ParticleChange {
        ParticleChange::declined()
    }
}

/// A 100 x 100 x 10 mm slab centred on the origin.
pub fn slab_geometry() -> VolumeStore {
    let slab = PlacedVolume::new(
        "slab",
        Arc::new(BoxSolid::new(Vec3::new(50.0, 50.0, 5.0))),
        Transform::identity(),
    )
    .unwrap();
    VolumeStore::new().with_volume(slab)
}

/// A 1 MeV photon inside the slab heading along +z.
pub fn photon(id: u32) -> Track {
    Track::new(TrackId(id), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0).in_volume("slab")
}
