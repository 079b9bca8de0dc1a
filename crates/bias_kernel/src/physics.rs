//! Photon physics collaborators for the water slab.
//!
//! Four processes, enough to exercise every biasing class:
//! - `compt`: Klein–Nishina Compton scattering off free electrons
//! - `phot`: photoelectric absorption with a `E^-3` rate
//! - `conv`: pair production above `2 m_e c^2`
//! - `annihil`: at-rest positron annihilation into two photons
//!
//! Charged particles are not transported; the kernel deposits their
//! kinetic energy where they are born.

use bias_core::types::ELECTRON_MASS;
use bias_core::{
    InteractionProcess, ParticleChange, ParticleKind, ProcessList, Step, Track, TransportRng,
    Vec3,
};

/// Electron density of liquid water (electrons/mm³).
pub const WATER_ELECTRON_DENSITY: f64 = 3.343e20;

/// Classical electron radius (mm).
pub const CLASSICAL_ELECTRON_RADIUS: f64 = 2.817_940_3e-12;

/// Pair-production threshold (MeV).
pub const PAIR_THRESHOLD: f64 = 2.0 * ELECTRON_MASS;

/// Upper bound on the photoelectric rate (1/mm).
const PHOTO_RATE_CAP: f64 = 10.0;

/// Klein–Nishina cross-section per free electron (mm²).
pub fn klein_nishina_cross_section(energy: f64) -> f64 {
    if energy <= 0.0 {
        return 0.0;
    }
    let k = energy / ELECTRON_MASS;
    let thomson = 8.0 / 3.0 * std::f64::consts::PI * CLASSICAL_ELECTRON_RADIUS.powi(2);
    if k < 1e-3 {
        return thomson * (1.0 - 2.0 * k);
    }
    let l = (1.0 + 2.0 * k).ln();
    let a = (1.0 + k) / (k * k) * (2.0 * (1.0 + k) / (1.0 + 2.0 * k) - l / k);
    let b = l / (2.0 * k);
    let c = (1.0 + 3.0 * k) / (1.0 + 2.0 * k).powi(2);
    2.0 * std::f64::consts::PI * CLASSICAL_ELECTRON_RADIUS.powi(2) * (a + b - c)
}

/// Expresses the local direction `v` (z along `axis`) in the global frame.
pub fn rotate_to(axis: &Vec3, v: Vec3) -> Vec3 {
    let perp = (axis.x * axis.x + axis.y * axis.y).sqrt();
    if perp > 0.0 {
        Vec3::new(
            (axis.x * axis.z * v.x - axis.y * v.y) / perp + axis.x * v.z,
            (axis.y * axis.z * v.x + axis.x * v.y) / perp + axis.y * v.z,
            -perp * v.x + axis.z * v.z,
        )
    } else if axis.z < 0.0 {
        Vec3::new(-v.x, v.y, -v.z)
    } else {
        v
    }
}

fn polar(cos_theta: f64, phi: f64) -> Vec3 {
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Klein–Nishina Compton scattering.
#[derive(Clone, Debug)]
pub struct ComptonScattering {
    electron_density: f64,
}

impl ComptonScattering {
    /// Compton scattering in a medium of `electron_density` (1/mm³).
    pub fn new(electron_density: f64) -> Self {
        Self { electron_density }
    }

    /// Samples `ε = E'/E` (Butcher & Messel composition-rejection).
    fn sample_epsilon(k: f64, rng: &mut TransportRng) -> (f64, f64) {
        let eps0 = 1.0 / (1.0 + 2.0 * k);
        let eps0_sq = eps0 * eps0;
        let alpha1 = -eps0.ln();
        let alpha2 = alpha1 + 0.5 * (1.0 - eps0_sq);
        loop {
            let (eps, eps_sq) = if alpha1 > alpha2 * rng.gen_uniform() {
                let eps = (-alpha1 * rng.gen_uniform()).exp();
                (eps, eps * eps)
            } else {
                let eps_sq = eps0_sq + (1.0 - eps0_sq) * rng.gen_uniform();
                (eps_sq.sqrt(), eps_sq)
            };
            let one_minus_cos = (1.0 - eps) / (eps * k);
            let sin_sq = one_minus_cos * (2.0 - one_minus_cos);
            let rejection = 1.0 - eps * sin_sq / (1.0 + eps_sq);
            if rejection >= rng.gen_uniform() {
                return (eps, 1.0 - one_minus_cos);
            }
        }
    }
}

impl InteractionProcess for ComptonScattering {
    fn name(&self) -> &str {
        "compt"
    }

    fn applies_to(&self, particle: ParticleKind) -> bool {
        particle == ParticleKind::Gamma
    }

    fn macroscopic_cross_section(&self, track: &Track) -> f64 {
        self.electron_density * klein_nishina_cross_section(track.kinetic_energy)
    }

    fn post_step_do_it(
        &mut self,
        track: &Track,
        _step: &Step,
        rng: &mut TransportRng,
    ) -> ParticleChange {
        let energy = track.kinetic_energy;
        let (eps, cos_theta) = Self::sample_epsilon(energy / ELECTRON_MASS, rng);
        let phi = 2.0 * std::f64::consts::PI * rng.gen_uniform();
        let scattered = rotate_to(&track.direction, polar(cos_theta, phi));

        let photon_energy = eps * energy;
        let mut change = ParticleChange::new();
        change.propose_energy(photon_energy);
        change.propose_direction(scattered);

        let mut electron = track.kinematics();
        electron.kinetic_energy = energy - photon_energy;
        electron.direction = track.direction * energy - scattered * photon_energy;
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

/// Photoelectric absorption; the photon's energy goes to one electron.
#[derive(Clone, Debug, Default)]
pub struct PhotoElectric;

impl InteractionProcess for PhotoElectric {
    fn name(&self) -> &str {
        "phot"
    }

    fn applies_to(&self, particle: ParticleKind) -> bool {
        particle == ParticleKind::Gamma
    }

    fn macroscopic_cross_section(&self, track: &Track) -> f64 {
        if track.kinetic_energy <= 0.0 {
            return 0.0;
        }
        (2.8e-4 * (0.1 / track.kinetic_energy).powi(3)).min(PHOTO_RATE_CAP)
    }

    fn post_step_do_it(
        &mut self,
        track: &Track,
        _step: &Step,
        _rng: &mut TransportRng,
    ) -> ParticleChange {
        let mut change = ParticleChange::kill();
        change.add_secondary(Track::secondary(
            track,
            ParticleKind::Electron,
            track.kinematics(),
            track.weight,
            "phot",
        ));
        change
    }
}

/// Pair production; the pair is emitted along the photon.
#[derive(Clone, Debug, Default)]
pub struct PairProduction;

impl InteractionProcess for PairProduction {
    fn name(&self) -> &str {
        "conv"
    }

    fn applies_to(&self, particle: ParticleKind) -> bool {
        particle == ParticleKind::Gamma
    }

    fn macroscopic_cross_section(&self, track: &Track) -> f64 {
        if track.kinetic_energy <= PAIR_THRESHOLD {
            return 0.0;
        }
        1e-4 * (1.0 - PAIR_THRESHOLD / track.kinetic_energy)
    }

    fn post_step_do_it(
        &mut self,
        track: &Track,
        _step: &Step,
        rng: &mut TransportRng,
    ) -> ParticleChange {
        let available = (track.kinetic_energy - PAIR_THRESHOLD).max(0.0);
        let share = rng.gen_uniform();
        let mut change = ParticleChange::kill();
        for (particle, energy) in [
            (ParticleKind::Electron, share * available),
            (ParticleKind::Positron, (1.0 - share) * available),
        ] {
            let mut kinematics = track.kinematics();
            kinematics.kinetic_energy = energy;
            change.add_secondary(Track::secondary(
                track,
                particle,
                kinematics,
                track.weight,
                "conv",
            ));
        }
        change
    }
}

/// Two-photon annihilation of a stopped positron.
#[derive(Clone, Debug, Default)]
pub struct Annihilation;

impl InteractionProcess for Annihilation {
    fn name(&self) -> &str {
        "annihil"
    }

    fn applies_to(&self, particle: ParticleKind) -> bool {
        particle == ParticleKind::Positron
    }

    fn macroscopic_cross_section(&self, track: &Track) -> f64 {
        if track.kinetic_energy > 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    }

    fn post_step_do_it(
        &mut self,
        track: &Track,
        _step: &Step,
        rng: &mut TransportRng,
    ) -> ParticleChange {
        let direction = rng.isotropic_direction();
        let mut change = ParticleChange::kill();
        for sign in [1.0, -1.0] {
            let mut kinematics = track.kinematics();
            kinematics.kinetic_energy = ELECTRON_MASS;
            kinematics.direction = direction * sign;
            change.add_secondary(Track::secondary(
                track,
                ParticleKind::Gamma,
                kinematics,
                track.weight,
                "annihil",
            ));
        }
        change
    }

    fn is_at_rest(&self) -> bool {
        true
    }
}

/// The four processes for a medium of `electron_density`.
pub fn standard_physics(electron_density: f64) -> ProcessList {
    ProcessList::new()
        .with_process(ComptonScattering::new(electron_density))
        .with_process(PhotoElectric)
        .with_process(PairProduction)
        .with_process(Annihilation)
}
