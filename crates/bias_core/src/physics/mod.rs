//! Interaction-process seams.
//!
//! Physics models are external collaborators. The engine only needs to ask a
//! process for its current macroscopic cross-section and to have it sample
//! a final state, possibly several times for the same interaction point.

use crate::rng::TransportRng;
use crate::types::{ParticleChange, ParticleKind, Step, Track};

/// A discrete interaction process.
pub trait InteractionProcess: Send {
    /// Native process name (for example `"compt"` or `"eBrem"`).
    fn name(&self) -> &str;

    /// Returns `true` if the process acts on `particle`.
    fn applies_to(&self, particle: ParticleKind) -> bool;

    /// Macroscopic cross-section for the track's current state (1/mm).
    ///
    /// At-rest processes report `f64::INFINITY` once the track has stopped.
    fn macroscopic_cross_section(&self, track: &Track) -> f64;

    /// Samples the final state of an interaction at the end of `step`.
    ///
    /// May return [`ParticleChange::declined`] when the process rejects the
    /// sampled interaction point.
    fn post_step_do_it(
        &mut self,
        track: &Track,
        step: &Step,
        rng: &mut TransportRng,
    ) -> ParticleChange;

    /// Returns `true` for processes that act only on stopped particles.
    fn is_at_rest(&self) -> bool {
        false
    }
}

/// Lookup of processes by native name.
pub trait PhysicsList {
    /// Mutable access to the process called `name`.
    fn process_mut(&mut self, name: &str) -> Option<&mut dyn InteractionProcess>;

    /// Names of the processes applicable to `particle`.
    fn process_names(&self, particle: ParticleKind) -> Vec<String>;
}

/// Ordered list of boxed processes.
///
/// # Examples
///
/// ```rust
/// use bias_core::physics::{PhysicsList, ProcessList};
/// use bias_core::types::ParticleKind;
///
/// let list = ProcessList::new();
/// assert!(list.process_names(ParticleKind::Gamma).is_empty());
/// ```
#[derive(Default)]
pub struct ProcessList {
    processes: Vec<Box<dyn InteractionProcess>>,
}

impl ProcessList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a process (builder style).
    pub fn with_process<P: InteractionProcess + 'static>(mut self, process: P) -> Self {
        self.processes.push(Box::new(process));
        self
    }

    /// Appends a boxed process.
    pub fn push(&mut self, process: Box<dyn InteractionProcess>) {
        self.processes.push(process);
    }

    /// Iterates over the processes.
    pub fn iter(&self) -> impl Iterator<Item = &dyn InteractionProcess> {
        self.processes.iter().map(|p| p.as_ref())
    }

    /// Processes applicable to `particle`, in registration order.
    pub fn applicable(&self, particle: ParticleKind) -> impl Iterator<Item = &dyn InteractionProcess> {
        self.iter().filter(move |p| p.applies_to(particle))
    }

    /// Number of processes.
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Returns `true` if no process is registered.
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl std::fmt::Debug for ProcessList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processes.iter().map(|p| p.name()))
            .finish()
    }
}

impl PhysicsList for ProcessList {
    fn process_mut(&mut self, name: &str) -> Option<&mut dyn InteractionProcess> {
        self.processes
            .iter_mut()
            .find(|p| p.name() == name)
            .map(|p| p.as_mut() as &mut dyn InteractionProcess)
    }

    fn process_names(&self, particle: ParticleKind) -> Vec<String> {
        self.applicable(particle).map(|p| p.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TrackId, Vec3};

    struct Absorber;

    impl InteractionProcess for Absorber {
        fn name(&self) -> &str {
            "phot"
        }

        fn applies_to(&self, particle: ParticleKind) -> bool {
            particle.is_photon()
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
            ParticleChange::kill()
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let mut list = ProcessList::new().with_process(Absorber);
        assert_eq!(list.len(), 1);
        assert_eq!(list.process_names(ParticleKind::Gamma), vec!["phot".to_string()]);
        assert!(list.process_names(ParticleKind::Electron).is_empty());

        let track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0);
        let step = Step::at_rest(&track, "phot");
        let mut rng = TransportRng::from_seed(1);
        let process = list.process_mut("phot").unwrap();
        assert!(process
            .post_step_do_it(&track, &step, &mut rng)
            .status()
            .is_killed());
        assert!(list.process_mut("compt").is_none());
    }
}
