//! Integration tests for processes that decline their sampled interaction.
//!
//! A declining process leaves the photon untouched, so every history must
//! transmit its full weight whether or not the interaction was forced.

mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use bias_core::{
    EventId, InteractionProcess, ParticleChange, ParticleKind, ProcessList, Step, Track,
    TransportRng,
};
use bias_engine::stats::RunStatistics;
use bias_engine::BiasingWorker;
use bias_kernel::tally::SlabTally;
use bias_kernel::TransportKernel;

use common::pencil_beam;

const HISTORIES: u64 = 200;

/// Compton stand-in with a flat rate that rejects every interaction point.
struct RejectingCompton;

impl InteractionProcess for RejectingCompton {
    fn name(&self) -> &str {
        "compt"
    }

    fn applies_to(&self, particle: ParticleKind) -> bool {
        particle == ParticleKind::Gamma
    }

    fn macroscopic_cross_section(&self, _track: &Track) -> f64 {
        0.05
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

fn run(biasing: Option<&str>, seed: u64) -> SlabTally {
    let scenario = pencil_beam(seed, HISTORIES, biasing);
    let world = Arc::new(scenario.build_world().unwrap());
    let source = scenario.build_source().unwrap();
    let engine = scenario
        .biasing_config()
        .unwrap()
        .map(|config| BiasingWorker::new(config, 0));

    let mut kernel = TransportKernel::new(
        world,
        ProcessList::new().with_process(RejectingCompton),
        source,
        engine,
        TransportRng::from_seed(seed),
    );
    kernel.start_run().unwrap();
    for event in 0..HISTORIES {
        kernel.run_event(EventId(event)).unwrap();
    }
    let (tally, _) = kernel.end_run(&RunStatistics::new());
    tally
}

/// Test that the unbiased run transmits every photon when all
/// interactions are declined.
#[test]
fn test_declined_interactions_transmit_everything() {
    let tally = run(None, 17);

    assert_eq!(tally.histories(), HISTORIES);
    assert_relative_eq!(tally.transmission().mean, 1.0, epsilon = 1e-9);
    assert_relative_eq!(tally.deposit().mean, 0.0, epsilon = 1e-12);
}

/// Test that a declined forced interaction still splits the weight
/// between the forced clone and the free flight, so each history
/// transmits exactly one unit of weight.
#[test]
fn test_declined_forced_interaction_transmits_unit_weight() {
    let tally = run(
        Some("policy = \"force-collision\"\nregions = [\"slab\"]\n"),
        17,
    );

    assert_eq!(tally.histories(), HISTORIES);
    assert_relative_eq!(tally.transmission().mean, 1.0, epsilon = 1e-9);
    assert_relative_eq!(tally.transmission().std_error, 0.0, epsilon = 1e-9);
    assert_relative_eq!(tally.deposit().mean, 0.0, epsilon = 1e-12);
}
