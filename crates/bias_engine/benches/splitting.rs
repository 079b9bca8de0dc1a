//! Criterion benchmarks for the splitting and forced-interaction hot paths.
//!
//! Measures one split Compton interaction for increasing splitting factors
//! and the truncated-exponential draw used by forced collision.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bias_core::{
    InteractionProcess, ParticleChange, ParticleKind, Step, Track, TrackId, TransportRng, Vec3,
};
use bias_engine::config::SplittingFactor;
use bias_engine::law::TruncatedExponential;
use bias_engine::operations::{ParentHandling, SplittingOperation};
use bias_engine::roulette::{AngularRoulette, BiasCone, SurvivalRegion};
use bias_engine::SplitMode;

/// Isotropic scatter with one electron, enough to exercise the bookkeeping.
struct Scatter;

impl InteractionProcess for Scatter {
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
        let mut change = ParticleChange::new();
        change.propose_energy(track.kinetic_energy * (0.3 + 0.6 * rng.gen_uniform()));
        change.propose_direction(rng.isotropic_direction());
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

/// Benchmark one split interaction with and without angular roulette.
fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("compton_split");
    let track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0)
        .in_volume("slab");
    let step = Step::at_rest(&track, "compt");

    for factor in [2.0, 10.0, 100.0] {
        let plain = SplittingOperation::new(SplittingFactor::new(factor).unwrap());
        group.bench_with_input(BenchmarkId::new("plain", factor), &plain, |b, op| {
            let mut rng = TransportRng::from_seed(1);
            let mut process = Scatter;
            b.iter(|| {
                black_box(op.split(
                    &mut process,
                    black_box(&track),
                    &step,
                    SplitMode::ScatteredPrimary,
                    ParentHandling::InPlace,
                    &mut rng,
                ))
            });
        });

        let cone = BiasCone::new(Vec3::z(), 15.0).unwrap();
        let roulette = plain.clone().with_roulette(
            AngularRoulette::new(SurvivalRegion::Cone(cone), factor),
            &[ParticleKind::Gamma],
        );
        group.bench_with_input(BenchmarkId::new("roulette", factor), &roulette, |b, op| {
            let mut rng = TransportRng::from_seed(1);
            let mut process = Scatter;
            b.iter(|| {
                black_box(op.split(
                    &mut process,
                    black_box(&track),
                    &step,
                    SplitMode::ScatteredPrimary,
                    ParentHandling::InPlace,
                    &mut rng,
                ))
            });
        });
    }

    group.finish();
}

/// Benchmark the forced-interaction length draw.
fn bench_truncated_exponential(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncated_exponential");

    for (rate, length) in [(0.007, 10.0), (0.5, 100.0), (1e-6, 1.0)] {
        let law = TruncatedExponential::new(rate, length).unwrap();
        group.bench_with_input(BenchmarkId::new("draw", rate), &law, |b, law| {
            let mut rng = TransportRng::from_seed(7);
            b.iter(|| black_box(law.draw(&mut rng)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_split, bench_truncated_exponential);
criterion_main!(benches);
