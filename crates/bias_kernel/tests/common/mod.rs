//! Scenario builders shared by the kernel integration tests.

#![allow(dead_code)]

use bias_kernel::tally::Estimate;
use bias_kernel::ScenarioConfig;

/// 1 MeV pencil beam on 10 mm of water, with an optional `[biasing]` body.
pub fn pencil_beam(seed: u64, histories: u64, biasing: Option<&str>) -> ScenarioConfig {
    let mut document = format!(
        r#"
        seed = {seed}
        histories = {histories}
        workers = 2

        [slab]
        thickness = 10.0
        half_width = 100.0

        [source]
        energy = 1.0
        position = [0.0, 0.0, -20.0]
        direction = [0.0, 0.0, 1.0]
        "#
    );
    if let Some(body) = biasing {
        document.push_str("\n[biasing]\n");
        document.push_str(body);
    }
    ScenarioConfig::from_toml_str(&document).unwrap()
}

/// Isotropic 1 MeV point source 20 mm upstream of the slab.
pub fn isotropic(seed: u64, histories: u64, biasing: Option<&str>) -> ScenarioConfig {
    let mut scenario = pencil_beam(seed, histories, None);
    scenario.source.direction = None;
    if let Some(body) = biasing {
        scenario.biasing = Some(toml::from_str(body).unwrap());
    }
    scenario
}

/// Asserts two independent estimates agree within `sigmas` combined
/// standard errors.
pub fn assert_compatible(a: &Estimate, b: &Estimate, sigmas: f64) {
    let combined = (a.std_error.powi(2) + b.std_error.powi(2)).sqrt();
    let diff = (a.mean - b.mean).abs();
    assert!(
        diff <= sigmas * combined,
        "estimates differ by {diff:.3e} > {sigmas} x {combined:.3e}: {a:?} vs {b:?}"
    );
}
