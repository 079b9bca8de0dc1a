//! Integration tests for module exports.
//!
//! Verify that the public modules and the crate-root re-exports are usable
//! together the way a host kernel uses them.

use std::sync::Arc;

use approx::assert_relative_eq;

/// Test that geometry types are accessible via absolute path and crate root.
#[test]
fn test_geometry_module_exports() {
    use bias_core::geometry::{BoxSolid, GeometryStore, PlacedVolume, VolumeStore};
    use bias_core::types::{GeometryError, Transform, Vec3};

    // Slab centred at z = 100: world_to_local shifts by -100.
    let slab = PlacedVolume::new(
        "slab",
        Arc::new(BoxSolid::new(Vec3::new(50.0, 50.0, 5.0))),
        Transform::translation(0.0, 0.0, -100.0),
    )
    .unwrap();
    let store = VolumeStore::new().with_volume(slab);

    let placed = store.placed("slab").unwrap();
    assert!(placed.contains(&Vec3::new(0.0, 0.0, 100.0)));
    assert!(!placed.contains(&Vec3::zeros()));
    assert_relative_eq!(
        placed.distance_to_in(&Vec3::zeros(), &Vec3::z()),
        95.0,
        epsilon = 1e-9
    );

    assert_eq!(
        store.world_to_local("collimator").unwrap_err(),
        GeometryError::UnknownVolume("collimator".to_string())
    );

    let flat = bias_core::PlacedVolume::new(
        "foil",
        Arc::new(bias_core::BoxSolid::new(Vec3::new(10.0, 10.0, 0.0))),
        Transform::identity(),
    );
    assert!(matches!(
        flat,
        Err(GeometryError::DegenerateSolid { ref volume, .. }) if volume == "foil"
    ));
}

/// Test that track and particle-change types work together.
#[test]
fn test_types_module_exports() {
    use bias_core::types::{ParticleChange, ParticleKind, Track, TrackId, TrackIdAllocator, Vec3};

    let mut ids = TrackIdAllocator::new();
    let mut track = Track::new(
        ids.allocate(),
        "gamma".parse::<ParticleKind>().unwrap(),
        Vec3::zeros(),
        Vec3::z(),
        1.0,
    );
    assert_eq!(track.id, TrackId(1));

    let mut change = ParticleChange::new();
    change.propose_energy(0.4);
    change.add_secondary(Track::new(
        TrackId::default(),
        ParticleKind::Electron,
        Vec3::zeros(),
        Vec3::x(),
        0.6,
    ));
    assert_eq!(change.secondaries()[0].weight, 1.0);
    change.scale_weights(track.weight, 0.25);
    change.apply_to(&mut track);

    assert_eq!(track.kinetic_energy, 0.4);
    assert_relative_eq!(track.weight, 0.25);
    assert_relative_eq!(change.secondary_weight(), 0.25);

    ids.reset();
    assert_eq!(ids.allocate(), TrackId(1));
}

/// Test that the physics and rng seams are reachable from the crate root.
#[test]
fn test_physics_and_rng_exports() {
    use bias_core::{ParticleKind, PhysicsList, ProcessList, TransportRng};

    let mut physics = ProcessList::new();
    assert!(physics.is_empty());
    assert!(physics.process_mut("compt").is_none());
    assert!(physics.process_names(ParticleKind::Gamma).is_empty());

    let mut a = TransportRng::stream(7, 0);
    let mut b = TransportRng::stream(7, 1);
    let draws_a: Vec<f64> = (0..4).map(|_| a.gen_uniform()).collect();
    let draws_b: Vec<f64> = (0..4).map(|_| b.gen_uniform()).collect();
    assert_ne!(draws_a, draws_b);
}
