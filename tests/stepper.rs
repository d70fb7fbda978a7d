mod common;

use common::{ensemble, model, ConstRng};
use drudesim::core::{BoundaryMode, Constants, Drive, FieldPolicy, Particle, ScatteringPolicy};
use drudesim::error::{Error, Result};
use rand::{rngs::StdRng, SeedableRng};

/// The mean has the particles' dimensionality for both supported dimensions.
#[test]
fn mean_position_matches_particle_dimension() -> Result<()> {
    let m = model(
        ScatteringPolicy::Thermal,
        FieldPolicy::ChargeMassScaled,
        BoundaryMode::Open,
        1e-14,
    );
    let drive = Drive::new(1e6, 2e-14)?;
    let mut rng = StdRng::seed_from_u64(1);
    let mut kicks = StdRng::seed_from_u64(2);

    let mut flat = ensemble::<2>(10, [0.0; 2], [0.0; 2]);
    let mean2: [f64; 2] = m.step(&mut flat, drive, &mut rng, &mut kicks)?;
    assert_eq!(mean2.len(), 2);

    let mut solid = ensemble::<3>(10, [0.0; 3], [0.0; 3]);
    let mean3: [f64; 3] = m.step(&mut solid, drive, &mut rng, &mut kicks)?;
    assert_eq!(mean3.len(), 3);
    assert_eq!(mean3[2], 0.0, "motion stays in the (x, y) plane");
    Ok(())
}

/// Identical seeds and inputs give identical trajectories.
#[test]
fn deterministic_under_fixed_seed() -> Result<()> {
    let m = model(
        ScatteringPolicy::Isotropic { speed: 1.0 },
        FieldPolicy::Raw,
        BoundaryMode::Open,
        0.01,
    );
    let drive = Drive::new(0.5, 0.1)?;
    let run = || -> Result<(Vec<[f64; 3]>, Vec<Particle<3>>)> {
        let mut ps = ensemble::<3>(30, [0.0; 3], [0.1, 0.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut kicks = StdRng::seed_from_u64(43);
        let mut means = Vec::new();
        for _ in 0..200 {
            means.push(m.step(&mut ps, drive, &mut rng, &mut kicks)?);
        }
        Ok((means, ps))
    };
    let (means_a, ps_a) = run()?;
    let (means_b, ps_b) = run()?;
    assert_eq!(means_a, means_b);
    assert_eq!(ps_a, ps_b);
    Ok(())
}

/// With no field and no scattering, velocities are unchanged and positions advance by v dt exactly.
#[test]
fn free_flight_is_exact_euler() -> Result<()> {
    let dt = 0.01;
    let m = model(ScatteringPolicy::Thermal, FieldPolicy::Raw, BoundaryMode::Open, dt);
    let drive = Drive::new(0.0, f64::INFINITY)?;
    let mut ps = vec![
        Particle::new(0, [1.0, -2.0, 0.5], [0.3, 0.7, -0.1])?,
        Particle::new(1, [-4.0, 0.0, 0.0], [-1.5, 0.0, 2.0])?,
    ];
    let before = ps.clone();
    let mut rng = StdRng::seed_from_u64(7);
    let mut kicks = StdRng::seed_from_u64(8);
    m.step(&mut ps, drive, &mut rng, &mut kicks)?;

    for (p, p0) in ps.iter().zip(&before) {
        assert_eq!(p.v, p0.v);
        for k in 0..3 {
            assert_eq!(p.r[k], p0.r[k] + p0.v[k] * dt);
        }
    }
    Ok(())
}

/// Accumulated linear acceleration over N unscattered steps matches N (qE/m) dt.
#[test]
fn velocity_grows_linearly_without_scattering() -> Result<()> {
    let dt = 1e-14;
    let n = 1000;
    let field = 1.0e6;
    let m = model(ScatteringPolicy::Thermal, FieldPolicy::ChargeMassScaled, BoundaryMode::Open, dt);
    let drive = Drive::new(field, 1e-12)?;
    let mut ps = ensemble::<3>(1, [0.0; 3], [0.0; 3]);
    let mut never = ConstRng::never();
    let mut kicks = StdRng::seed_from_u64(0);
    for _ in 0..n {
        m.step(&mut ps, drive, &mut never, &mut kicks)?;
    }

    let c = Constants::electron();
    let expected = n as f64 * (c.charge * field / c.mass) * dt;
    let vx = ps[0].v[0];
    assert!(
        ((vx - expected) / expected).abs() < 1e-9,
        "vx = {vx}, expected {expected}"
    );
    assert_eq!(ps[0].v[1], 0.0);
    assert_eq!(ps[0].scatter_count, 0);
    Ok(())
}

/// The raw policy adds E dt per step, ignoring charge and mass.
#[test]
fn raw_field_policy_adds_field_times_dt() -> Result<()> {
    let dt = 0.01;
    let iso = ScatteringPolicy::Isotropic { speed: 1.0 };
    let m = model(iso, FieldPolicy::Raw, BoundaryMode::Open, dt);
    let drive = Drive::new(-0.5, 0.1)?;
    let mut ps = ensemble::<2>(3, [0.0; 2], [0.1, 0.0]);
    let mut never = ConstRng::never();
    let mut kicks = StdRng::seed_from_u64(0);
    for _ in 0..10 {
        m.step(&mut ps, drive, &mut never, &mut kicks)?;
    }
    for p in &ps {
        assert!((p.v[0] - (0.1 - 0.5 * dt * 10.0)).abs() < 1e-12);
    }
    Ok(())
}

/// A scattering step replaces the velocity and skips the field kick.
#[test]
fn scattered_particles_take_fresh_isotropic_velocity() -> Result<()> {
    let dt = 0.01;
    let iso = ScatteringPolicy::Isotropic { speed: 1.0 };
    let m = model(iso, FieldPolicy::Raw, BoundaryMode::Open, dt);
    let drive = Drive::new(100.0, 0.1)?;
    let mut ps = ensemble::<3>(50, [0.0; 3], [5.0, 5.0, 5.0]);
    let mut always = ConstRng::always();
    let mut kicks = StdRng::seed_from_u64(3);
    m.step(&mut ps, drive, &mut always, &mut kicks)?;
    for p in &ps {
        assert!((p.speed_sq() - 1.0).abs() < 1e-12, "speed must be exactly the isotropic speed");
        assert_eq!(p.v[2], 0.0);
        assert_eq!(p.scatter_count, 1);
        for k in 0..3 {
            assert_eq!(p.r[k], p.v[k] * dt);
        }
    }
    Ok(())
}

#[test]
fn zero_scattering_time_is_invalid_parameter() {
    let m = model(ScatteringPolicy::Thermal, FieldPolicy::Raw, BoundaryMode::Open, 0.01);
    let mut ps = ensemble::<2>(1, [0.0; 2], [0.0; 2]);
    let drive = Drive {
        field: 0.0,
        scattering_time: 0.0,
    };
    let err = m
        .step(&mut ps, drive, &mut ConstRng::never(), &mut StdRng::seed_from_u64(0))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    assert!(Drive::new(0.0, -1.0).is_err());
}
