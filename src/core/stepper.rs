use crate::core::particle::{check_dimension, Particle};
use crate::core::policy::{BoundaryMode, Constants, FieldPolicy, Kick, ScatteringPolicy};
use crate::error::{Error, Result};
use rand::Rng;

/// Live inputs read once per step: the applied field and the mean free time.
///
/// The field points along +x and may take any finite value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drive {
    /// Electric field magnitude along x.
    pub field: f64,
    /// Mean free time between collisions (> 0; `f64::INFINITY` disables scattering).
    pub scattering_time: f64,
}

impl Drive {
    /// Validated constructor.
    pub fn new(field: f64, scattering_time: f64) -> Result<Self> {
        let d = Self {
            field,
            scattering_time,
        };
        d.validate()?;
        Ok(d)
    }

    /// Reject a non-finite field and a NaN or non-positive scattering time.
    pub fn validate(&self) -> Result<()> {
        if !self.field.is_finite() {
            return Err(Error::invalid("electric field must be finite"));
        }
        if self.scattering_time.is_nan() || self.scattering_time <= 0.0 {
            return Err(Error::invalid(format!(
                "scattering_time must be > 0, got {}",
                self.scattering_time
            )));
        }
        Ok(())
    }

    /// Probability of a collision within one step of length `dt`.
    #[inline]
    pub fn scatter_probability(&self, dt: f64) -> f64 {
        dt / self.scattering_time
    }
}

/// The fixed part of a Drude simulation: policies, constants and timestep.
#[derive(Debug, Clone)]
pub struct DrudeModel {
    scattering: ScatteringPolicy,
    field_policy: FieldPolicy,
    boundary: BoundaryMode,
    constants: Constants,
    dt: f64,
    kick: Kick,
}

impl DrudeModel {
    /// Validate the configuration and build the velocity sampler.
    pub fn new(
        scattering: ScatteringPolicy,
        field_policy: FieldPolicy,
        boundary: BoundaryMode,
        constants: Constants,
        dt: f64,
    ) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::invalid(format!("dt must be finite and > 0, got {dt}")));
        }
        constants.validate()?;
        boundary.validate()?;
        let kick = Kick::new(scattering, &constants)?;
        Ok(Self {
            scattering,
            field_policy,
            boundary,
            constants,
            dt,
            kick,
        })
    }

    /// How scattered velocities are drawn.
    pub fn scattering(&self) -> ScatteringPolicy {
        self.scattering
    }

    /// How the field enters the velocity update.
    pub fn field_policy(&self) -> FieldPolicy {
        self.field_policy
    }

    /// Boundary rule applied after each position update.
    pub fn boundary(&self) -> BoundaryMode {
        self.boundary
    }

    /// Carrier and lattice constants.
    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    /// Timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Advance every particle by one timestep and return the mean physical position.
    ///
    /// For each particle, in order:
    /// 1. roll `u ~ U[0,1)` from `collisions`; if `u < dt/τ` the velocity is
    ///    replaced by a sample from `kicks`,
    /// 2. otherwise the field accelerates it along x,
    /// 3. explicit Euler position update `r += v dt`,
    /// 4. the boundary rule is applied.
    ///
    /// Particles are independent, so updating them one after another in place
    /// is the same as updating them all from the start-of-step state.
    ///
    /// Errors: `Error::InvalidParameter` on an empty ensemble or invalid `drive`;
    /// in that case no particle is touched.
    pub fn step<const D: usize, C, K>(
        &self,
        particles: &mut [Particle<D>],
        drive: Drive,
        collisions: &mut C,
        kicks: &mut K,
    ) -> Result<[f64; D]>
    where
        C: Rng + ?Sized,
        K: Rng + ?Sized,
    {
        check_dimension::<D>()?;
        if particles.is_empty() {
            return Err(Error::invalid("ensemble must contain at least one particle"));
        }
        drive.validate()?;

        let dt = self.dt;
        let p_scatter = drive.scatter_probability(dt);
        let dv = self.field_policy.delta_v(drive.field, dt, &self.constants);

        let mut sum = [0.0_f64; D];
        for p in particles.iter_mut() {
            let roll: f64 = collisions.random();
            if roll < p_scatter {
                p.v = self.kick.sample(kicks);
                p.bump_scatter_count();
            } else {
                p.v[0] += dv;
            }

            for (r_k, &v_k) in p.r.iter_mut().zip(p.v.iter()) {
                *r_k += v_k * dt;
            }

            self.boundary.apply(&mut p.r, &mut p.v);

            for (s_k, &r_k) in sum.iter_mut().zip(p.r.iter()) {
                *s_k += r_k;
            }
        }

        let n = particles.len() as f64;
        Ok(sum.map(|s| s / n))
    }
}

/// Theoretical drift velocity `q E τ / m` for a steady field.
#[inline]
pub fn drift_velocity(field: f64, scattering_time: f64, constants: &Constants) -> f64 {
    constants.charge * field * scattering_time / constants.mass
}

/// Arithmetic mean of the particles' physical positions.
///
/// Errors: `Error::InvalidParameter` on an empty slice.
pub fn mean_position<const D: usize>(particles: &[Particle<D>]) -> Result<[f64; D]> {
    if particles.is_empty() {
        return Err(Error::invalid("ensemble must contain at least one particle"));
    }
    let mut sum = [0.0_f64; D];
    for p in particles {
        for (s_k, &r_k) in sum.iter_mut().zip(p.r.iter()) {
            *s_k += r_k;
        }
    }
    let n = particles.len() as f64;
    Ok(sum.map(|s| s / n))
}
