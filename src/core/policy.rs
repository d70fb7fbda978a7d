//! Physical constants and the policy choices that distinguish one Drude
//! simulation from another.
//!
//! The policies are deliberately enumerated rather than merged: the
//! qualitative demo folds charge and mass into the field, the thermal model
//! uses real SI units, and the screen demo wraps around a viewport. All three
//! are valid configurations of the same stepper.

use crate::error::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;

/// Electron charge in coulombs.
pub const ELECTRON_CHARGE: f64 = -1.602_176_62e-19;
/// Electron rest mass in kilograms.
pub const ELECTRON_MASS: f64 = 9.109_383_56e-31;
/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Room temperature in kelvin.
pub const ROOM_TEMPERATURE: f64 = 300.0;

/// Physical constants of the charge carrier and the lattice it scatters off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constants {
    /// Carrier charge (C). Negative for electrons.
    pub charge: f64,
    /// Carrier mass (kg, > 0).
    pub mass: f64,
    /// Boltzmann constant (J/K, > 0).
    pub boltzmann: f64,
    /// Lattice temperature (K, >= 0).
    pub temperature: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self::electron()
    }
}

impl Constants {
    /// Free electron in a lattice at room temperature.
    pub fn electron() -> Self {
        Self {
            charge: ELECTRON_CHARGE,
            mass: ELECTRON_MASS,
            boltzmann: BOLTZMANN,
            temperature: ROOM_TEMPERATURE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.charge.is_finite() {
            return Err(Error::invalid("charge must be finite"));
        }
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(Error::invalid("mass must be finite and > 0"));
        }
        if !self.boltzmann.is_finite() || self.boltzmann <= 0.0 {
            return Err(Error::invalid("boltzmann constant must be finite and > 0"));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(Error::invalid("temperature must be finite and >= 0"));
        }
        Ok(())
    }

    /// Per-component thermal standard deviation sqrt(k_B T / m).
    #[inline]
    pub fn thermal_sigma(&self) -> f64 {
        (self.boltzmann * self.temperature / self.mass).sqrt()
    }

    /// RMS thermal speed sqrt(3 k_B T / m) from equipartition in three dimensions.
    #[inline]
    pub fn thermal_speed(&self) -> f64 {
        (3.0 * self.boltzmann * self.temperature / self.mass).sqrt()
    }

    /// Acceleration q E / m along the field axis.
    #[inline]
    pub fn acceleration(&self, field: f64) -> f64 {
        self.charge * field / self.mass
    }
}

/// How a scattered electron's new velocity is drawn.
///
/// Every policy fills only the (x, y) plane; a third axis, if present, is zeroed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScatteringPolicy {
    /// Fixed speed in a uniformly random in-plane direction.
    Isotropic { speed: f64 },
    /// Each in-plane component ~ N(0, k_B T / m).
    Thermal,
    /// Each in-plane component ~ U[-v_th, v_th] with v_th = sqrt(3 k_B T / m).
    UniformBox,
}

/// How the electric field enters the velocity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// `v.x += E dt`: charge and mass folded into the field's units.
    Raw,
    /// `v.x += (q E / m) dt`.
    ChargeMassScaled,
}

impl FieldPolicy {
    /// Velocity increment along x for one step of length `dt`.
    #[inline]
    pub fn delta_v(&self, field: f64, dt: f64, constants: &Constants) -> f64 {
        match self {
            FieldPolicy::Raw => field * dt,
            FieldPolicy::ChargeMassScaled => constants.acceleration(field) * dt,
        }
    }
}

/// Axis-aligned rectangle in the (x, y) plane: a slab of metal seen from above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slab {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Slab {
    /// Create a slab after checking `left < right` and `bottom < top`.
    pub fn new(left: f64, right: f64, bottom: f64, top: f64) -> Result<Self> {
        if ![left, right, bottom, top].iter().all(|x| x.is_finite()) {
            return Err(Error::invalid("slab extents must be finite"));
        }
        if left >= right {
            return Err(Error::invalid("slab left must be < right"));
        }
        if bottom >= top {
            return Err(Error::invalid("slab bottom must be < top"));
        }
        Ok(Self {
            left,
            right,
            bottom,
            top,
        })
    }

    /// Slab of the given `length` (along x) and `width` (along y) centered on `(cx, cy)`.
    pub fn centered(cx: f64, cy: f64, length: f64, width: f64) -> Result<Self> {
        Self::new(
            cx - 0.5 * length,
            cx + 0.5 * length,
            cy - 0.5 * width,
            cy + 0.5 * width,
        )
    }

    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }
}

/// What happens when an electron leaves the region of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryMode {
    /// Unbounded motion.
    Open,
    /// Specular reflection on both axes of the slab.
    Reflective(Slab),
    /// Infinite pool along x (teleport to the opposite edge), reflection along y.
    PeriodicX(Slab),
    /// Position wrapped modulo the viewport on both axes, regardless of velocity.
    Toroidal { width: f64, height: f64 },
}

impl BoundaryMode {
    pub fn validate(&self) -> Result<()> {
        match *self {
            BoundaryMode::Open => Ok(()),
            BoundaryMode::Reflective(s) | BoundaryMode::PeriodicX(s) => {
                Slab::new(s.left, s.right, s.bottom, s.top).map(|_| ())
            }
            BoundaryMode::Toroidal { width, height } => {
                if !width.is_finite() || width <= 0.0 || !height.is_finite() || height <= 0.0 {
                    return Err(Error::invalid(
                        "toroidal viewport width and height must be finite and > 0",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Apply the boundary rule to a freshly integrated particle state. `D >= 2`.
    pub(crate) fn apply<const D: usize>(&self, r: &mut [f64; D], v: &mut [f64; D]) {
        match *self {
            BoundaryMode::Open => {}
            BoundaryMode::Reflective(s) => {
                reflect(&mut r[0], &mut v[0], s.left, s.right);
                reflect(&mut r[1], &mut v[1], s.bottom, s.top);
            }
            BoundaryMode::PeriodicX(s) => {
                if r[0] > s.right && v[0] > 0.0 {
                    r[0] = s.left;
                } else if r[0] < s.left && v[0] < 0.0 {
                    r[0] = s.right;
                }
                reflect(&mut r[1], &mut v[1], s.bottom, s.top);
            }
            BoundaryMode::Toroidal { width, height } => {
                r[0] = wrap(r[0], width);
                r[1] = wrap(r[1], height);
            }
        }
    }
}

/// Flip the velocity component if the particle is outside `[lo, hi]` and still moving outward.
/// The position is left where it is; the flipped velocity carries it back in.
#[inline]
fn reflect(x: &mut f64, v: &mut f64, lo: f64, hi: f64) {
    if (*x > hi && *v > 0.0) || (*x < lo && *v < 0.0) {
        *v = -*v;
    }
}

/// Wrap into `[0, period)`.
#[inline]
fn wrap(x: f64, period: f64) -> f64 {
    let w = x.rem_euclid(period);
    // rem_euclid can round up to exactly `period` for tiny negative inputs
    if w >= period {
        0.0
    } else {
        w
    }
}

/// Velocity sampler built once from a validated [`ScatteringPolicy`].
#[derive(Debug, Clone)]
pub(crate) enum Kick {
    Isotropic(f64),
    Thermal(Normal<f64>),
    UniformBox(f64),
}

impl Kick {
    pub(crate) fn new(policy: ScatteringPolicy, constants: &Constants) -> Result<Self> {
        match policy {
            ScatteringPolicy::Isotropic { speed } => {
                if !speed.is_finite() || speed < 0.0 {
                    return Err(Error::invalid(
                        "isotropic scattering speed must be finite and >= 0",
                    ));
                }
                Ok(Kick::Isotropic(speed))
            }
            ScatteringPolicy::Thermal => {
                let sigma = constants.thermal_sigma();
                let normal = Normal::new(0.0, sigma)
                    .map_err(|e| Error::invalid(format!("thermal sigma {sigma}: {e}")))?;
                Ok(Kick::Thermal(normal))
            }
            ScatteringPolicy::UniformBox => {
                let v_th = constants.thermal_speed();
                if !v_th.is_finite() {
                    return Err(Error::invalid("thermal speed must be finite"));
                }
                Ok(Kick::UniformBox(v_th))
            }
        }
    }

    /// Draw a post-collision velocity.
    pub(crate) fn sample<const D: usize, R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; D] {
        let mut v = [0.0_f64; D];
        let (vx, vy) = match self {
            Kick::Isotropic(speed) => {
                let theta = rng.random_range(0.0..TAU);
                (speed * theta.cos(), speed * theta.sin())
            }
            Kick::Thermal(normal) => (normal.sample(rng), normal.sample(rng)),
            &Kick::UniformBox(v_th) => (
                rng.random_range(-v_th..=v_th),
                rng.random_range(-v_th..=v_th),
            ),
        };
        v[0] = vx;
        v[1] = vy;
        v
    }
}
