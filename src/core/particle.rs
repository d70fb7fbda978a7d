use crate::error::{Error, Result};

/// A conduction electron in `D` dimensions (2 or 3).
///
/// Fields:
/// - `id`: stable identifier (index in the ensemble at creation)
/// - `r`: physical position
/// - `v`: velocity
/// - `scatter_count`: incremented every time the particle scatters off the lattice
///
/// Electrons do not interact with each other or the ions, so there is no
/// radius and no per-particle mass; mass and charge live in [`Constants`](super::Constants).
#[derive(Debug, Clone, PartialEq)]
pub struct Particle<const D: usize> {
    /// Stable particle identifier.
    pub id: u32,
    /// Physical position.
    pub r: [f64; D],
    /// Velocity.
    pub v: [f64; D],
    /// Number of scattering events so far.
    pub scatter_count: u64,
}

impl<const D: usize> Particle<D> {
    /// Create a new particle after validating that every component is finite.
    ///
    /// Errors:
    /// - `Error::InvalidParameter` if the dimension is not 2 or 3, or any component is NaN/inf.
    pub fn new(id: u32, r: [f64; D], v: [f64; D]) -> Result<Self> {
        check_dimension::<D>()?;
        if !r.iter().all(|x| x.is_finite()) {
            return Err(Error::invalid("position must be finite"));
        }
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::invalid("velocity must be finite"));
        }
        Ok(Self {
            id,
            r,
            v,
            scatter_count: 0,
        })
    }

    /// A particle at rest at the origin.
    pub fn at_rest(id: u32) -> Result<Self> {
        Self::new(id, [0.0; D], [0.0; D])
    }

    /// Position scaled for on-screen visibility.
    #[inline]
    pub fn display_position(&self, visual_scale: f64) -> [f64; D] {
        self.r.map(|x| x * visual_scale)
    }

    /// Squared speed |v|^2.
    #[inline]
    pub fn speed_sq(&self) -> f64 {
        self.v.iter().map(|&c| c * c).sum()
    }

    /// Kinetic energy 1/2 m |v|^2 for the given carrier mass.
    #[inline]
    pub fn kinetic_energy(&self, mass: f64) -> f64 {
        0.5 * mass * self.speed_sq()
    }

    #[inline]
    pub(crate) fn bump_scatter_count(&mut self) {
        self.scatter_count = self.scatter_count.saturating_add(1);
    }
}

/// The stepper and scattering policies act on the (x, y) plane, so only 2D and 3D are supported.
pub(crate) fn check_dimension<const D: usize>() -> Result<()> {
    if D == 2 || D == 3 {
        Ok(())
    } else {
        Err(Error::invalid(format!("dimension must be 2 or 3, got {D}")))
    }
}
