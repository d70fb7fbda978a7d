#![allow(dead_code)]

use drudesim::core::{BoundaryMode, Constants, DrudeModel, FieldPolicy, Particle, ScatteringPolicy};
use rand::RngCore;

/// Random source that always returns the same word.
///
/// `ConstRng(u64::MAX)` makes every uniform roll just below 1 (never scatter);
/// `ConstRng(0)` makes every roll exactly 0 (always scatter when dt/τ > 0).
#[derive(Debug, Clone, Copy)]
pub struct ConstRng(pub u64);

impl ConstRng {
    pub fn never() -> Self {
        ConstRng(u64::MAX)
    }

    pub fn always() -> Self {
        ConstRng(0)
    }
}

impl RngCore for ConstRng {
    fn next_u32(&mut self) -> u32 {
        (self.0 >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.0
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for (i, b) in dst.iter_mut().enumerate() {
            *b = self.0.to_le_bytes()[i % 8];
        }
    }
}

pub fn model(
    scattering: ScatteringPolicy,
    field_policy: FieldPolicy,
    boundary: BoundaryMode,
    dt: f64,
) -> DrudeModel {
    DrudeModel::new(scattering, field_policy, boundary, Constants::electron(), dt)
        .expect("valid model")
}

pub fn ensemble<const D: usize>(n: u32, r: [f64; D], v: [f64; D]) -> Vec<Particle<D>> {
    (0..n)
        .map(|i| Particle::new(i, r, v).expect("finite particle"))
        .collect()
}
