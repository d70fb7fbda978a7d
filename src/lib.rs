//! Drude-model simulation of electron conduction.
//!
//! Electrons accelerate in an applied field and, with probability `dt/τ` per
//! step, scatter off the lattice and re-emerge with a freshly drawn velocity.
//! The ensemble mean position tracks the drift that the field induces.
//!
//! ```no_run
//! use drudesim::config::{PresetName, Scenario};
//! use drudesim::core::StopToken;
//!
//! # fn main() -> drudesim::error::Result<()> {
//! let mut sim = Scenario::preset(PresetName::Thermal).build::<3>()?;
//! let stop = StopToken::new();
//! sim.run(&stop, Some(1000), |sample, _| println!("{} {:?}", sample.t, sample.mean))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;

#[cfg(feature = "python")]
mod python;

pub use crate::core::{Drive, DrudeModel, Particle, Simulation};
pub use crate::error::{Error, Result};
