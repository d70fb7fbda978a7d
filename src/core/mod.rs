//! Core Drude-model types: electrons, policies, the ensemble stepper and the
//! simulation controller that drives it.

pub mod control;
pub mod particle;
pub mod policy;
pub mod sim;
pub mod stepper;

pub use control::{ControlPanel, StopToken};
pub use particle::Particle;
pub use policy::{BoundaryMode, Constants, FieldPolicy, ScatteringPolicy, Slab};
pub use sim::{EnsembleSetup, InitialVelocity, RunSummary, Sample, SimState, Simulation, Spawn};
pub use stepper::{drift_velocity, mean_position, Drive, DrudeModel};
