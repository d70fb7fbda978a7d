use crate::core::control::{ControlPanel, StopToken};
use crate::core::particle::{check_dimension, Particle};
use crate::core::policy::{Kick, ScatteringPolicy, Slab};
use crate::core::stepper::{drift_velocity, mean_position, Drive, DrudeModel};
use crate::error::{Error, Result};
use log::{debug, info};
use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;

/// Default number of `(t, mean)` samples kept for plotting.
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Where electrons start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spawn {
    /// Every electron at the origin.
    Origin,
    /// Uniformly inside a rectangle of the (x, y) plane; other axes zero.
    Uniform(Slab),
}

/// How fast electrons start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialVelocity {
    Zero,
    /// The same in-plane velocity `(vx, vy)` for every electron.
    Fixed { vx: f64, vy: f64 },
    /// Per-component thermal Gaussian, as for thermal scattering.
    Thermal,
}

/// How to (re)build the ensemble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleSetup {
    pub num_particles: usize,
    pub spawn: Spawn,
    pub initial_velocity: InitialVelocity,
}

impl EnsembleSetup {
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(Error::invalid("num_particles must be > 0"));
        }
        if u32::try_from(self.num_particles).is_err() {
            return Err(Error::invalid(format!(
                "num_particles must fit in u32, got {}",
                self.num_particles
            )));
        }
        if let Spawn::Uniform(s) = self.spawn {
            Slab::new(s.left, s.right, s.bottom, s.top)?;
        }
        if let InitialVelocity::Fixed { vx, vy } = self.initial_velocity {
            if !vx.is_finite() || !vy.is_finite() {
                return Err(Error::invalid("initial velocity must be finite"));
            }
        }
        Ok(())
    }
}

/// One output row: simulation time and ensemble mean position after the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<const D: usize> {
    pub t: f64,
    pub mean: [f64; D],
}

/// Lifecycle of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Running,
    /// Transient: history cleared, ensemble being rebuilt.
    Resetting,
    /// Terminal.
    Stopped,
}

/// Outcome of [`Simulation::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Steps executed by this call.
    pub steps: u64,
    /// Resets performed by this call.
    pub resets: u64,
    /// Simulation time when the loop ended.
    pub time: f64,
    /// Whether the loop ended because of a stop request.
    pub stopped: bool,
}

/// Drude simulation controller in `D` dimensions.
///
/// Owns the ensemble, the model, the random sources and the live parameter
/// feed. The stepper reads the feed once per tick, so a UI may change the
/// field or scattering time at any moment without touching the core.
#[derive(Debug)]
pub struct Simulation<const D: usize> {
    time_now: f64,
    steps: u64,
    state: SimState,
    model: DrudeModel,
    setup: EnsembleSetup,
    visual_scale: f64,
    pub particles: Vec<Particle<D>>,
    controls: ControlPanel,
    init_rng: StdRng,
    collision_rng: StdRng,
    kick_rng: StdRng,
    history: VecDeque<Sample<D>>,
    history_limit: usize,
}

impl<const D: usize> Simulation<D> {
    /// Create a simulation and its initial ensemble.
    ///
    /// `seed` makes every random draw reproducible; `None` seeds from the OS.
    pub fn new(
        model: DrudeModel,
        setup: EnsembleSetup,
        drive: Drive,
        seed: Option<u64>,
    ) -> Result<Self> {
        check_dimension::<D>()?;
        setup.validate()?;
        let controls = ControlPanel::new(drive)?;

        let mut init_rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };
        let collision_rng = StdRng::seed_from_u64(init_rng.random());
        let kick_rng = StdRng::seed_from_u64(init_rng.random());

        let particles: Vec<Particle<D>> = spawn_ensemble(&setup, &model, &mut init_rng)?;
        info!(
            "initialised {} electrons in {}D (dt = {:e})",
            particles.len(),
            D,
            model.dt()
        );

        Ok(Self {
            time_now: 0.0,
            steps: 0,
            state: SimState::Running,
            model,
            setup,
            visual_scale: 1.0,
            particles,
            controls,
            init_rng,
            collision_rng,
            kick_rng,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Set the factor mapping physical positions to display positions.
    pub fn with_visual_scale(mut self, visual_scale: f64) -> Result<Self> {
        if !visual_scale.is_finite() || visual_scale <= 0.0 {
            return Err(Error::invalid("visual_scale must be finite and > 0"));
        }
        self.visual_scale = visual_scale;
        Ok(self)
    }

    /// Bound the number of retained history samples (oldest dropped first).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.time_now
    }

    /// Steps since creation or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// The fixed policies, constants and timestep.
    pub fn model(&self) -> &DrudeModel {
        &self.model
    }

    /// Factor from physical to display positions.
    pub fn visual_scale(&self) -> f64 {
        self.visual_scale
    }

    /// Number of electrons in the ensemble.
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// A handle for changing the field and scattering time, or requesting a reset, from elsewhere.
    pub fn controls(&self) -> ControlPanel {
        self.controls.clone()
    }

    /// Advance by one timestep using the current live parameters.
    pub fn tick(&mut self) -> Result<Sample<D>> {
        if self.state == SimState::Stopped {
            return Err(Error::invalid("simulation is stopped"));
        }
        let drive = self.controls.snapshot();
        let mean = self.model.step(
            &mut self.particles,
            drive,
            &mut self.collision_rng,
            &mut self.kick_rng,
        )?;
        self.steps += 1;
        self.time_now = self.steps as f64 * self.model.dt();

        let sample = Sample {
            t: self.time_now,
            mean,
        };
        self.record(sample);
        Ok(sample)
    }

    /// Advance by `n` timesteps and return the last sample.
    pub fn advance(&mut self, n: u64) -> Result<Option<Sample<D>>> {
        let mut last = None;
        for _ in 0..n {
            last = Some(self.tick()?);
        }
        Ok(last)
    }

    /// Clear history, zero the clock and rebuild the ensemble, then resume running.
    pub fn reset(&mut self) -> Result<()> {
        if self.state == SimState::Stopped {
            return Err(Error::invalid("simulation is stopped"));
        }
        self.state = SimState::Resetting;
        debug!("resetting after {} steps", self.steps);
        self.history.clear();
        self.time_now = 0.0;
        self.steps = 0;
        self.particles = spawn_ensemble(&self.setup, &self.model, &mut self.init_rng)?;
        self.state = SimState::Running;
        Ok(())
    }

    /// Enter the terminal state.
    pub fn stop(&mut self) {
        if self.state != SimState::Stopped {
            info!("simulation stopped at t = {:e} after {} steps", self.time_now, self.steps);
        }
        self.state = SimState::Stopped;
    }

    /// Tick until `stop` fires or `max_steps` ticks have run.
    ///
    /// The stop token and reset requests are checked only between ticks. Each
    /// sample is handed to `sink` together with the updated particles.
    pub fn run<F>(
        &mut self,
        stop: &StopToken,
        max_steps: Option<u64>,
        mut sink: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&Sample<D>, &[Particle<D>]),
    {
        let mut steps = 0u64;
        let mut resets = 0u64;
        let mut stopped = false;
        loop {
            if stop.is_stopped() {
                self.stop();
                stopped = true;
                break;
            }
            if max_steps.is_some_and(|m| steps >= m) {
                break;
            }
            if self.controls.take_reset() {
                self.reset()?;
                resets += 1;
            }
            let sample = self.tick()?;
            sink(&sample, self.particles.as_slice());
            steps += 1;
        }
        Ok(RunSummary {
            steps,
            resets,
            time: self.time_now,
            stopped,
        })
    }

    fn record(&mut self, sample: Sample<D>) {
        if self.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    /// Recorded samples, optionally restricted to `t >= now - window`.
    pub fn history(&self, window: Option<f64>) -> Result<Vec<Sample<D>>> {
        let now = self.time_now;
        match window {
            Some(w) => {
                if !w.is_finite() || w < 0.0 {
                    return Err(Error::invalid("window must be a non-negative finite float"));
                }
                Ok(self
                    .history
                    .iter()
                    .filter(|s| s.t >= now - w)
                    .copied()
                    .collect())
            }
            None => Ok(self.history.iter().copied().collect()),
        }
    }

    /// Theoretical drift velocity `q E τ / m` for the current live parameters.
    pub fn drift_velocity(&self) -> f64 {
        let d = self.controls.snapshot();
        drift_velocity(d.field, d.scattering_time, self.model.constants())
    }

    /// Mean physical position of the ensemble.
    pub fn mean_position(&self) -> Result<[f64; D]> {
        mean_position(&self.particles)
    }

    /// Ensemble-average velocity; its x component estimates the drift velocity.
    pub fn mean_velocity(&self) -> [f64; D] {
        let mut sum = [0.0_f64; D];
        for p in &self.particles {
            for (s_k, &v_k) in sum.iter_mut().zip(p.v.iter()) {
                *s_k += v_k;
            }
        }
        let n = self.particles.len().max(1) as f64;
        sum.map(|s| s / n)
    }

    /// Total kinetic energy (diagnostic).
    pub fn kinetic_energy(&self) -> f64 {
        let m = self.model.constants().mass;
        self.particles.iter().map(|p| p.kinetic_energy(m)).sum()
    }

    /// Physical positions, one row per electron.
    pub fn positions(&self) -> Vec<[f64; D]> {
        self.particles.iter().map(|p| p.r).collect()
    }

    /// Positions multiplied by the visual scale.
    pub fn display_positions(&self) -> Vec<[f64; D]> {
        self.particles
            .iter()
            .map(|p| p.display_position(self.visual_scale))
            .collect()
    }

    /// Velocities, one row per electron.
    pub fn velocities(&self) -> Vec<[f64; D]> {
        self.particles.iter().map(|p| p.v).collect()
    }
}

fn spawn_ensemble<const D: usize, R: Rng + ?Sized>(
    setup: &EnsembleSetup,
    model: &DrudeModel,
    rng: &mut R,
) -> Result<Vec<Particle<D>>> {
    let thermal = match setup.initial_velocity {
        InitialVelocity::Thermal => Some(Kick::new(ScatteringPolicy::Thermal, model.constants())?),
        _ => None,
    };

    let count = u32::try_from(setup.num_particles)
        .map_err(|_| Error::invalid("num_particles must fit in u32"))?;
    let mut particles = Vec::with_capacity(setup.num_particles);
    for id in 0..count {
        let mut r = [0.0_f64; D];
        if let Spawn::Uniform(s) = setup.spawn {
            r[0] = rng.random_range(s.left..s.right);
            r[1] = rng.random_range(s.bottom..s.top);
        }

        let v = match (setup.initial_velocity, &thermal) {
            (InitialVelocity::Thermal, Some(kick)) => kick.sample(rng),
            (InitialVelocity::Fixed { vx, vy }, _) => {
                let mut v = [0.0_f64; D];
                v[0] = vx;
                v[1] = vy;
                v
            }
            _ => [0.0_f64; D],
        };

        particles.push(Particle::new(id, r, v)?);
    }
    Ok(particles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{BoundaryMode, Constants, FieldPolicy};

    fn qualitative_model() -> DrudeModel {
        DrudeModel::new(
            ScatteringPolicy::Isotropic { speed: 1.0 },
            FieldPolicy::Raw,
            BoundaryMode::Open,
            Constants::electron(),
            0.01,
        )
        .unwrap()
    }

    fn setup(n: usize) -> EnsembleSetup {
        EnsembleSetup {
            num_particles: n,
            spawn: Spawn::Origin,
            initial_velocity: InitialVelocity::Fixed { vx: 0.1, vy: 0.0 },
        }
    }

    #[test]
    fn make_small_sim_ok() -> Result<()> {
        let drive = Drive::new(0.5, 0.1)?;
        let mut sim = Simulation::<3>::new(qualitative_model(), setup(30), drive, Some(1234))?;
        assert_eq!(sim.num_particles(), 30);
        sim.advance(10)?;
        assert_eq!(sim.steps(), 10);
        assert!((sim.time() - 0.1).abs() < 1e-12);
        assert_eq!(sim.history(None)?.len(), 10);
        Ok(())
    }

    #[test]
    fn zero_particles_rejected() {
        let drive = Drive::new(0.0, 1.0).unwrap();
        let err = Simulation::<2>::new(qualitative_model(), setup(0), drive, None).unwrap_err();
        assert!(err.to_string().contains("num_particles"));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn particle_count_beyond_id_range_rejected() {
        let err = setup(u32::MAX as usize + 1).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(setup(u32::MAX as usize).validate().is_ok());
    }

    #[test]
    fn uniform_spawn_inside_rectangle() -> Result<()> {
        let slab = Slab::new(0.0, 800.0, 0.0, 600.0)?;
        let s = EnsembleSetup {
            num_particles: 200,
            spawn: Spawn::Uniform(slab),
            initial_velocity: InitialVelocity::Zero,
        };
        let sim = Simulation::<2>::new(qualitative_model(), s, Drive::new(0.0, 1.0)?, Some(3))?;
        for p in &sim.particles {
            assert!(slab.contains(p.r[0], p.r[1]));
            assert_eq!(p.v, [0.0, 0.0]);
        }
        Ok(())
    }

    #[test]
    fn history_limit_and_window() -> Result<()> {
        let drive = Drive::new(0.5, 0.1)?;
        let mut sim = Simulation::<3>::new(qualitative_model(), setup(5), drive, Some(8))?
            .with_history_limit(4);
        sim.advance(10)?;
        let all = sim.history(None)?;
        assert_eq!(all.len(), 4);
        assert!((all[0].t - 0.07).abs() < 1e-12);
        let recent = sim.history(Some(0.015))?;
        assert_eq!(recent.len(), 2);
        assert!(sim.history(Some(-1.0)).is_err());
        Ok(())
    }

    #[test]
    fn reset_clears_history_and_clock() -> Result<()> {
        let drive = Drive::new(0.5, 0.1)?;
        let mut sim = Simulation::<3>::new(qualitative_model(), setup(5), drive, Some(8))?;
        sim.advance(25)?;
        sim.reset()?;
        assert_eq!(sim.state(), SimState::Running);
        assert_eq!(sim.time(), 0.0);
        assert!(sim.history(None)?.is_empty());
        assert!(sim.particles.iter().all(|p| p.r == [0.0; 3] && p.v == [0.1, 0.0, 0.0]));
        Ok(())
    }

    #[test]
    fn stopped_is_terminal() -> Result<()> {
        let drive = Drive::new(0.5, 0.1)?;
        let mut sim = Simulation::<2>::new(qualitative_model(), setup(2), drive, Some(1))?;
        sim.stop();
        assert_eq!(sim.state(), SimState::Stopped);
        assert!(sim.tick().is_err());
        assert!(sim.reset().is_err());
        Ok(())
    }
}
