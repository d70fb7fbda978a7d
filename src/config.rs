//! Scenario configuration loaded from YAML and/or the command line.
//!
//! A scenario starts from a named preset; a YAML document and then CLI flags
//! override individual fields. Every field of [`ScenarioConfig`] is optional.
//!
//! # YAML format
//!
//! ```yaml
//! preset: qualitative         # thermal | qualitative | screen
//!
//! engine:
//!   dimension: 3              # 2 or 3
//!   boundary: reflective      # open | reflective | periodic-x | toroidal
//!                             # (also confined-reflective, confined-periodic-x)
//!   scattering: isotropic     # isotropic | thermal | uniform-box
//!   field_policy: raw         # raw | charge-mass (or charge-mass-scaled)
//!
//! parameters:
//!   num_electrons: 30
//!   dt: 0.01
//!   visual_scale: 1.0
//!   field: 0.5
//!   scattering_time: 0.1
//!   isotropic_speed: 1.0
//!   seed: 42
//!   history_limit: 10000
//!   spawn: origin             # origin | uniform
//!   initial_velocity: fixed   # zero | fixed | thermal
//!   initial_velocity_xy: [0.1, 0.0]
//!   slab: { left: -5.0, right: 5.0, bottom: -0.5, top: 0.5 }
//!   viewport: [800.0, 600.0]
//!
//! constants:
//!   charge: -1.60217662e-19
//!   mass: 9.10938356e-31
//!   boltzmann: 1.380649e-23
//!   temperature: 300.0
//! ```
//!
//! Slab and viewport are in physical units, the same units as positions.

use crate::core::policy::{BoundaryMode, Constants, FieldPolicy, ScatteringPolicy, Slab};
use crate::core::sim::{EnsembleSetup, InitialVelocity, Simulation, Spawn, DEFAULT_HISTORY_LIMIT};
use crate::core::stepper::{Drive, DrudeModel};
use crate::error::{Error, Result};
use clap::ValueEnum;
use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Ensemble size used when none is given.
pub const DEFAULT_NUM_ELECTRONS: usize = 30;

/// Named starting points, one per classic demo.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PresetName {
    /// SI units, thermal resampling, open space, positions magnified 1e10 for display.
    Thermal,
    /// Unitless demo: raw field, fixed-speed isotropic scattering.
    Qualitative,
    /// 2D 800x600 viewport with toroidal wrap-around.
    Screen,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryKind {
    Open,
    #[serde(alias = "confined-reflective")]
    #[value(alias = "confined-reflective")]
    Reflective,
    #[serde(alias = "confined-periodic-x")]
    #[value(alias = "confined-periodic-x")]
    PeriodicX,
    Toroidal,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScatteringKind {
    Isotropic,
    Thermal,
    UniformBox,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FieldPolicyKind {
    Raw,
    #[serde(alias = "charge-mass-scaled")]
    #[value(alias = "charge-mass-scaled")]
    ChargeMass,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SpawnKind {
    Origin,
    Uniform,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InitialVelocityKind {
    Zero,
    Fixed,
    Thermal,
}

/// Structural choices of the simulation.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub dimension: Option<usize>,
    pub boundary: Option<BoundaryKind>,
    pub scattering: Option<ScatteringKind>,
    pub field_policy: Option<FieldPolicyKind>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SlabConfig {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

/// Numerical parameters and initial conditions.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ParametersConfig {
    /// Signed so that a non-positive request is reported as an error, not a parse failure.
    pub num_electrons: Option<i64>,
    pub dt: Option<f64>,
    pub visual_scale: Option<f64>,
    pub field: Option<f64>,
    pub scattering_time: Option<f64>,
    pub isotropic_speed: Option<f64>,
    pub seed: Option<u64>,
    pub history_limit: Option<usize>,
    pub spawn: Option<SpawnKind>,
    pub initial_velocity: Option<InitialVelocityKind>,
    pub initial_velocity_xy: Option<[f64; 2]>,
    pub slab: Option<SlabConfig>,
    pub viewport: Option<[f64; 2]>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConstantsConfig {
    pub charge: Option<f64>,
    pub mass: Option<f64>,
    pub boltzmann: Option<f64>,
    pub temperature: Option<f64>,
}

/// Top-level scenario document.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub preset: Option<PresetName>,
    pub engine: EngineConfig,
    pub parameters: ParametersConfig,
    pub constants: ConstantsConfig,
}

macro_rules! overlay {
    ($base:expr, $top:expr, $($field:ident),+ $(,)?) => {
        $( if $top.$field.is_some() { $base.$field = $top.$field; } )+
    };
}

impl ScenarioConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Fields set in `top` replace those in `self`.
    pub fn overlay(mut self, top: &ScenarioConfig) -> Self {
        if top.preset.is_some() {
            self.preset = top.preset;
        }
        overlay!(self.engine, top.engine, dimension, boundary, scattering, field_policy);
        overlay!(
            self.parameters,
            top.parameters,
            num_electrons,
            dt,
            visual_scale,
            field,
            scattering_time,
            isotropic_speed,
            seed,
            history_limit,
            spawn,
            initial_velocity,
            initial_velocity_xy,
            slab,
            viewport,
        );
        overlay!(self.constants, top.constants, charge, mass, boltzmann, temperature);
        self
    }
}

/// A fully resolved scenario: every choice made, ready to build a [`Simulation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub preset: PresetName,
    pub dimension: usize,
    pub boundary: BoundaryKind,
    pub scattering: ScatteringKind,
    pub field_policy: FieldPolicyKind,
    pub num_electrons: usize,
    pub dt: f64,
    pub visual_scale: f64,
    pub field: f64,
    pub scattering_time: f64,
    pub isotropic_speed: f64,
    pub seed: Option<u64>,
    pub history_limit: usize,
    pub spawn: SpawnKind,
    pub initial_velocity: InitialVelocityKind,
    pub initial_velocity_xy: [f64; 2],
    pub slab: Slab,
    pub viewport: [f64; 2],
    pub constants: Constants,
}

impl Scenario {
    /// Defaults of a named preset.
    pub fn preset(name: PresetName) -> Self {
        match name {
            PresetName::Thermal => {
                let visual_scale = 1e10;
                Self {
                    preset: name,
                    dimension: 3,
                    boundary: BoundaryKind::Open,
                    scattering: ScatteringKind::Thermal,
                    field_policy: FieldPolicyKind::ChargeMass,
                    num_electrons: DEFAULT_NUM_ELECTRONS,
                    dt: 1e-14,
                    visual_scale,
                    field: 0.0,
                    scattering_time: 2e-14,
                    isotropic_speed: Constants::electron().thermal_speed(),
                    seed: None,
                    history_limit: DEFAULT_HISTORY_LIMIT,
                    spawn: SpawnKind::Origin,
                    initial_velocity: InitialVelocityKind::Thermal,
                    initial_velocity_xy: [0.0, 0.0],
                    slab: display_slab(visual_scale),
                    viewport: [800.0 / visual_scale, 600.0 / visual_scale],
                    constants: Constants::electron(),
                }
            }
            PresetName::Qualitative => Self {
                preset: name,
                dimension: 3,
                boundary: BoundaryKind::Open,
                scattering: ScatteringKind::Isotropic,
                field_policy: FieldPolicyKind::Raw,
                num_electrons: DEFAULT_NUM_ELECTRONS,
                dt: 0.01,
                visual_scale: 1.0,
                field: 0.5,
                scattering_time: 0.1,
                isotropic_speed: 1.0,
                seed: None,
                history_limit: DEFAULT_HISTORY_LIMIT,
                spawn: SpawnKind::Origin,
                initial_velocity: InitialVelocityKind::Fixed,
                initial_velocity_xy: [0.1, 0.0],
                slab: display_slab(1.0),
                viewport: [800.0, 600.0],
                constants: Constants::electron(),
            },
            PresetName::Screen => {
                let visual_scale = 1e9;
                Self {
                    preset: name,
                    dimension: 2,
                    boundary: BoundaryKind::Toroidal,
                    scattering: ScatteringKind::UniformBox,
                    field_policy: FieldPolicyKind::ChargeMass,
                    num_electrons: 1,
                    dt: 1e-13,
                    visual_scale,
                    field: 1e6,
                    scattering_time: 1e-15,
                    isotropic_speed: Constants::electron().thermal_speed(),
                    seed: None,
                    history_limit: DEFAULT_HISTORY_LIMIT,
                    spawn: SpawnKind::Uniform,
                    initial_velocity: InitialVelocityKind::Zero,
                    initial_velocity_xy: [0.0, 0.0],
                    slab: display_slab(visual_scale),
                    viewport: [800.0 / visual_scale, 600.0 / visual_scale],
                    constants: Constants::electron(),
                }
            }
        }
    }

    /// Resolve a configuration document against its preset (default: `qualitative`).
    pub fn from_config(cfg: &ScenarioConfig) -> Result<Self> {
        let mut s = Self::preset(cfg.preset.unwrap_or(PresetName::Qualitative));

        let e = &cfg.engine;
        if let Some(d) = e.dimension {
            s.dimension = d;
        }
        if let Some(b) = e.boundary {
            s.boundary = b;
        }
        if let Some(k) = e.scattering {
            s.scattering = k;
        }
        if let Some(f) = e.field_policy {
            s.field_policy = f;
        }

        let p = &cfg.parameters;
        if let Some(n) = p.num_electrons {
            s.num_electrons = usize::try_from(n)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| Error::invalid(format!("num_electrons must be > 0, got {n}")))?;
        }
        if let Some(v) = p.dt {
            s.dt = v;
        }
        if let Some(v) = p.visual_scale {
            s.visual_scale = v;
        }
        if let Some(v) = p.field {
            s.field = v;
        }
        if let Some(v) = p.scattering_time {
            s.scattering_time = v;
        }
        if let Some(v) = p.isotropic_speed {
            s.isotropic_speed = v;
        }
        if p.seed.is_some() {
            s.seed = p.seed;
        }
        if let Some(v) = p.history_limit {
            s.history_limit = v;
        }
        if let Some(v) = p.spawn {
            s.spawn = v;
        }
        if let Some(v) = p.initial_velocity {
            s.initial_velocity = v;
        }
        if let Some(v) = p.initial_velocity_xy {
            s.initial_velocity_xy = v;
        }
        if let Some(sc) = p.slab {
            s.slab = Slab::new(sc.left, sc.right, sc.bottom, sc.top)?;
        }
        if let Some(v) = p.viewport {
            s.viewport = v;
        }

        let c = &cfg.constants;
        if let Some(v) = c.charge {
            s.constants.charge = v;
        }
        if let Some(v) = c.mass {
            s.constants.mass = v;
        }
        if let Some(v) = c.boltzmann {
            s.constants.boltzmann = v;
        }
        if let Some(v) = c.temperature {
            s.constants.temperature = v;
        }

        s.validate()?;
        debug!("resolved scenario: {s:?}");
        Ok(s)
    }

    /// Check everything that can be checked without building the simulation.
    pub fn validate(&self) -> Result<()> {
        if self.dimension != 2 && self.dimension != 3 {
            return Err(Error::Config(format!(
                "dimension must be 2 or 3, got {}",
                self.dimension
            )));
        }
        self.model()?;
        self.ensemble()?.validate()?;
        self.drive()?;
        if !self.visual_scale.is_finite() || self.visual_scale <= 0.0 {
            return Err(Error::invalid("visual_scale must be finite and > 0"));
        }
        Ok(())
    }

    pub fn boundary_mode(&self) -> BoundaryMode {
        match self.boundary {
            BoundaryKind::Open => BoundaryMode::Open,
            BoundaryKind::Reflective => BoundaryMode::Reflective(self.slab),
            BoundaryKind::PeriodicX => BoundaryMode::PeriodicX(self.slab),
            BoundaryKind::Toroidal => BoundaryMode::Toroidal {
                width: self.viewport[0],
                height: self.viewport[1],
            },
        }
    }

    pub fn scattering_policy(&self) -> ScatteringPolicy {
        match self.scattering {
            ScatteringKind::Isotropic => ScatteringPolicy::Isotropic {
                speed: self.isotropic_speed,
            },
            ScatteringKind::Thermal => ScatteringPolicy::Thermal,
            ScatteringKind::UniformBox => ScatteringPolicy::UniformBox,
        }
    }

    pub fn field_policy(&self) -> FieldPolicy {
        match self.field_policy {
            FieldPolicyKind::Raw => FieldPolicy::Raw,
            FieldPolicyKind::ChargeMass => FieldPolicy::ChargeMassScaled,
        }
    }

    pub fn model(&self) -> Result<DrudeModel> {
        DrudeModel::new(
            self.scattering_policy(),
            self.field_policy(),
            self.boundary_mode(),
            self.constants,
            self.dt,
        )
    }

    /// Spawn region follows the boundary: the viewport when toroidal, the slab otherwise.
    pub fn ensemble(&self) -> Result<EnsembleSetup> {
        let spawn = match self.spawn {
            SpawnKind::Origin => Spawn::Origin,
            SpawnKind::Uniform => match self.boundary {
                BoundaryKind::Toroidal => {
                    Spawn::Uniform(Slab::new(0.0, self.viewport[0], 0.0, self.viewport[1])?)
                }
                _ => Spawn::Uniform(self.slab),
            },
        };
        let initial_velocity = match self.initial_velocity {
            InitialVelocityKind::Zero => InitialVelocity::Zero,
            InitialVelocityKind::Fixed => InitialVelocity::Fixed {
                vx: self.initial_velocity_xy[0],
                vy: self.initial_velocity_xy[1],
            },
            InitialVelocityKind::Thermal => InitialVelocity::Thermal,
        };
        Ok(EnsembleSetup {
            num_particles: self.num_electrons,
            spawn,
            initial_velocity,
        })
    }

    pub fn drive(&self) -> Result<Drive> {
        Drive::new(self.field, self.scattering_time)
    }

    /// Build the simulation; `D` must equal the configured dimension.
    pub fn build<const D: usize>(&self) -> Result<Simulation<D>> {
        if D != self.dimension {
            return Err(Error::Config(format!(
                "scenario is {}D but a {}D simulation was requested",
                self.dimension, D
            )));
        }
        let sim = Simulation::new(self.model()?, self.ensemble()?, self.drive()?, self.seed)?
            .with_visual_scale(self.visual_scale)?
            .with_history_limit(self.history_limit);
        Ok(sim)
    }
}

/// A 10 x 1 display-unit slab centered on the origin, expressed in physical units.
fn display_slab(visual_scale: f64) -> Slab {
    let half_len = 5.0 / visual_scale;
    let half_width = 0.5 / visual_scale;
    Slab {
        left: -half_len,
        right: half_len,
        bottom: -half_width,
        top: half_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() -> Result<()> {
        for name in [PresetName::Thermal, PresetName::Qualitative, PresetName::Screen] {
            Scenario::preset(name).validate()?;
        }
        Ok(())
    }

    #[test]
    fn empty_document_is_qualitative() -> Result<()> {
        let cfg = ScenarioConfig::from_yaml_str("{}")?;
        let s = Scenario::from_config(&cfg)?;
        assert_eq!(s, Scenario::preset(PresetName::Qualitative));
        Ok(())
    }

    #[test]
    fn yaml_overrides_preset() -> Result<()> {
        let yaml = r#"
preset: thermal
engine:
  boundary: periodic-x
  field_policy: raw
parameters:
  num_electrons: 100
  scattering_time: 5.0e-14
  slab: { left: -1.0e-9, right: 1.0e-9, bottom: -1.0e-10, top: 1.0e-10 }
constants:
  temperature: 77.0
"#;
        let s = Scenario::from_config(&ScenarioConfig::from_yaml_str(yaml)?)?;
        assert_eq!(s.preset, PresetName::Thermal);
        assert_eq!(s.boundary, BoundaryKind::PeriodicX);
        assert_eq!(s.field_policy, FieldPolicyKind::Raw);
        assert_eq!(s.scattering, ScatteringKind::Thermal);
        assert_eq!(s.num_electrons, 100);
        assert_eq!(s.scattering_time, 5e-14);
        assert_eq!(s.constants.temperature, 77.0);
        assert_eq!(s.slab.right, 1e-9);
        assert!(matches!(s.boundary_mode(), BoundaryMode::PeriodicX(_)));
        Ok(())
    }

    #[test]
    fn non_positive_electron_count_rejected() -> Result<()> {
        for n in [0, -4] {
            let yaml = format!("parameters:\n  num_electrons: {n}\n");
            let cfg = ScenarioConfig::from_yaml_str(&yaml)?;
            let err = Scenario::from_config(&cfg).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter(_)), "n = {n}: {err}");
        }
        Ok(())
    }

    #[test]
    fn long_policy_names_accepted() -> Result<()> {
        let yaml = r#"
engine:
  boundary: confined-periodic-x
  field_policy: charge-mass-scaled
"#;
        let cfg = ScenarioConfig::from_yaml_str(yaml)?;
        assert_eq!(cfg.engine.boundary, Some(BoundaryKind::PeriodicX));
        assert_eq!(cfg.engine.field_policy, Some(FieldPolicyKind::ChargeMass));

        let cfg = ScenarioConfig::from_yaml_str("engine:\n  boundary: confined-reflective\n")?;
        assert_eq!(cfg.engine.boundary, Some(BoundaryKind::Reflective));

        assert_eq!(
            BoundaryKind::from_str("confined-reflective", false),
            Ok(BoundaryKind::Reflective)
        );
        assert_eq!(
            FieldPolicyKind::from_str("charge-mass-scaled", false),
            Ok(FieldPolicyKind::ChargeMass)
        );
        Ok(())
    }

    #[test]
    fn invalid_values_rejected() {
        let bad_tau =
            ScenarioConfig::from_yaml_str("parameters:\n  scattering_time: 0.0\n").unwrap();
        let err = Scenario::from_config(&bad_tau).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));

        let bad_dt = ScenarioConfig::from_yaml_str("parameters:\n  dt: -1.0\n").unwrap();
        assert!(Scenario::from_config(&bad_dt).is_err());

        let bad_dim = ScenarioConfig::from_yaml_str("engine:\n  dimension: 4\n").unwrap();
        assert!(matches!(Scenario::from_config(&bad_dim).unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(ScenarioConfig::from_yaml_str("parameters:\n  nope: 1\n").is_err());
        assert!(ScenarioConfig::from_yaml_str("engine:\n  boundary: sideways\n").is_err());
    }

    #[test]
    fn overlay_prefers_top() -> Result<()> {
        let yaml = "preset: screen\nparameters:\n  field: 1.0\n  dt: 0.5\n";
        let base = ScenarioConfig::from_yaml_str(yaml)?;
        let mut top = ScenarioConfig::default();
        top.parameters.field = Some(-2.0);
        let merged = base.overlay(&top);
        assert_eq!(merged.preset, Some(PresetName::Screen));
        assert_eq!(merged.parameters.field, Some(-2.0));
        assert_eq!(merged.parameters.dt, Some(0.5));
        Ok(())
    }

    #[test]
    fn build_checks_dimension() -> Result<()> {
        let s = Scenario::preset(PresetName::Screen);
        assert!(s.build::<3>().is_err());
        let sim = s.build::<2>()?;
        assert_eq!(sim.num_particles(), 1);
        Ok(())
    }
}
