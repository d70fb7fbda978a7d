use clap::ValueEnum;
use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{
    BoundaryKind, FieldPolicyKind, PresetName, Scenario, ScenarioConfig, ScatteringKind,
};
use crate::core::Simulation;

const DIM: usize = 3;

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_choice<T: ValueEnum>(what: &str, value: &str) -> PyResult<T> {
    T::from_str(value, true).map_err(|_| py_err(format!("unknown {what}: {value:?}")))
}

fn rows_to_array<'py>(py: Python<'py>, rows: &[[f64; DIM]]) -> Py<PyArray2<f64>> {
    let mut arr = Array2::<f64>::zeros((rows.len(), DIM));
    for (i, row) in rows.iter().enumerate() {
        for k in 0..DIM {
            arr[[i, k]] = row[k];
        }
    }
    arr.into_pyarray(py).unbind()
}

/// Python-facing wrapper around a 3D Drude simulation.
///
/// - __new__(num_electrons=30, preset="thermal", boundary=None, scattering=None,
///           field_policy=None, seed=None, config=None)
/// - tick() -> (t, (x, y, z))
/// - advance(n)
/// - get_positions() / get_display_positions() / get_velocities() -> np.ndarray (N, 3)
#[pyclass]
pub struct DrudeSim {
    sim: Simulation<DIM>,
}

#[pymethods]
impl DrudeSim {
    /// Build a simulation from a preset, optional YAML file and keyword overrides.
    ///
    /// Errors: raises ValueError on invalid parameters or an unreadable config.
    #[new]
    #[pyo3(signature = (num_electrons=30, preset="thermal", boundary=None, scattering=None, field_policy=None, seed=None, config=None))]
    fn new(
        num_electrons: i64,
        preset: &str,
        boundary: Option<&str>,
        scattering: Option<&str>,
        field_policy: Option<&str>,
        seed: Option<u64>,
        config: Option<std::path::PathBuf>,
    ) -> PyResult<Self> {
        let base = match config {
            Some(path) => ScenarioConfig::from_yaml_file(path).map_err(py_err)?,
            None => ScenarioConfig::default(),
        };

        let mut top = ScenarioConfig::default();
        top.preset = Some(parse_choice::<PresetName>("preset", preset)?);
        top.engine.dimension = Some(DIM);
        if let Some(b) = boundary {
            top.engine.boundary = Some(parse_choice::<BoundaryKind>("boundary", b)?);
        }
        if let Some(s) = scattering {
            top.engine.scattering = Some(parse_choice::<ScatteringKind>("scattering", s)?);
        }
        if let Some(f) = field_policy {
            top.engine.field_policy = Some(parse_choice::<FieldPolicyKind>("field_policy", f)?);
        }
        top.parameters.num_electrons = Some(num_electrons);
        top.parameters.seed = seed;

        let scenario = Scenario::from_config(&base.overlay(&top)).map_err(py_err)?;
        let sim = scenario.build::<DIM>().map_err(py_err)?;
        Ok(Self { sim })
    }

    /// Advance one step; returns (t, mean_position).
    fn tick(&mut self) -> PyResult<(f64, (f64, f64, f64))> {
        let s = self.sim.tick().map_err(py_err)?;
        Ok((s.t, (s.mean[0], s.mean[1], s.mean[2])))
    }

    /// Advance `n` steps (releases the GIL during computation).
    fn advance(&mut self, py: Python<'_>, n: u64) -> PyResult<()> {
        py.detach(|| self.sim.advance(n).map(|_| ()))
            .map_err(py_err)
    }

    /// Clear history and re-create the ensemble.
    fn reset(&mut self) -> PyResult<()> {
        self.sim.reset().map_err(py_err)
    }

    /// Current simulation time.
    #[getter]
    fn time(&self) -> f64 {
        self.sim.time()
    }

    /// Physical positions, shape (N, 3).
    fn get_positions<'py>(&self, py: Python<'py>) -> Py<PyArray2<f64>> {
        rows_to_array(py, &self.sim.positions())
    }

    /// Positions multiplied by the visual scale, shape (N, 3).
    fn get_display_positions<'py>(&self, py: Python<'py>) -> Py<PyArray2<f64>> {
        rows_to_array(py, &self.sim.display_positions())
    }

    /// Velocities, shape (N, 3).
    fn get_velocities<'py>(&self, py: Python<'py>) -> Py<PyArray2<f64>> {
        rows_to_array(py, &self.sim.velocities())
    }

    /// Set the electric field (any finite value).
    fn set_field(&self, field: f64) -> PyResult<()> {
        self.sim.controls().set_field(field).map_err(py_err)
    }

    /// Set the mean free time (must be > 0).
    fn set_scattering_time(&self, scattering_time: f64) -> PyResult<()> {
        self.sim
            .controls()
            .set_scattering_time(scattering_time)
            .map_err(py_err)
    }

    /// Theoretical drift velocity q E τ / m for the current parameters.
    fn drift_velocity(&self) -> f64 {
        self.sim.drift_velocity()
    }

    /// Ensemble-average velocity.
    fn mean_velocity(&self) -> (f64, f64, f64) {
        let v = self.sim.mean_velocity();
        (v[0], v[1], v[2])
    }

    /// Return a (M, 4) array of [t, x, y, z] mean-position samples.
    ///
    /// - window: if provided, only samples with t >= (current_time - window) are returned.
    #[pyo3(signature = (window=None))]
    fn get_history<'py>(
        &self,
        py: Python<'py>,
        window: Option<f64>,
    ) -> PyResult<Py<PyArray2<f64>>> {
        let samples = self.sim.history(window).map_err(py_err)?;
        let mut arr = Array2::<f64>::zeros((samples.len(), DIM + 1));
        for (i, s) in samples.iter().enumerate() {
            arr[[i, 0]] = s.t;
            for k in 0..DIM {
                arr[[i, k + 1]] = s.mean[k];
            }
        }
        Ok(arr.into_pyarray(py).unbind())
    }
}

/// The drudesim Python module entry point.
#[pymodule]
fn drudesim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<DrudeSim>()?;
    Ok(())
}
