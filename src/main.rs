use drudesim::config::{
    BoundaryKind, FieldPolicyKind, PresetName, Scenario, ScenarioConfig, ScatteringKind,
};
use drudesim::core::{ControlPanel, Simulation, StopToken};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

/// Headless Drude-model runner. Prints `t,mean_x,mean_y[,mean_z]` rows to stdout.
///
/// While running, type on stdin:
///   q          stop
///   r          reset the ensemble
///   e <value>  set the electric field
///   tau <value> set the scattering time
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML scenario file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    preset: Option<PresetName>,

    /// Number of electrons to simulate (default: 30).
    #[arg(long)]
    num_electrons: Option<i64>,

    #[arg(long, value_enum)]
    boundary: Option<BoundaryKind>,

    #[arg(long, value_enum)]
    scattering: Option<ScatteringKind>,

    #[arg(long, value_enum)]
    field_policy: Option<FieldPolicyKind>,

    /// 2 or 3.
    #[arg(long)]
    dimension: Option<usize>,

    #[arg(long, allow_hyphen_values = true)]
    field: Option<f64>,

    #[arg(long)]
    scattering_time: Option<f64>,

    #[arg(long)]
    dt: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many steps (default: run until `q`).
    #[arg(long)]
    steps: Option<u64>,

    /// Print every n-th sample.
    #[arg(long, default_value_t = 1)]
    every: u64,

    /// Cap on iterations per second.
    #[arg(long)]
    rate: Option<f64>,

    /// Also print each electron's display position after every printed row.
    #[arg(long)]
    particles: bool,
}

impl Args {
    fn as_overlay(&self) -> ScenarioConfig {
        let mut cfg = ScenarioConfig::default();
        cfg.preset = self.preset;
        cfg.engine.dimension = self.dimension;
        cfg.engine.boundary = self.boundary;
        cfg.engine.scattering = self.scattering;
        cfg.engine.field_policy = self.field_policy;
        cfg.parameters.num_electrons = self.num_electrons;
        cfg.parameters.field = self.field;
        cfg.parameters.scattering_time = self.scattering_time;
        cfg.parameters.dt = self.dt;
        cfg.parameters.seed = self.seed;
        cfg
    }
}

fn load_scenario(args: &Args) -> Result<Scenario> {
    let base = match &args.config {
        Some(path) => ScenarioConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };
    let scenario = Scenario::from_config(&base.overlay(&args.as_overlay()))?;
    Ok(scenario)
}

/// A console command typed while the simulation runs.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Quit,
    Reset,
    Field(f64),
    ScatteringTime(f64),
}

/// `None` for blank or unrecognised input.
fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let cmd = words.next()?.to_ascii_lowercase();
    let value = words.next().and_then(|w| w.parse::<f64>().ok());
    match cmd.as_str() {
        "q" => Some(Command::Quit),
        "r" => Some(Command::Reset),
        "e" => value.map(Command::Field),
        "tau" => value.map(Command::ScatteringTime),
        _ => None,
    }
}

/// Apply a command to the shared controls. Invalid values leave the panel unchanged.
fn apply_command(
    cmd: Command,
    stop: &StopToken,
    controls: &ControlPanel,
) -> drudesim::Result<()> {
    match cmd {
        Command::Quit => {
            stop.stop();
            Ok(())
        }
        Command::Reset => {
            controls.request_reset();
            Ok(())
        }
        Command::Field(v) => controls.set_field(v),
        Command::ScatteringTime(v) => controls.set_scattering_time(v),
    }
}

/// Console commands from stdin; runs until EOF or `q`.
fn spawn_input_monitor(stop: StopToken, controls: ControlPanel, scenario: Scenario) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let Some(cmd) = parse_command(&line) else {
                if !line.trim().is_empty() {
                    warn!("unrecognised command {line:?}");
                }
                continue;
            };
            match apply_command(cmd, &stop, &controls) {
                Ok(()) if cmd == Command::Quit => {
                    info!("received 'q', stopping simulation");
                    break;
                }
                Ok(()) => log_drift(&controls, &scenario),
                Err(e) => warn!("{e}"),
            }
        }
    });
}

/// Whether the sample at `step` is written when printing every `every`-th row.
fn is_printed(step: u64, every: u64) -> bool {
    step % every.max(1) == 0
}

/// Sleep interval for a `--rate` cap in iterations per second.
fn tick_period(rate: Option<f64>) -> Result<Option<Duration>> {
    let Some(rate) = rate else { return Ok(None) };
    if !rate.is_finite() || rate <= 0.0 {
        bail!("--rate must be finite and > 0, got {rate}");
    }
    let period = Duration::try_from_secs_f64(1.0 / rate)
        .with_context(|| format!("--rate {rate} is too small"))?;
    Ok(Some(period))
}

fn log_drift(controls: &ControlPanel, scenario: &Scenario) {
    let d = controls.snapshot();
    let vd = drudesim::core::drift_velocity(d.field, d.scattering_time, &scenario.constants);
    info!(
        "E = {:.4e}, tau = {:.4e}, theoretical drift velocity = {:.2e}",
        d.field, d.scattering_time, vd
    );
}

fn run<const D: usize>(scenario: &Scenario, args: &Args) -> Result<()> {
    let mut sim: Simulation<D> = scenario.build()?;
    let stop = StopToken::new();
    log_drift(&sim.controls(), scenario);
    spawn_input_monitor(stop.clone(), sim.controls(), scenario.clone());

    let out = io::stdout();
    let mut out = BufWriter::new(out.lock());
    let axes = ["x", "y", "z"];
    let header: Vec<String> = axes[..D].iter().map(|a| format!("mean_{a}")).collect();
    writeln!(out, "t,{}", header.join(","))?;

    let period = tick_period(args.rate)?;
    let mut write_err: Option<io::Error> = None;
    let mut next_tick = Instant::now();

    let summary = sim.run(&stop, args.steps, |sample, particles| {
        if write_err.is_some() {
            return;
        }
        let step = (sample.t / scenario.dt).round() as u64;
        if is_printed(step, args.every) {
            let cols: Vec<String> = sample.mean.iter().map(|x| format!("{x:e}")).collect();
            let mut res = writeln!(out, "{:e},{}", sample.t, cols.join(","));
            if args.particles {
                for p in particles {
                    let disp = p.display_position(scenario.visual_scale);
                    let cols: Vec<String> = disp.iter().map(|x| format!("{x:e}")).collect();
                    res = res.and_then(|_| writeln!(out, "# {},{}", p.id, cols.join(",")));
                }
            }
            if let Err(e) = res {
                write_err = Some(e);
                stop.stop();
            }
        }
        if let Some(period) = period {
            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
    })?;
    out.flush()?;

    if let Some(e) = write_err {
        if e.kind() != io::ErrorKind::BrokenPipe {
            return Err(e.into());
        }
    }
    info!(
        "finished: {} steps, {} resets, t = {:e}{}",
        summary.steps,
        summary.resets,
        summary.time,
        if summary.stopped { " (stopped)" } else { "" }
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let scenario = load_scenario(&args)?;
    info!(
        "simulating {} electrons ({:?} preset, {:?} boundary, {:?} scattering)",
        scenario.num_electrons, scenario.preset, scenario.boundary, scenario.scattering
    );

    match scenario.dimension {
        2 => run::<2>(&scenario, &args),
        3 => run::<3>(&scenario, &args),
        d => bail!("unsupported dimension {d}"),
    }
}
