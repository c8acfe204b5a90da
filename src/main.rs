use threebody::{Scenario, ScenarioConfig, Trajectory};
use threebody::bench_tolerance_sweep;
use threebody::simulation::diagnostics::{energy_drift, total_energy};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Csv,
    Json,
}

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file, looked up under `scenarios/` when not found as given
    #[arg(short, default_value = "figure_eight.yaml")]
    file_name: String,

    /// Output format for the trajectory
    #[arg(long, value_enum, default_value = "csv")]
    format: Format,

    /// Write the trajectory here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run the tolerance sweep benchmark instead of a scenario
    #[arg(long)]
    bench: bool,
}

#[derive(Serialize)]
struct SampleRecord<'a> {
    t: f64,
    state: &'a [f64],
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let given = PathBuf::from(file_name);
    let config_path = if given.exists() {
        given
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };
    let file = File::open(&config_path)
        .with_context(|| format!("failed to open scenario {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("failed to parse scenario {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn write_trajectory(traj: &Trajectory, format: Format, out: &mut dyn Write) -> Result<()> {
    match format {
        Format::Csv => {
            for s in traj {
                let row: Vec<String> = std::iter::once(s.t)
                    .chain(s.state.iter().copied())
                    .map(|v| format!("{v:e}"))
                    .collect();
                writeln!(out, "{}", row.join(","))?;
            }
        }
        Format::Json => {
            let records: Vec<SampleRecord> = traj
                .iter()
                .map(|s| SampleRecord {
                    t: s.t,
                    state: s.state.as_slice(),
                })
                .collect();
            serde_json::to_writer(&mut *out, &records)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.bench {
        bench_tolerance_sweep()?;
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let scenario = Scenario::build_scenario(scenario_cfg)?;

    let (traj, stats) = scenario
        .run_with_stats()
        .with_context(|| format!("scenario '{}' failed", scenario.name))?;

    let masses = scenario.config.masses();
    let g = scenario.config.gravitational_constant;
    if let (Some(first), Some(last)) = (traj.first(), traj.last()) {
        let e0 = total_energy(&first.state, g, &masses)?;
        let e1 = total_energy(&last.state, g, &masses)?;
        info!(
            "'{}': {} samples, {} steps, energy drift {:e}{}",
            scenario.name,
            traj.len(),
            stats.accepted_steps,
            energy_drift(e0, e1),
            if e0 == 0.0 { " (absolute)" } else { "" }
        );
    }

    let series = scenario.series(&traj)?;
    for (label, body) in scenario.labels.iter().zip(&series.bodies) {
        info!("{label} final position {:?}", body.final_position());
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_trajectory(&traj, args.format, &mut BufWriter::new(file))?;
        }
        None => {
            let stdout = io::stdout();
            write_trajectory(&traj, args.format, &mut stdout.lock())?;
        }
    }

    Ok(())
}
