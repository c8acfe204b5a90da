use std::time::Instant;

use crate::error::SimResult;
use crate::simulation::diagnostics::{energy_drift, total_energy};
use crate::simulation::engine::simulate_with_stats;
use crate::simulation::params::{IntegratorParameters, Method};
use crate::simulation::states::{linspace, Body, SimulationConfig, Tolerance};

/// One period of the equal-mass figure-eight choreography
pub const FIGURE_EIGHT_PERIOD: f64 = 6.325_913_98;

/// Figure-eight initial conditions, sampled `samples` times over `periods` periods
pub fn figure_eight(periods: f64, samples: usize) -> SimResult<SimulationConfig> {
    let sample_times = linspace(0.0, FIGURE_EIGHT_PERIOD * periods, samples)?;
    Ok(SimulationConfig {
        gravitational_constant: 1.0,
        bodies: vec![
            Body::new(1.0, vec![-0.97000436, 0.24308753], vec![-0.4662037, -0.4323657]),
            Body::new(1.0, vec![0.97000436, -0.24308753], vec![-0.4662037, -0.4323657]),
            Body::new(1.0, vec![0.0, 0.0], vec![0.93240737, 0.86473146]),
        ],
        sample_times,
    })
}

/// Sweep tolerances over the figure-eight and report cost against accuracy
/// Paste output directly into a spreadsheet to graph
pub fn bench_tolerance_sweep() -> SimResult<()> {
    let config = figure_eight(1.0, 200)?;
    let masses = config.masses();

    println!("method,rtol,steps,rejected,evals,ms,return_error,energy_drift");

    for method in [Method::Auto, Method::Adams, Method::Rosenbrock] {
        for exp in [4, 6, 8, 10, 12] {
            // the second-order stiff stepper is hopeless at tight tolerances
            if method == Method::Rosenbrock && exp > 8 {
                continue;
            }
            let tol = 10f64.powi(-exp);
            let params = IntegratorParameters {
                method,
                ..IntegratorParameters::with_tolerance(Tolerance::new(tol, tol))
            };

            let t0 = Instant::now();
            let result = simulate_with_stats(&config, &params);
            let ms = t0.elapsed().as_secs_f64() * 1000.0;

            let (traj, stats) = match result {
                Ok(ok) => ok,
                Err(e) => {
                    println!("{method:?},{tol:e},failed: {e}");
                    continue;
                }
            };
            let (Some(first), Some(last)) = (traj.first(), traj.last()) else {
                continue;
            };

            let return_error = (&last.state - &first.state).amax();
            let e0 = total_energy(&first.state, 1.0, &masses).unwrap_or(f64::NAN);
            let drift = traj
                .iter()
                .filter_map(|s| total_energy(&s.state, 1.0, &masses).ok())
                .map(|e| energy_drift(e0, e))
                .fold(0.0, f64::max);

            println!(
                "{:?},{:e},{},{},{},{:.3},{:.3e},{:.3e}",
                method,
                tol,
                stats.accepted_steps,
                stats.rejected_steps,
                stats.derivative_evals,
                ms,
                return_error,
                drift
            );
        }
    }
    Ok(())
}
