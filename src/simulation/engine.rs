//! End-to-end run of a `SimulationConfig`
//!
//! Validates the whole configuration up front, then wires the body registry,
//! the gravitational field and the adaptive integrator together.

use log::debug;

use crate::error::{SimError, SimResult};
use crate::simulation::forces::NewtonianGravity;
use crate::simulation::integrator::{integrate_with_stats, IntegrationStats};
use crate::simulation::params::IntegratorParameters;
use crate::simulation::registry;
use crate::simulation::states::{validate_sample_times, SimulationConfig, Trajectory};

/// Integrate `config` and return its trajectory
pub fn simulate(config: &SimulationConfig, params: &IntegratorParameters) -> SimResult<Trajectory> {
    simulate_with_stats(config, params).map(|(traj, _)| traj)
}

/// Integrate `config`, also reporting the integrator's work counters
pub fn simulate_with_stats(
    config: &SimulationConfig,
    params: &IntegratorParameters,
) -> SimResult<(Trajectory, IntegrationStats)> {
    let initial = registry::validate_and_flatten(&config.bodies)?;
    validate_sample_times(&config.sample_times)?;
    params.validate()?;
    if !config.gravitational_constant.is_finite() {
        return Err(SimError::invalid(format!(
            "gravitational constant {} is not finite",
            config.gravitational_constant
        )));
    }

    debug!(
        "simulating {} bodies in {}D over {} samples",
        config.body_count(),
        config.dimension(),
        config.sample_times.len()
    );

    let field = NewtonianGravity::new(config.gravitational_constant, registry::masses(&config.bodies));
    integrate_with_stats(&initial, &config.sample_times, &field, params)
}
