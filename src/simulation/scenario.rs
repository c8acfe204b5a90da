//! Build runnable simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a `Scenario` holding:
//! - the validated `SimulationConfig` (constant, bodies, sample times)
//! - the integrator settings (`IntegratorParameters`)
//! - a display label per body for whoever plots the result
//!
//! Validation happens here, once, so a built scenario is always runnable.

use crate::configuration::config::{BodyConfig, ScenarioConfig};
use crate::error::SimResult;
use crate::simulation::engine::{simulate, simulate_with_stats};
use crate::simulation::integrator::IntegrationStats;
use crate::simulation::params::IntegratorParameters;
use crate::simulation::registry;
use crate::simulation::sampler::{reshape, PerBodySeries};
use crate::simulation::states::{validate_sample_times, Body, SimulationConfig, Tolerance, Trajectory};

/// "Body A", "Body B", ... then "Body 27", "Body 28", ...
fn default_label(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => format!("Body {}", char::from(b'A' + i)),
        _ => format!("Body {}", index + 1),
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub config: SimulationConfig,
    pub parameters: IntegratorParameters,
    pub labels: Vec<String>,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> SimResult<Self> {
        let sample_times = cfg.parameters.resolve_sample_times()?;
        validate_sample_times(&sample_times)?;

        // Bodies: map `BodyConfig` -> runtime `Body`
        let labels = cfg
            .bodies
            .iter()
            .enumerate()
            .map(|(i, bc)| bc.label.clone().unwrap_or_else(|| default_label(i)))
            .collect();
        let bodies: Vec<Body> = cfg
            .bodies
            .into_iter()
            .map(|bc: BodyConfig| Body::new(bc.m, bc.x, bc.v))
            .collect();
        registry::validate(&bodies)?;

        let p = cfg.parameters;
        let defaults = IntegratorParameters::default();
        let parameters = IntegratorParameters {
            tolerance: Tolerance::new(p.atol, p.rtol),
            method: p.method.into(),
            h0: p.h0,
            h_max: p.h_max,
            max_order: p.max_order.unwrap_or(defaults.max_order),
            max_steps: p.max_steps.unwrap_or(defaults.max_steps),
            ..defaults
        };
        parameters.validate()?;

        Ok(Self {
            name: cfg.name.unwrap_or_else(|| "unnamed scenario".to_string()),
            config: SimulationConfig {
                gravitational_constant: p.g,
                bodies,
                sample_times,
            },
            parameters,
            labels,
        })
    }

    pub fn run(&self) -> SimResult<Trajectory> {
        simulate(&self.config, &self.parameters)
    }

    pub fn run_with_stats(&self) -> SimResult<(Trajectory, IntegrationStats)> {
        simulate_with_stats(&self.config, &self.parameters)
    }

    /// Per-body series of a trajectory produced by this scenario
    pub fn series(&self, trajectory: &Trajectory) -> SimResult<PerBodySeries> {
        reshape(trajectory, self.config.body_count(), self.config.dimension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    const FIGURE_EIGHT: &str = r#"
name: figure eight
parameters:
  G: 1.0
  t_end: 1.0
  samples: 11
  method: "adams"
  max_order: 6
bodies:
  - label: "Body A"
    m: 1.0
    x: [-0.97000436, 0.24308753]
    v: [-0.4662037, -0.4323657]
  - m: 1.0
    x: [0.97000436, -0.24308753]
    v: [-0.4662037, -0.4323657]
  - m: 1.0
    x: [0.0, 0.0]
    v: [0.93240737, 0.86473146]
"#;

    #[test]
    fn builds_and_runs() {
        let cfg = ScenarioConfig::from_yaml_str(FIGURE_EIGHT).unwrap();
        let scenario = Scenario::build_scenario(cfg).unwrap();
        assert_eq!(scenario.name, "figure eight");
        assert_eq!(scenario.labels, vec!["Body A", "Body B", "Body C"]);
        assert_eq!(scenario.parameters.max_order, 6);

        let traj = scenario.run().unwrap();
        assert_eq!(traj.len(), 11);

        let series = scenario.series(&traj).unwrap();
        assert_eq!(series.bodies.len(), 3);
        assert_eq!(series.dimension, 2);
    }

    #[test]
    fn zero_mass_fails_at_build_time() {
        let text = FIGURE_EIGHT.replacen("m: 1.0", "m: 0.0", 1);
        let cfg = ScenarioConfig::from_yaml_str(&text).unwrap();
        assert!(matches!(
            Scenario::build_scenario(cfg),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn labels_run_past_the_alphabet() {
        assert_eq!(default_label(0), "Body A");
        assert_eq!(default_label(25), "Body Z");
        assert_eq!(default_label(26), "Body 27");
    }
}
