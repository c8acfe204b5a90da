//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`ParametersConfig`] – physical constant, sample times and integrator settings
//! - [`BodyConfig`]       – initial state for each body
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! The figure-eight choreography:
//!
//! ```yaml
//! name: figure eight
//!
//! parameters:
//!   G: 1.0                  # gravitational constant
//!   t_end: 6.32591398       # one period
//!   samples: 400            # evenly spaced, both ends included
//!   atol: 1.0e-10           # absolute error tolerance
//!   rtol: 1.0e-10           # relative error tolerance
//!   method: "auto"          # or "adams" / "rosenbrock"
//!
//! bodies:
//!   - label: "Body A"
//!     m: 1.0
//!     x: [ -0.97000436,  0.24308753 ]
//!     v: [ -0.4662037,  -0.4323657 ]
//!   - label: "Body B"
//!     m: 1.0
//!     x: [  0.97000436, -0.24308753 ]
//!     v: [ -0.4662037,  -0.4323657 ]
//!   - label: "Body C"
//!     m: 1.0
//!     x: [ 0.0, 0.0 ]
//!     v: [ 0.93240737, 0.86473146 ]
//! ```
//!
//! Instead of `t_end`/`samples` an explicit `sample_times` list may be given.
//! The scenario builder maps this into a `SimulationConfig` plus
//! `IntegratorParameters`.

use serde::Deserialize;

use crate::error::{SimError, SimResult};
use crate::simulation::params::Method;
use crate::simulation::states::linspace;

/// Which stepper the integrator uses
/// `method: "auto"`, `"adams"` or `"rosenbrock"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodConfig {
    #[default]
    #[serde(rename = "auto")] // Adams with a stiff fallback near close encounters
    Auto,

    #[serde(rename = "adams")] // Variable-order Adams predictor-corrector only
    Adams,

    #[serde(rename = "rosenbrock")] // Linearly implicit Rosenbrock 2(3) only
    Rosenbrock,
}

impl From<MethodConfig> for Method {
    fn from(cfg: MethodConfig) -> Self {
        match cfg {
            MethodConfig::Auto => Method::Auto,
            MethodConfig::Adams => Method::Adams,
            MethodConfig::Rosenbrock => Method::Rosenbrock,
        }
    }
}

fn default_atol() -> f64 {
    1e-8
}

fn default_rtol() -> f64 {
    1e-6
}

/// Physical constant, sampling and integrator settings for a scenario
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    #[serde(rename = "G")]
    pub g: f64, // gravitational constant
    #[serde(default)]
    pub t_start: f64, // initial time
    pub t_end: Option<f64>, // final time, with `samples`
    pub samples: Option<usize>, // number of evenly spaced samples
    pub sample_times: Option<Vec<f64>>, // explicit sample times, overrides t_end/samples
    #[serde(default = "default_atol")]
    pub atol: f64, // absolute error tolerance
    #[serde(default = "default_rtol")]
    pub rtol: f64, // relative error tolerance
    #[serde(default)]
    pub method: MethodConfig, // stepper selection
    pub h0: Option<f64>, // initial step size
    pub h_max: Option<f64>, // maximum step size
    pub max_order: Option<usize>, // Adams order cap
    pub max_steps: Option<usize>, // step budget per sample interval
}

impl ParametersConfig {
    /// Resolve the requested sample times
    pub fn resolve_sample_times(&self) -> SimResult<Vec<f64>> {
        if let Some(times) = &self.sample_times {
            return Ok(times.clone());
        }
        match (self.t_end, self.samples) {
            (Some(t_end), Some(samples)) => linspace(self.t_start, t_end, samples),
            _ => Err(SimError::invalid(
                "parameters need either `sample_times` or both `t_end` and `samples`",
            )),
        }
    }
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub label: Option<String>, // display name for the visualisation layer
    pub m: f64, // mass
    pub x: Vec<f64>, // initial position, 2 or 3 components
    pub v: Vec<f64>, // initial velocity, same dimension as `x`
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub name: Option<String>, // human readable scenario name
    pub parameters: ParametersConfig, // constants, sampling and integrator settings
    pub bodies: Vec<BodyConfig>, // bodies in state order
}

impl ScenarioConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
