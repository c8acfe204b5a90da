//! Core state types for the N-body simulation.
//!
//! Defines the value types that flow through a run:
//! - `Body` / `SimulationConfig` describe the input
//! - `StateVector` is the flat canonical state (all positions, then all velocities)
//! - `Sample` / `Trajectory` hold the solver output at the requested instants
//!
//! Every type here is a plain value with no shared mutable state, so independent
//! runs can live on different threads without coordination.

use nalgebra::DVector;

use crate::error::{SimError, SimResult};

/// Flat state of `2 * N * D` components: positions of bodies 0..N, then velocities
pub type StateVector = DVector<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub mass: f64, // mass, strictly positive
    pub initial_position: Vec<f64>, // D components
    pub initial_velocity: Vec<f64>, // D components
}

impl Body {
    pub fn new(mass: f64, initial_position: Vec<f64>, initial_velocity: Vec<f64>) -> Self {
        Self {
            mass,
            initial_position,
            initial_velocity,
        }
    }

    /// Spatial dimension implied by the initial position
    pub fn dimension(&self) -> usize {
        self.initial_position.len()
    }
}

/// Everything a run needs besides the integrator settings
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub gravitational_constant: f64,
    pub bodies: Vec<Body>, // ordered, index is the body id in the state vector
    pub sample_times: Vec<f64>, // strictly increasing, first entry is the initial time
}

impl SimulationConfig {
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Dimension of the first body; the registry checks the rest agree
    pub fn dimension(&self) -> usize {
        self.bodies.first().map(Body::dimension).unwrap_or(0)
    }

    pub fn masses(&self) -> Vec<f64> {
        self.bodies.iter().map(|b| b.mass).collect()
    }
}

/// Local error tolerance used by the step controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub absolute: f64,
    pub relative: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: 1e-8,
            relative: 1e-6,
        }
    }
}

impl Tolerance {
    pub fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    pub(crate) fn validate(&self) -> SimResult<()> {
        let ok = |v: f64| v.is_finite() && v >= 0.0;
        if !ok(self.absolute) || !ok(self.relative) {
            return Err(SimError::invalid(format!(
                "tolerances must be finite and non-negative (atol = {}, rtol = {})",
                self.absolute, self.relative
            )));
        }
        if self.absolute == 0.0 && self.relative == 0.0 {
            return Err(SimError::invalid("atol and rtol cannot both be zero"));
        }
        Ok(())
    }
}

/// State of the whole system at one requested instant
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub t: f64,
    pub state: StateVector,
}

/// Solver output, one sample per requested time, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    pub(crate) fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.t).collect()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Check that sample times are finite, at least two, and strictly increasing
pub fn validate_sample_times(sample_times: &[f64]) -> SimResult<()> {
    if sample_times.len() < 2 {
        return Err(SimError::invalid(format!(
            "need at least 2 sample times, got {}",
            sample_times.len()
        )));
    }
    if let Some(t) = sample_times.iter().find(|t| !t.is_finite()) {
        return Err(SimError::invalid(format!("sample time {t} is not finite")));
    }
    for (i, w) in sample_times.windows(2).enumerate() {
        if w[1] <= w[0] {
            return Err(SimError::invalid(format!(
                "sample times must be strictly increasing (t[{}] = {} >= t[{}] = {})",
                i,
                w[0],
                i + 1,
                w[1]
            )));
        }
    }
    Ok(())
}

/// `count` evenly spaced instants from `start` to `end`, both included
pub fn linspace(start: f64, end: f64, count: usize) -> SimResult<Vec<f64>> {
    if count < 2 {
        return Err(SimError::invalid(format!(
            "need at least 2 samples, got {count}"
        )));
    }
    if !(start.is_finite() && end.is_finite()) || end <= start {
        return Err(SimError::invalid(format!(
            "time span [{start}, {end}] is empty or not finite"
        )));
    }
    let step = (end - start) / (count - 1) as f64;
    let mut times: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
    // land exactly on the end point
    times[count - 1] = end;
    Ok(times)
}
