//! Reshape a flat trajectory into per-body, per-axis series
//!
//! This is what a plotting layer wants: for body `i` and axis `k`, the
//! position (or velocity) component at every sample time. No physics, no
//! interpolation: each output value is copied from exactly one input value,
//! and `reconstruct` rebuilds the original trajectory bit for bit.

use crate::error::{SimError, SimResult};
use crate::simulation::states::{Sample, StateVector, Trajectory};

/// Series for one body, indexed `[axis][sample]`
#[derive(Debug, Clone, PartialEq)]
pub struct BodySeries {
    pub positions: Vec<Vec<f64>>,
    pub velocities: Vec<Vec<f64>>,
}

impl BodySeries {
    fn with_shape(dimension: usize, samples: usize) -> Self {
        Self {
            positions: vec![Vec::with_capacity(samples); dimension],
            velocities: vec![Vec::with_capacity(samples); dimension],
        }
    }

    /// Position vector at sample `index`
    pub fn position_at(&self, index: usize) -> Option<Vec<f64>> {
        self.positions.iter().map(|axis| axis.get(index).copied()).collect()
    }

    /// Velocity vector at sample `index`
    pub fn velocity_at(&self, index: usize) -> Option<Vec<f64>> {
        self.velocities.iter().map(|axis| axis.get(index).copied()).collect()
    }

    /// Position at the last sample
    pub fn final_position(&self) -> Option<Vec<f64>> {
        let last = self.positions.first()?.len().checked_sub(1)?;
        self.position_at(last)
    }
}

/// Per-body series aligned to the trajectory's sample times
#[derive(Debug, Clone, PartialEq)]
pub struct PerBodySeries {
    pub times: Vec<f64>,
    pub dimension: usize,
    pub bodies: Vec<BodySeries>,
}

/// Split every state of `trajectory` into per-body position/velocity series
pub fn reshape(trajectory: &Trajectory, body_count: usize, dimension: usize) -> SimResult<PerBodySeries> {
    if body_count == 0 || dimension == 0 {
        return Err(SimError::invalid("body count and dimension must be positive"));
    }
    let width = 2 * body_count * dimension;
    let half = body_count * dimension;

    let mut bodies = vec![BodySeries::with_shape(dimension, trajectory.len()); body_count];
    for (index, sample) in trajectory.iter().enumerate() {
        if sample.state.len() != width {
            return Err(SimError::invalid(format!(
                "sample {index} has {} components, expected {width} for {body_count} bodies in {dimension}D",
                sample.state.len()
            )));
        }
        for (i, body) in bodies.iter_mut().enumerate() {
            for k in 0..dimension {
                body.positions[k].push(sample.state[i * dimension + k]);
                body.velocities[k].push(sample.state[half + i * dimension + k]);
            }
        }
    }

    Ok(PerBodySeries {
        times: trajectory.times(),
        dimension,
        bodies,
    })
}

/// Inverse of [`reshape`]: rebuild the flat trajectory from the series
pub fn reconstruct(series: &PerBodySeries) -> SimResult<Trajectory> {
    let n = series.bodies.len();
    let d = series.dimension;
    let count = series.times.len();

    for (i, body) in series.bodies.iter().enumerate() {
        let well_formed = body.positions.len() == d
            && body.velocities.len() == d
            && body
                .positions
                .iter()
                .chain(body.velocities.iter())
                .all(|axis| axis.len() == count);
        if !well_formed {
            return Err(SimError::invalid(format!(
                "series for body {i} does not match {d} axes x {count} samples"
            )));
        }
    }

    let samples = series
        .times
        .iter()
        .enumerate()
        .map(|(index, &t)| {
            let positions = series
                .bodies
                .iter()
                .flat_map(|b| b.positions.iter().map(move |axis| axis[index]));
            let velocities = series
                .bodies
                .iter()
                .flat_map(|b| b.velocities.iter().map(move |axis| axis[index]));
            let mut flat = Vec::with_capacity(2 * n * d);
            flat.extend(positions);
            flat.extend(velocities);
            Sample {
                t,
                state: StateVector::from_vec(flat),
            }
        })
        .collect();

    Ok(Trajectory::from_samples(samples))
}
