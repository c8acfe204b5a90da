//! Body registry: validates per-body parameters and builds the initial state
//!
//! The flat layout produced here is the one every other component reads:
//! `[r_0, r_1, .., r_{N-1}, v_0, v_1, .., v_{N-1}]`, each block `D` wide.

use crate::error::{SimError, SimResult};
use crate::simulation::states::{Body, StateVector};

/// Spatial dimensions a body may live in
pub const SUPPORTED_DIMENSIONS: [usize; 2] = [2, 3];

/// Check the body list and return its common spatial dimension
pub fn validate(bodies: &[Body]) -> SimResult<usize> {
    if bodies.len() < 2 {
        return Err(SimError::invalid(format!(
            "need at least 2 bodies, got {}",
            bodies.len()
        )));
    }

    let dim = bodies[0].dimension();
    if !SUPPORTED_DIMENSIONS.contains(&dim) {
        return Err(SimError::invalid(format!(
            "body 0 has dimension {dim}, expected 2 or 3"
        )));
    }

    for (i, b) in bodies.iter().enumerate() {
        if !(b.mass.is_finite() && b.mass > 0.0) {
            return Err(SimError::invalid(format!(
                "body {i} has non-positive mass {}",
                b.mass
            )));
        }
        if b.initial_position.len() != dim {
            return Err(SimError::invalid(format!(
                "body {i} position has dimension {}, expected {dim}",
                b.initial_position.len()
            )));
        }
        if b.initial_velocity.len() != dim {
            return Err(SimError::invalid(format!(
                "body {i} velocity has dimension {}, expected {dim}",
                b.initial_velocity.len()
            )));
        }
        let finite = b
            .initial_position
            .iter()
            .chain(b.initial_velocity.iter())
            .all(|c| c.is_finite());
        if !finite {
            return Err(SimError::invalid(format!(
                "body {i} has a non-finite initial position or velocity"
            )));
        }
    }

    // Coincident bodies make the force law undefined at t = 0
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            if bodies[i].initial_position == bodies[j].initial_position {
                return Err(SimError::NumericalSingularity {
                    first: i,
                    second: j,
                    t: 0.0,
                });
            }
        }
    }

    Ok(dim)
}

/// Validate `bodies` and flatten them into the canonical initial state
pub fn validate_and_flatten(bodies: &[Body]) -> SimResult<StateVector> {
    validate(bodies)?;

    let positions = bodies.iter().flat_map(|b| b.initial_position.iter());
    let velocities = bodies.iter().flat_map(|b| b.initial_velocity.iter());
    let flat: Vec<f64> = positions.chain(velocities).copied().collect();

    Ok(StateVector::from_vec(flat))
}

/// Masses in body-index order
pub fn masses(bodies: &[Body]) -> Vec<f64> {
    bodies.iter().map(|b| b.mass).collect()
}
