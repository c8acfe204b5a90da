//! Gravitational vector field for the flat N-body state
//!
//! Maps `(t, state)` to `d(state)/dt` with pairwise inverse-square gravity.
//! No softening: an exact zero separation is reported as a singularity
//! instead of being smoothed away.

use crate::error::{SimError, SimResult};
use crate::simulation::states::StateVector;

/// Right-hand side of a first-order ODE system `dy/dt = f(t, y)`
///
/// Implementations must be pure: the integrator may call them any number of
/// times with trial states it later discards.
pub trait VectorField {
    fn derivative(&self, t: f64, state: &StateVector) -> SimResult<StateVector>;
}

impl<F> VectorField for F
where
    F: Fn(f64, &StateVector) -> SimResult<StateVector>,
{
    fn derivative(&self, t: f64, state: &StateVector) -> SimResult<StateVector> {
        self(t, state)
    }
}

/// Newtonian gravity between every pair of bodies
///
/// Holds the constants only; the state is passed in on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonianGravity {
    pub g: f64, // gravitational constant
    pub masses: Vec<f64>, // body masses in state order
}

impl NewtonianGravity {
    pub fn new(g: f64, masses: Vec<f64>) -> Self {
        Self { g, masses }
    }
}

impl VectorField for NewtonianGravity {
    fn derivative(&self, t: f64, state: &StateVector) -> SimResult<StateVector> {
        derivative(state, t, self.g, &self.masses)
    }
}

/// Time derivative of the canonical state under pairwise gravity
///
/// `dr_i/dt = v_i` and `dv_i/dt = sum_{j != i} G m_j (r_j - r_i) / |r_j - r_i|^3`.
/// The dimension is inferred from `state.len() / (2 * masses.len())`.
pub fn derivative(state: &StateVector, t: f64, g: f64, masses: &[f64]) -> SimResult<StateVector> {
    let n = masses.len();
    if n == 0 || state.len() % (2 * n) != 0 {
        return Err(SimError::invalid(format!(
            "state of length {} does not fit {} bodies",
            state.len(),
            n
        )));
    }
    let d = state.len() / (2 * n);
    let half = n * d;

    let mut out = StateVector::zeros(state.len());

    // Position derivatives are the velocities
    out.rows_mut(0, half).copy_from(&state.rows(half, half));

    // Loop over each unordered pair (i, j) with i < j
    for i in 0..n {
        let ri = state.rows(i * d, d);

        for j in (i + 1)..n {
            let rj = state.rows(j * d, d);

            // displacement from i to j: i is pulled along +r, j along -r
            let r = &rj - &ri;
            let r2 = r.norm_squared();
            if r2 == 0.0 {
                return Err(SimError::NumericalSingularity {
                    first: i,
                    second: j,
                    t,
                });
            }

            let inv_r = r2.sqrt().recip();
            let coef = g * inv_r * inv_r * inv_r; // G / |r|^3
            if !coef.is_finite() {
                // distinct positions, but too close for the force to be representable
                return Err(SimError::NumericalSingularity {
                    first: i,
                    second: j,
                    t,
                });
            }

            out.rows_mut(half + i * d, d).axpy(coef * masses[j], &r, 1.0);
            out.rows_mut(half + j * d, d).axpy(-coef * masses[i], &r, 1.0);
        }
    }

    Ok(out)
}
