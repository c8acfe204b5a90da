//! Conserved quantities of a closed gravitating system
//!
//! Used to check a trajectory after the fact: energy, linear momentum,
//! angular momentum and the centre of mass should all stay put (the centre
//! of mass moves uniformly when total momentum is non-zero).

use nalgebra::{DVector, Vector3};

use crate::error::{SimError, SimResult};
use crate::simulation::states::StateVector;

/// Dimension implied by the state length, or an error if it does not fit
fn dimension_of(state: &StateVector, masses: &[f64]) -> SimResult<usize> {
    let n = masses.len();
    if n == 0 || state.len() % (2 * n) != 0 {
        return Err(SimError::invalid(format!(
            "state of length {} does not fit {} bodies",
            state.len(),
            n
        )));
    }
    Ok(state.len() / (2 * n))
}

/// Kinetic plus pairwise potential energy
pub fn total_energy(state: &StateVector, g: f64, masses: &[f64]) -> SimResult<f64> {
    let d = dimension_of(state, masses)?;
    let n = masses.len();
    let half = n * d;

    let kinetic: f64 = (0..n)
        .map(|i| 0.5 * masses[i] * state.rows(half + i * d, d).norm_squared())
        .sum();

    let mut potential = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let r = (&state.rows(j * d, d) - &state.rows(i * d, d)).norm();
            if r == 0.0 {
                return Err(SimError::NumericalSingularity {
                    first: i,
                    second: j,
                    t: f64::NAN,
                });
            }
            potential -= g * masses[i] * masses[j] / r;
        }
    }

    Ok(kinetic + potential)
}

/// Drift of `energy` from `initial`, relative when `initial` is non-zero
///
/// Bound and unbound systems can sit at exactly zero total energy, where a
/// relative measure is undefined; the absolute difference is used there.
pub fn energy_drift(initial: f64, energy: f64) -> f64 {
    let diff = (energy - initial).abs();
    if initial != 0.0 && initial.is_finite() {
        diff / initial.abs()
    } else {
        diff
    }
}

/// Total linear momentum `sum m_i v_i`
pub fn linear_momentum(state: &StateVector, masses: &[f64]) -> SimResult<DVector<f64>> {
    let d = dimension_of(state, masses)?;
    let half = masses.len() * d;
    let mut p = DVector::zeros(d);
    for (i, m) in masses.iter().enumerate() {
        p.axpy(*m, &state.rows(half + i * d, d), 1.0);
    }
    Ok(p)
}

/// Total angular momentum about the origin
///
/// One component (the z axis) in 2D, three in 3D.
pub fn angular_momentum(state: &StateVector, masses: &[f64]) -> SimResult<DVector<f64>> {
    let d = dimension_of(state, masses)?;
    let half = masses.len() * d;

    let lift = |offset: usize| match d {
        2 => Vector3::new(state[offset], state[offset + 1], 0.0),
        _ => Vector3::new(state[offset], state[offset + 1], state[offset + 2]),
    };

    match d {
        2 | 3 => {
            let total: Vector3<f64> = masses
                .iter()
                .enumerate()
                .map(|(i, m)| lift(i * d).cross(&lift(half + i * d)) * *m)
                .sum();
            Ok(if d == 2 {
                DVector::from_element(1, total.z)
            } else {
                DVector::from_column_slice(total.as_slice())
            })
        }
        _ => Err(SimError::invalid(format!(
            "angular momentum needs 2 or 3 dimensions, got {d}"
        ))),
    }
}

/// Centre-of-mass position and velocity
pub fn center_of_mass(state: &StateVector, masses: &[f64]) -> SimResult<(DVector<f64>, DVector<f64>)> {
    let d = dimension_of(state, masses)?;
    let half = masses.len() * d;
    let total: f64 = masses.iter().sum();

    let mut position = DVector::zeros(d);
    let mut velocity = DVector::zeros(d);
    for (i, m) in masses.iter().enumerate() {
        position.axpy(m / total, &state.rows(i * d, d), 1.0);
        velocity.axpy(m / total, &state.rows(half + i * d, d), 1.0);
    }
    Ok((position, velocity))
}
