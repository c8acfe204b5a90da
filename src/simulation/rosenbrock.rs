//! Linearly implicit Rosenbrock 2(3) stepper for stiff stretches
//!
//! Used while accepted Adams steps are held back by stability rather than
//! accuracy, i.e. while the problem is stiff. Each step builds
//! a finite-difference Jacobian, factors `W = I - h d J` once and reuses the
//! LU for all three stages. The second-order solution is advanced and the
//! third-order stage only feeds the error estimate.
//!
//! Coefficients are the modified Rosenbrock pair of Shampine & Reichelt.

use nalgebra::DMatrix;

use crate::error::SimResult;
use crate::simulation::forces::VectorField;
use crate::simulation::integrator::error_norm;
use crate::simulation::states::{StateVector, Tolerance};

const D: f64 = 1.0 / (2.0 + std::f64::consts::SQRT_2);
const E32: f64 = 6.0 + std::f64::consts::SQRT_2;

/// Error estimate order + 1, used for the step-size exponent
pub(crate) const ERROR_ORDER: usize = 2;

/// Result of one attempted Rosenbrock step
#[derive(Debug, Clone)]
pub(crate) struct RosenbrockTrial {
    pub y: StateVector, // state at t + h
    pub f: StateVector, // derivative at the new state
    pub error: f64, // weighted error, accept when <= 1
    pub evals: u64, // derivative evaluations spent, Jacobian included
}

/// Forward-difference Jacobian `df/dy` at `(t, y)`
pub(crate) fn jacobian<F: VectorField + ?Sized>(
    field: &F,
    t: f64,
    y: &StateVector,
    f0: &StateVector,
) -> SimResult<DMatrix<f64>> {
    let n = y.len();
    let typical = y.amax();
    let floor = if typical > 0.0 { typical * 1e-3 } else { 1.0 };
    let sqrt_eps = f64::EPSILON.sqrt();

    let mut jac = DMatrix::zeros(n, n);
    let mut probe = y.clone();
    for j in 0..n {
        probe[j] = y[j] + sqrt_eps * y[j].abs().max(floor);
        // the representable increment, not the requested one
        let delta = probe[j] - y[j];
        let fj = field.derivative(t, &probe)?;
        jac.set_column(j, &((fj - f0) / delta));
        probe[j] = y[j];
    }
    Ok(jac)
}

/// Attempt one step of size `h` from `(t, y)` landing at `t_new`
///
/// `f0` must be the derivative at `(t, y)`.
pub(crate) fn step<F: VectorField + ?Sized>(
    field: &F,
    t: f64,
    y: &StateVector,
    f0: &StateVector,
    h: f64,
    t_new: f64,
    tol: &Tolerance,
) -> SimResult<RosenbrockTrial> {
    let n = y.len();
    let rejected = |y: &StateVector| RosenbrockTrial {
        y: y.clone(),
        f: f0.clone(),
        error: f64::INFINITY,
        evals: n as u64 + 1,
    };

    let jac = jacobian(field, t, y, f0)?;

    // time derivative, zero for autonomous fields
    let dt = f64::EPSILON.sqrt() * t.abs().max(1.0);
    let dfdt = (field.derivative(t + dt, y)? - f0) / dt;

    let hd = h * D;
    let w = DMatrix::<f64>::identity(n, n) - jac * hd;
    let lu = w.lu();

    let Some(k1) = lu.solve(&(f0 + &dfdt * hd)) else {
        return Ok(rejected(y));
    };

    let f1 = field.derivative(t + 0.5 * h, &(y + &k1 * (0.5 * h)))?;
    let Some(k2) = lu.solve(&(&f1 - &k1)) else {
        return Ok(rejected(y));
    };
    let k2 = k2 + &k1;

    let y_new = y + &k2 * h;
    let f2 = field.derivative(t_new, &y_new)?;

    let rhs = &f2 - (&k2 - &f1) * E32 - (&k1 - f0) * 2.0 + &dfdt * hd;
    let Some(k3) = lu.solve(&rhs) else {
        return Ok(rejected(y));
    };

    let err = (&k1 - &k2 * 2.0 + &k3) * (h / 6.0);
    let error = error_norm(&err, y, &y_new, tol);

    Ok(RosenbrockTrial {
        y: y_new,
        f: f2,
        error,
        evals: n as u64 + 4,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::forces::derivative;

    #[test]
    fn jacobian_of_linear_field() {
        // y' = A y with A = [[0, 1], [-4, 0]]
        let field = |_t: f64, y: &StateVector| -> SimResult<StateVector> {
            Ok(StateVector::from_vec(vec![y[1], -4.0 * y[0]]))
        };
        let y = StateVector::from_vec(vec![0.3, -1.2]);
        let f0 = field(0.0, &y).unwrap();
        let jac = jacobian(&field, 0.0, &y, &f0).unwrap();
        assert!((jac[(0, 1)] - 1.0).abs() < 1e-6);
        assert!((jac[(1, 0)] + 4.0).abs() < 1e-6);
        assert!(jac[(0, 0)].abs() < 1e-6);
        assert!(jac[(1, 1)].abs() < 1e-6);
    }

    #[test]
    fn stiff_decay_is_stable_with_large_steps() {
        // y' = -1000 (y - 1): explicit methods need h < 2e-3
        let field = |_t: f64, y: &StateVector| -> SimResult<StateVector> {
            Ok(y.map(|c| -1000.0 * (c - 1.0)))
        };
        let tol = Tolerance::new(1e-6, 1e-6);
        let mut y = StateVector::from_element(1, 0.0);
        let mut t = 0.0;
        let h = 0.05;
        for _ in 0..20 {
            let f0 = field(t, &y).unwrap();
            let trial = step(&field, t, &y, &f0, h, t + h, &tol).unwrap();
            y = trial.y;
            t += h;
        }
        assert!((y[0] - 1.0).abs() < 1e-3, "got {}", y[0]);
    }

    #[test]
    fn small_step_on_gravity_is_accurate() {
        let y = StateVector::from_vec(vec![-0.5, 0.0, 0.5, 0.0, 0.0, -0.7, 0.0, 0.7]);
        let g = |t: f64, s: &StateVector| derivative(s, t, 1.0, &[1.0, 1.0]);
        let f0 = g(0.0, &y).unwrap();
        let trial = step(&g, 0.0, &y, &f0, 1e-3, 1e-3, &Tolerance::default()).unwrap();
        assert!(trial.error <= 1.0, "error {}", trial.error);
        assert_eq!(trial.f, g(1e-3, &trial.y).unwrap());
    }
}
