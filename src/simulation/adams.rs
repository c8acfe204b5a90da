//! Variable-order, variable-step Adams predictor-corrector (PECE)
//!
//! The predictor is Adams-Bashforth of order `q` over the last `q` accepted
//! derivatives, the corrector Adams-Moulton of order `q + 1` using the
//! derivative at the predicted point. Coefficients are rebuilt every step by
//! integrating the Lagrange basis over the actual (non-uniform) step history,
//! so landing exactly on sample times never needs a restart.
//!
//! The corrected value is kept and `corrector - predictor` serves as the
//! local error estimate. Estimates for orders `q - 1` and `q + 1` come out of
//! the same derivative values and drive the order selection.
//!
//! The predicted and corrected points of an accepted step also give a cheap
//! stiffness estimate: the decay rate along `y_corr - y_pred`, measured
//! against the real stability interval of the scheme at the order used.

use std::collections::VecDeque;

use crate::error::SimResult;
use crate::simulation::forces::VectorField;
use crate::simulation::integrator::error_norm;
use crate::simulation::states::{StateVector, Tolerance};

/// Length of the stability interval on the negative real axis of the PECE
/// pair with an order `q` predictor, indexed by `q - 1`
pub(crate) const STABILITY_BOUNDS: [f64; 12] = [
    2.0, 2.39, 1.93, 1.41, 1.04, 0.77, 0.58, 0.44, 0.33, 0.26, 0.21, 0.06,
];

/// Derivatives at the most recent accepted points, newest first
#[derive(Debug, Clone)]
pub(crate) struct History {
    points: VecDeque<(f64, StateVector)>,
    capacity: usize,
}

impl History {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    /// Record the derivative at a newly accepted point
    pub(crate) fn push(&mut self, t: f64, f: StateVector) {
        self.points.push_front((t, f));
        self.points.truncate(self.capacity);
    }

    pub(crate) fn len(&self) -> usize {
        self.points.len()
    }

    fn iter(&self) -> impl Iterator<Item = &(f64, StateVector)> {
        self.points.iter()
    }
}

/// Result of one attempted Adams step
#[derive(Debug, Clone)]
pub(crate) struct AdamsTrial {
    pub y: StateVector, // corrected state at t + h
    pub y_pred: StateVector, // predicted state at t + h
    pub f_pred: Option<StateVector>, // derivative at the predicted state
    pub order: usize, // order actually used
    pub error: f64, // weighted error of the step, accept when <= 1
    pub lower_error: Option<f64>, // estimate at order - 1
    pub higher_error: Option<f64>, // estimate at order + 1
    pub evals: u64, // derivative evaluations spent
}

/// `int_0^1 L_j(u) du` for the Lagrange basis polynomials over `nodes`
///
/// Nodes are step-scaled offsets `(t_k - t_n) / h`, so the weights multiplied
/// by `h` integrate the interpolant from `t_n` to `t_n + h`.
pub(crate) fn quadrature_weights(nodes: &[f64]) -> Vec<f64> {
    (0..nodes.len())
        .map(|j| {
            // monomial coefficients of prod_{m != j} (u - x_m), lowest degree first
            let mut poly = vec![1.0];
            let mut denom = 1.0;
            for (m, &xm) in nodes.iter().enumerate() {
                if m == j {
                    continue;
                }
                let mut next = vec![0.0; poly.len() + 1];
                for (p, &c) in poly.iter().enumerate() {
                    next[p + 1] += c;
                    next[p] -= c * xm;
                }
                poly = next;
                denom *= nodes[j] - xm;
            }
            let integral: f64 = poly
                .iter()
                .enumerate()
                .map(|(p, c)| c / (p + 1) as f64)
                .sum();
            integral / denom
        })
        .collect()
}

/// `h * sum_j w_j f_j`, with `lead` (if any) taking the first weight and the
/// history derivatives the rest, newest first
fn combine(h: f64, weights: &[f64], lead: Option<&StateVector>, history: &History, len: usize) -> StateVector {
    let mut acc = StateVector::zeros(len);
    let rest = match (lead, weights.split_first()) {
        (Some(f), Some((w0, rest))) => {
            acc.axpy(h * w0, f, 1.0);
            rest
        }
        _ => weights,
    };
    for (w, (_, f)) in rest.iter().zip(history.iter()) {
        acc.axpy(h * w, f, 1.0);
    }
    acc
}

/// Predictor and corrector increments for order `q` on the given nodes
fn increments(
    h: f64,
    nodes: &[f64],
    q: usize,
    f_pred: &StateVector,
    history: &History,
) -> (StateVector, StateVector) {
    let len = f_pred.len();
    let predictor = combine(h, &quadrature_weights(&nodes[..q]), None, history, len);

    let mut corrector_nodes = Vec::with_capacity(q + 1);
    corrector_nodes.push(1.0);
    corrector_nodes.extend_from_slice(&nodes[..q]);
    let corrector = combine(h, &quadrature_weights(&corrector_nodes), Some(f_pred), history, len);

    (predictor, corrector)
}

/// Attempt one PECE step of size `h` from `(t, y)`
///
/// Only the P and first E stages run here; the caller evaluates the
/// derivative at the accepted point and pushes it onto `history`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn step<F: VectorField + ?Sized>(
    field: &F,
    t: f64,
    y: &StateVector,
    h: f64,
    order: usize,
    max_order: usize,
    history: &History,
    tol: &Tolerance,
) -> SimResult<AdamsTrial> {
    let q = order.clamp(1, history.len().max(1));
    let nodes: Vec<f64> = history.iter().map(|(tk, _)| (tk - t) / h).collect();

    // P: Adams-Bashforth
    let predictor = combine(h, &quadrature_weights(&nodes[..q]), None, history, y.len());
    let y_pred = y + &predictor;
    if y_pred.iter().any(|c| !c.is_finite()) {
        return Ok(AdamsTrial {
            y: y_pred.clone(),
            y_pred,
            f_pred: None,
            order: q,
            error: f64::INFINITY,
            lower_error: None,
            higher_error: None,
            evals: 0,
        });
    }

    // E: derivative at the predicted point
    let f_pred = field.derivative(t + h, &y_pred)?;

    // C: Adams-Moulton, one order higher
    let (_, corrector) = increments(h, &nodes, q, &f_pred, history);
    let y_corr = y + &corrector;
    let error = error_norm(&(&corrector - &predictor), y, &y_corr, tol);

    let estimate = |order: usize| {
        let (p, c) = increments(h, &nodes, order, &f_pred, history);
        error_norm(&(c - p), y, &y_corr, tol)
    };
    let lower_error = (q >= 2).then(|| estimate(q - 1));
    let higher_error = (q < max_order && nodes.len() > q).then(|| estimate(q + 1));

    Ok(AdamsTrial {
        y: y_corr,
        y_pred,
        f_pred: Some(f_pred),
        order: q,
        error,
        lower_error,
        higher_error,
        evals: 1,
    })
}

/// `h * rate / bound` for an accepted trial, where `rate` is the decay rate
/// `-<df, dy> / |dy|^2` between the predicted and corrected points and
/// `f_new` is the derivative at the corrected point
///
/// Values near 1 mean the step is held back by stability rather than
/// accuracy. Oscillatory and growing directions give values <= 0.
pub(crate) fn stiffness_ratio(trial: &AdamsTrial, h: f64, f_new: &StateVector) -> Option<f64> {
    let f_pred = trial.f_pred.as_ref()?;
    let dy = &trial.y - &trial.y_pred;
    let dy2 = dy.norm_squared();
    if !(dy2 > 0.0) {
        return None;
    }
    let rate = -(f_new - f_pred).dot(&dy) / dy2;
    let bound = STABILITY_BOUNDS[trial.order.clamp(1, STABILITY_BOUNDS.len()) - 1];
    let ratio = h * rate / bound;
    ratio.is_finite().then_some(ratio)
}
