//! Adaptive time integration of the flat N-body state
//!
//! Drives the Adams predictor-corrector (smooth stretches) and the Rosenbrock
//! stepper (stiff stretches) across the requested sample times. Every sample
//! time is hit exactly by shortening the step that would cross it, so the
//! output never needs interpolation.
//!
//! The driver only sees a `StateVector` and a `VectorField`, so body count and
//! dimension never show up here.

use log::{debug, info, warn};

use crate::error::{SimError, SimResult};
use crate::simulation::adams::{self, History};
use crate::simulation::forces::VectorField;
use crate::simulation::params::{IntegratorParameters, Method};
use crate::simulation::rosenbrock;
use crate::simulation::states::{validate_sample_times, Sample, StateVector, Tolerance, Trajectory};

/// Safety factor on the predicted optimal step
const SAFETY: f64 = 0.9;
/// Largest reduction per step
const MIN_FACTOR: f64 = 0.2;
/// Largest growth per step for one-step methods
const MAX_FACTOR: f64 = 5.0;
/// Largest growth per step for Adams, whose history degrades on big jumps
const ADAMS_MAX_GROWTH: f64 = 2.0;
/// Largest factor applied after a rejection
const REJECT_MAX_FACTOR: f64 = 0.9;
/// A higher order must promise this much more step to be chosen
const ORDER_UP_MARGIN: f64 = 1.1;
/// Stiffness ratio at which an accepted Adams step counts as stability bound
const STIFF_FRACTION: f64 = 0.5;
/// Consecutive non-stiff Adams steps that clear the stiffness count
const CALM_STEPS: usize = 6;

/// Counters describing the work spent on one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    pub derivative_evals: u64,
    pub jacobian_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub method_switches: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Adams,
    Rosenbrock,
}

/// Weighted RMS norm of a local error vector
///
/// Component weights are `atol + rtol * max(|y_old|, |y_new|)`.
pub(crate) fn error_norm(err: &StateVector, y_old: &StateVector, y_new: &StateVector, tol: &Tolerance) -> f64 {
    if err.is_empty() {
        return 0.0;
    }
    let sum: f64 = err
        .iter()
        .zip(y_old.iter().zip(y_new.iter()))
        .map(|(e, (a, b))| {
            let scale = tol.absolute + tol.relative * a.abs().max(b.abs());
            (e / scale).powi(2)
        })
        .sum();
    (sum / err.len() as f64).sqrt()
}

/// Step ratio that would bring an error estimate of the given order to 1
fn step_factor(error: f64, error_order: usize) -> f64 {
    if error == 0.0 {
        MAX_FACTOR
    } else if !error.is_finite() {
        MIN_FACTOR
    } else {
        SAFETY * error.powf(-1.0 / (error_order as f64 + 1.0))
    }
}

/// Integrate with default parameters and the given tolerance
///
/// Returns one sample per entry of `sample_times`; the first sample is the
/// initial state at `sample_times[0]`.
pub fn integrate<F: VectorField + ?Sized>(
    initial_state: &StateVector,
    sample_times: &[f64],
    field: &F,
    tolerance: &Tolerance,
) -> SimResult<Trajectory> {
    let params = IntegratorParameters::with_tolerance(*tolerance);
    integrate_with_stats(initial_state, sample_times, field, &params).map(|(traj, _)| traj)
}

/// Integrate with explicit parameters and report the work spent
pub fn integrate_with_stats<F: VectorField + ?Sized>(
    initial_state: &StateVector,
    sample_times: &[f64],
    field: &F,
    params: &IntegratorParameters,
) -> SimResult<(Trajectory, IntegrationStats)> {
    // All structural checks happen before the field is touched
    validate_sample_times(sample_times)?;
    params.validate()?;
    if initial_state.is_empty() {
        return Err(SimError::invalid("initial state is empty"));
    }
    if initial_state.iter().any(|c| !c.is_finite()) {
        return Err(SimError::invalid("initial state has non-finite components"));
    }

    let t0 = sample_times[0];
    let t_end = sample_times[sample_times.len() - 1];
    let mut solver = Solver::new(field, params, initial_state.clone(), t0, t_end)?;

    let mut samples = Vec::with_capacity(sample_times.len());
    samples.push(Sample {
        t: t0,
        state: initial_state.clone(),
    });

    for &target in &sample_times[1..] {
        solver.advance_to(target)?;
        samples.push(Sample {
            t: target,
            state: solver.y.clone(),
        });
    }

    info!(
        "integrated {} samples over [{}, {}]: {} steps accepted, {} rejected, {} derivative evals, {} method switches",
        samples.len(),
        t0,
        t_end,
        solver.stats.accepted_steps,
        solver.stats.rejected_steps,
        solver.stats.derivative_evals,
        solver.stats.method_switches,
    );

    Ok((Trajectory::from_samples(samples), solver.stats))
}

/// Working state of one integration call, dropped when the call returns
struct Solver<'a, F: VectorField + ?Sized> {
    field: &'a F,
    params: &'a IntegratorParameters,
    t: f64,
    y: StateVector,
    f: StateVector, // derivative at (t, y)
    h: f64, // suggested next step
    history: History,
    order: usize,
    steps_at_order: usize,
    mode: Mode,
    stiff_accepted: usize,
    stiff_hits: usize, // stiffness detections since the last calm stretch
    calm_steps: usize, // consecutive accepted Adams steps without one
    stats: IntegrationStats,
}

impl<'a, F: VectorField + ?Sized> Solver<'a, F> {
    fn new(
        field: &'a F,
        params: &'a IntegratorParameters,
        y: StateVector,
        t: f64,
        t_end: f64,
    ) -> SimResult<Self> {
        let f = field.derivative(t, &y)?;
        if f.iter().any(|c| !c.is_finite()) {
            return Err(SimError::divergence(t, "derivative at the initial state is not finite"));
        }

        let mode = match params.method {
            Method::Rosenbrock => Mode::Rosenbrock,
            Method::Auto | Method::Adams => Mode::Adams,
        };

        let mut history = History::new(params.max_order + 1);
        history.push(t, f.clone());

        let mut solver = Self {
            field,
            params,
            t,
            y,
            f,
            h: 0.0,
            history,
            order: 1,
            steps_at_order: 0,
            mode,
            stiff_accepted: 0,
            stiff_hits: 0,
            calm_steps: 0,
            stats: IntegrationStats {
                derivative_evals: 1,
                ..IntegrationStats::default()
            },
        };
        solver.h = match params.h0 {
            Some(h0) => h0,
            None => solver.initial_step(t_end - t)?,
        };
        debug!("initial step {} in {:?} mode", solver.h, solver.mode);
        Ok(solver)
    }

    /// Starting step from the size of the state, its derivative, and the
    /// derivative's change over a trial Euler step
    fn initial_step(&mut self, span: f64) -> SimResult<f64> {
        let tol = self.params.tolerance;
        let zero = StateVector::zeros(self.y.len());
        let d0 = error_norm(&self.y, &self.y, &zero, &tol);
        let d1 = error_norm(&self.f, &self.y, &zero, &tol);

        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let h0 = h0.min(span);

        let y1 = &self.y + &self.f * h0;
        let f1 = self.field.derivative(self.t + h0, &y1)?;
        self.stats.derivative_evals += 1;
        let d2 = error_norm(&(f1 - &self.f), &self.y, &zero, &tol) / h0;

        let order = match self.mode {
            Mode::Adams => 1,
            Mode::Rosenbrock => rosenbrock::ERROR_ORDER,
        };
        let dmax = d1.max(d2);
        let h1 = if dmax.is_finite() && dmax > 1e-15 {
            (0.01 / dmax).powf(1.0 / (order as f64 + 1.0))
        } else {
            (h0 * 1e-3).max(1e-6)
        };

        let h = (100.0 * h0).min(h1).min(span);
        Ok(if h.is_finite() && h > 0.0 { h } else { span * 1e-6 })
    }

    /// Advance until `t == target` exactly
    fn advance_to(&mut self, target: f64) -> SimResult<()> {
        let mut steps = 0;
        while self.t < target {
            if steps >= self.params.max_steps {
                return Err(SimError::divergence(
                    self.t,
                    format!("exceeded {} steps before reaching t = {target}", self.params.max_steps),
                ));
            }
            steps += 1;
            self.step_toward(target)?;
        }
        debug!(
            "reached t = {} after {} steps (order {}, {:?} mode, next h {})",
            target, steps, self.order, self.mode, self.h
        );
        Ok(())
    }

    /// Take one accepted step toward `target`, retrying with smaller steps
    fn step_toward(&mut self, target: f64) -> SimResult<()> {
        let mut rejections = 0;
        loop {
            let suggested = match self.params.h_max {
                Some(h_max) => self.h.min(h_max),
                None => self.h,
            };
            let remaining = target - self.t;

            // Shorten the step so the target is hit exactly, splitting the
            // remainder when a full step would leave only a sliver
            let (h, t_new) = if remaining <= suggested {
                (remaining, target)
            } else if remaining < 2.0 * suggested {
                (0.5 * remaining, self.t + 0.5 * remaining)
            } else {
                (suggested, self.t + suggested)
            };

            let h_min = 16.0 * f64::EPSILON * self.t.abs().max(target.abs());
            if h < h_min && h < remaining {
                return Err(SimError::divergence(
                    self.t,
                    format!("step size {h:e} fell below the resolvable minimum {h_min:e}"),
                ));
            }

            let factor = match self.mode {
                Mode::Adams => self.try_adams(h, t_new, rejections)?,
                Mode::Rosenbrock => self.try_rosenbrock(h, t_new)?,
            };

            if let Some(factor) = factor {
                let next = h * factor;
                // a step cut short for landing says nothing against the old suggestion
                self.h = if h < suggested { next.max(suggested) } else { next };
                return Ok(());
            }

            rejections += 1;
            self.stats.rejected_steps += 1;
            if rejections >= self.params.max_rejections {
                return Err(SimError::divergence(
                    self.t,
                    format!("{rejections} consecutive step rejections at h = {h:e}"),
                ));
            }
        }
    }

    /// Attempt an Adams step; `Some(growth)` when accepted
    fn try_adams(&mut self, h: f64, t_new: f64, rejections: usize) -> SimResult<Option<f64>> {
        let tol = self.params.tolerance;
        let trial = adams::step(
            self.field,
            self.t,
            &self.y,
            h,
            self.order,
            self.params.max_order,
            &self.history,
            &tol,
        )?;
        self.stats.derivative_evals += trial.evals;
        let q = trial.order;

        if !(trial.error <= 1.0) {
            // repeated failures at one point drop the order
            if rejections >= 1 && self.order > 1 {
                self.order -= 1;
                self.steps_at_order = 0;
            }
            self.h = h * step_factor(trial.error, q).clamp(MIN_FACTOR, REJECT_MAX_FACTOR);
            return Ok(None);
        }

        // E: derivative at the accepted point
        let f_new = self.field.derivative(t_new, &trial.y)?;
        self.stats.derivative_evals += 1;
        if f_new.iter().any(|c| !c.is_finite()) {
            self.h = h * MIN_FACTOR;
            return Ok(None);
        }

        let stiffness = adams::stiffness_ratio(&trial, h, &f_new);
        let (error, lower_error, higher_error) = (trial.error, trial.lower_error, trial.higher_error);
        self.accept(t_new, trial.y, f_new);
        self.steps_at_order += 1;
        self.track_stiffness(stiffness);

        // Order selection: pick the neighbour order allowing the largest step
        let mut best_order = q;
        let mut best = step_factor(error, q);
        if self.steps_at_order > q + 1 {
            if let Some(e) = lower_error {
                let r = step_factor(e, q - 1);
                if r > best {
                    best = r;
                    best_order = q - 1;
                }
            }
            if let Some(e) = higher_error {
                let r = step_factor(e, q + 1);
                if r > best * ORDER_UP_MARGIN {
                    best = r;
                    best_order = q + 1;
                }
            }
        }
        if best_order != self.order {
            debug!("adams order {} -> {} at t = {}", self.order, best_order, self.t);
            self.order = best_order;
            self.steps_at_order = 0;
        }

        // no growth right after a rejection
        let max_growth = if rejections > 0 { 1.0 } else { ADAMS_MAX_GROWTH };
        Ok(Some(best.clamp(MIN_FACTOR, max_growth)))
    }

    /// Count accepted Adams steps held back by stability and hand Auto runs
    /// over to the stiff stepper once they pile up
    fn track_stiffness(&mut self, ratio: Option<f64>) {
        match ratio {
            Some(r) if r >= STIFF_FRACTION => {
                self.stiff_hits += 1;
                self.calm_steps = 0;
            }
            _ => {
                self.calm_steps += 1;
                if self.calm_steps >= CALM_STEPS {
                    self.stiff_hits = 0;
                }
            }
        }

        if self.params.method == Method::Auto && self.stiff_hits >= self.params.stiff_detections {
            warn!(
                "switching to the stiff stepper at t = {} after {} stiffness detections",
                self.t, self.stiff_hits
            );
            self.mode = Mode::Rosenbrock;
            self.stiff_accepted = 0;
            self.stiff_hits = 0;
            self.calm_steps = 0;
            self.stats.method_switches += 1;
        }
    }

    /// Attempt a Rosenbrock step; `Some(growth)` when accepted
    fn try_rosenbrock(&mut self, h: f64, t_new: f64) -> SimResult<Option<f64>> {
        let tol = self.params.tolerance;
        let trial = rosenbrock::step(self.field, self.t, &self.y, &self.f, h, t_new, &tol)?;
        self.stats.derivative_evals += trial.evals;
        self.stats.jacobian_evals += 1;

        let factor = step_factor(trial.error, rosenbrock::ERROR_ORDER);
        if !(trial.error <= 1.0) || trial.f.iter().any(|c| !c.is_finite()) {
            self.h = h * factor.clamp(MIN_FACTOR, REJECT_MAX_FACTOR);
            return Ok(None);
        }

        self.accept(t_new, trial.y, trial.f);

        if self.params.method == Method::Auto {
            self.stiff_accepted += 1;
            if self.stiff_accepted >= self.params.stiff_steps {
                debug!("retrying adams at t = {}", self.t);
                self.mode = Mode::Adams;
                self.order = 1;
                self.steps_at_order = 0;
                self.stiff_accepted = 0;
                self.stats.method_switches += 1;
            }
        }

        Ok(Some(factor.clamp(MIN_FACTOR, MAX_FACTOR)))
    }

    fn accept(&mut self, t_new: f64, y: StateVector, f: StateVector) {
        self.t = t_new;
        self.y = y;
        self.history.push(t_new, f.clone());
        self.f = f;
        self.stats.accepted_steps += 1;
    }
}
