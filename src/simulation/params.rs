//! Numerical parameters for the adaptive integrator
//!
//! `IntegratorParameters` holds runtime settings:
//! - error tolerances (`atol`, `rtol`),
//! - which stepper to use and when to fall back to the stiff one,
//! - initial/maximum step size and the Adams order cap,
//! - step and rejection budgets that bound the work per sample interval

use crate::error::{SimError, SimResult};
use crate::simulation::states::Tolerance;

/// Highest Adams order the stepper supports
pub const MAX_ADAMS_ORDER: usize = 12;

/// Which stepper advances the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Variable-order Adams, switching to Rosenbrock while the problem looks stiff
    #[default]
    Auto,
    /// Variable-order Adams predictor-corrector only
    Adams,
    /// Linearly implicit Rosenbrock 2(3) only
    Rosenbrock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorParameters {
    pub tolerance: Tolerance, // local error tolerance
    pub method: Method, // stepper selection
    pub h0: Option<f64>, // initial step size, estimated when None
    pub h_max: Option<f64>, // largest allowed step, unbounded when None
    pub max_order: usize, // Adams order cap
    pub max_steps: usize, // step budget per sample interval
    pub max_rejections: usize, // consecutive rejections before giving up
    pub stiff_detections: usize, // stiffness detections on accepted Adams steps before the stiff fallback
    pub stiff_steps: usize, // accepted stiff steps before retrying Adams
}

impl Default for IntegratorParameters {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            method: Method::Auto,
            h0: None,
            h_max: None,
            max_order: 8,
            max_steps: 100_000,
            max_rejections: 40,
            stiff_detections: 15,
            stiff_steps: 25,
        }
    }
}

impl IntegratorParameters {
    pub fn with_tolerance(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        self.tolerance.validate()?;

        if !(1..=MAX_ADAMS_ORDER).contains(&self.max_order) {
            return Err(SimError::invalid(format!(
                "max_order must be in 1..={MAX_ADAMS_ORDER}, got {}",
                self.max_order
            )));
        }
        if self.max_steps == 0 || self.max_rejections == 0 || self.stiff_detections == 0 {
            return Err(SimError::invalid("step, rejection and stiffness budgets must be positive"));
        }
        for (name, h) in [("h0", self.h0), ("h_max", self.h_max)] {
            if let Some(h) = h {
                if !(h.is_finite() && h > 0.0) {
                    return Err(SimError::invalid(format!(
                        "{name} must be finite and positive, got {h}"
                    )));
                }
            }
        }
        Ok(())
    }
}
