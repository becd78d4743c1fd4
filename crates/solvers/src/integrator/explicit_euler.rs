//! Fixed-step forward Euler.
//!
//! Steps with `y_{n+1} = y_n + f(t_n, y_n) * dt`. Steps are shortened to land
//! on time events, print points, and the final time. Tolerances are ignored.

use hybrid_core::{HybridSystem, IntegrationError, IntegrationSummary, Integrator, Span, Tolerances};
use thiserror::Error;

use super::driver::{Step, Stepper, drive};

/// Errors that can occur when creating an [`ExplicitEuler`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("dt must be finite and positive")]
    Dt,
}

/// Fixed-step forward Euler integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplicitEuler {
    dt: f64,
}

impl ExplicitEuler {
    /// Creates an integrator with step `dt`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not finite and positive.
    pub fn new(dt: f64) -> Result<Self, ConfigError> {
        if dt.is_finite() && dt > 0.0 {
            Ok(Self { dt })
        } else {
            Err(ConfigError::Dt)
        }
    }

    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }
}

impl Integrator for ExplicitEuler {
    fn integrate<S: HybridSystem>(
        &self,
        system: &mut S,
        span: &Span,
        tolerances: &Tolerances,
        y0: &[f64],
    ) -> Result<IntegrationSummary, IntegrationError<S::Error>> {
        drive(system, span, tolerances, y0, &mut Forward { dt: self.dt })
    }
}

struct Forward {
    dt: f64,
}

impl Stepper for Forward {
    fn attempt<S: HybridSystem>(
        &mut self,
        _system: &S,
        t: f64,
        y: &[f64],
        f: &[f64],
        h_limit: f64,
        _tolerances: &Tolerances,
    ) -> Result<Step, IntegrationError<S::Error>> {
        let h = self.dt.min(h_limit);
        let next: Vec<f64> = y.iter().zip(f).map(|(yi, fi)| yi + fi * h).collect();
        if next.iter().any(|v| !v.is_finite()) {
            return Err(IntegrationError::Convergence { t, step: h });
        }
        Ok(Step {
            h,
            y: next,
            rejected: 0,
        })
    }
}
