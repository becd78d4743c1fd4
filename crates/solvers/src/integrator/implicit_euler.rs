//! Adaptive backward (implicit) Euler.
//!
//! Each step solves `z = y + h f(t + h, z)` with a simplified Newton
//! iteration on a finite-difference Jacobian. The local error is estimated
//! as `h/2 |f(t + h, z) - f(t, y)|` in the weighted RMS norm with weights
//! `atol + rtol |y|`; steps above 1 are rejected and retried smaller. A
//! Newton failure quarters the step, and a step below `min_step` ends the
//! integration with [`IntegrationError::Convergence`].
//!
//! # Example
//!
//! ```ignore
//! use hybrid_core::{Integrator, Span, Tolerances};
//! use hybrid_solvers::integrator::ImplicitEuler;
//!
//! let summary = ImplicitEuler::default().integrate(
//!     &mut system,
//!     &Span::new(0.0, 10.0, 0.1),
//!     &Tolerances::default(),
//!     &y0,
//! )?;
//! ```

mod config;
mod newton;


pub use config::{Config, ConfigError};

use hybrid_core::{HybridSystem, IntegrationError, IntegrationSummary, Integrator, Span, Tolerances};
use tracing::{debug, trace};

use super::driver::{Step, Stepper, drive};

/// Largest factor by which the step may grow after an accepted step.
const MAX_GROWTH: f64 = 5.0;

/// Smallest factor by which a rejected step is shrunk.
const MIN_SHRINK: f64 = 0.2;

const SAFETY: f64 = 0.9;

/// Adaptive implicit Euler integrator for stiff hybrid systems.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImplicitEuler {
    config: Config,
}

impl ImplicitEuler {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Integrator for ImplicitEuler {
    fn integrate<S: HybridSystem>(
        &self,
        system: &mut S,
        span: &Span,
        tolerances: &Tolerances,
        y0: &[f64],
    ) -> Result<IntegrationSummary, IntegrationError<S::Error>> {
        let mut stepper = Adaptive {
            config: self.config,
            h: self.config.initial_step(),
        };
        drive(system, span, tolerances, y0, &mut stepper)
    }
}

/// Step-size controller carried across steps.
struct Adaptive {
    config: Config,
    h: f64,
}

impl Stepper for Adaptive {
    fn attempt<S: HybridSystem>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64],
        f: &[f64],
        h_limit: f64,
        tolerances: &Tolerances,
    ) -> Result<Step, IntegrationError<S::Error>> {
        let mut rejected = 0;
        let mut h = self.h.min(self.config.max_step()).min(h_limit);

        loop {
            if let Some(solved) = newton::solve(system, t, y, f, h, tolerances, &self.config)? {
                let diff: Vec<f64> = solved
                    .f
                    .iter()
                    .zip(f)
                    .map(|(f1, f0)| 0.5 * h * (f1 - f0))
                    .collect();
                let scale: Vec<f64> = y
                    .iter()
                    .zip(&solved.z)
                    .map(|(a, b)| a.abs().max(b.abs()))
                    .collect();
                let error = newton::wrms(&diff, &scale, tolerances);

                if error <= 1.0 {
                    let growth = if error > 0.0 {
                        (SAFETY / error.sqrt()).min(MAX_GROWTH)
                    } else {
                        MAX_GROWTH
                    };
                    let proposed = h * growth;
                    // A step clipped to a landing point does not shrink the next one.
                    let clipped = rejected == 0 && h < self.h;
                    let next = if clipped { proposed.max(self.h) } else { proposed };
                    self.h = next.clamp(self.config.min_step(), self.config.max_step());
                    trace!(t, h, error, "step accepted");
                    return Ok(Step {
                        h,
                        y: solved.z,
                        rejected,
                    });
                }

                rejected += 1;
                let shrink = (SAFETY / error.sqrt()).max(MIN_SHRINK);
                debug!(t, h, error, "step rejected by error test");
                h *= shrink;
            } else {
                rejected += 1;
                debug!(t, h, "newton iteration failed");
                h *= 0.25;
            }

            if h < self.config.min_step() {
                return Err(IntegrationError::Convergence { t, step: h });
            }
        }
    }

    fn restart(&mut self) {
        self.h = self.config.initial_step();
    }
}
