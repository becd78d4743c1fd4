use thiserror::Error;

/// Step-size and Newton settings for [`ImplicitEuler`](super::ImplicitEuler).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    initial_step: f64,
    min_step: f64,
    max_step: f64,
    max_newton_iters: usize,
    newton_tolerance: f64,
}

/// Errors that can occur when validating an implicit Euler config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("step sizes must be finite and positive")]
    NonPositiveStep,

    #[error("min_step <= initial_step <= max_step is required")]
    StepOrder,

    #[error("max_newton_iters must be at least 1")]
    NewtonIters,

    #[error("newton_tolerance must be finite and positive")]
    NewtonTolerance,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_step: 1e-3,
            min_step: 1e-12,
            max_step: f64::INFINITY,
            max_newton_iters: 8,
            newton_tolerance: 0.1,
        }
    }
}

impl Config {
    /// Creates a validated config.
    ///
    /// `max_step` may be infinite.
    ///
    /// # Errors
    ///
    /// Returns an error if a step size is not positive, the step sizes are
    /// out of order, or the Newton settings are invalid.
    pub fn new(
        initial_step: f64,
        min_step: f64,
        max_step: f64,
        max_newton_iters: usize,
        newton_tolerance: f64,
    ) -> Result<Self, ConfigError> {
        let positive = |v: f64| v > 0.0 && !v.is_nan();
        if !(positive(initial_step) && initial_step.is_finite())
            || !(positive(min_step) && min_step.is_finite())
            || !positive(max_step)
        {
            return Err(ConfigError::NonPositiveStep);
        }
        if !(min_step <= initial_step && initial_step <= max_step) {
            return Err(ConfigError::StepOrder);
        }
        if max_newton_iters == 0 {
            return Err(ConfigError::NewtonIters);
        }
        if !(newton_tolerance.is_finite() && newton_tolerance > 0.0) {
            return Err(ConfigError::NewtonTolerance);
        }
        Ok(Self {
            initial_step,
            min_step,
            max_step,
            max_newton_iters,
            newton_tolerance,
        })
    }

    #[must_use]
    pub fn initial_step(&self) -> f64 {
        self.initial_step
    }

    #[must_use]
    pub fn min_step(&self) -> f64 {
        self.min_step
    }

    #[must_use]
    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    #[must_use]
    pub fn max_newton_iters(&self) -> usize {
        self.max_newton_iters
    }

    /// Weighted RMS norm of a Newton update below which the solve is accepted.
    #[must_use]
    pub fn newton_tolerance(&self) -> f64 {
        self.newton_tolerance
    }
}
