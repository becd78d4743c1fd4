use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{HybridSystem, StopReason};

/// Absolute and relative error tolerances for adaptive integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub atol: f64,
    pub rtol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            atol: 1e-6,
            rtol: 1e-6,
        }
    }
}

impl Tolerances {
    /// Returns the error weight for a state component of magnitude `y`.
    #[must_use]
    pub fn weight(&self, y: f64) -> f64 {
        self.atol + self.rtol * y.abs()
    }

    /// Returns true if both tolerances are finite and non-negative, and at
    /// least one is positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.atol.is_finite()
            && self.rtol.is_finite()
            && self.atol >= 0.0
            && self.rtol >= 0.0
            && (self.atol > 0.0 || self.rtol > 0.0)
    }
}

/// Time interval and output cadence for one integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    /// Start time.
    pub t0: f64,

    /// End time, reached exactly.
    pub t_final: f64,

    /// Spacing of output points measured from `t0`.
    pub t_print: f64,
}

impl Span {
    /// Creates a span.
    #[must_use]
    pub fn new(t0: f64, t_final: f64, t_print: f64) -> Self {
        Self {
            t0,
            t_final,
            t_print,
        }
    }

    /// Returns true if the span is finite, forward, and has a positive cadence.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.t0.is_finite()
            && self.t_final.is_finite()
            && self.t_final >= self.t0
            && self.t_print.is_finite()
            && self.t_print > 0.0
    }

    /// Returns the first print point strictly after `t`, capped at `t_final`.
    ///
    /// Print points are computed from `t0` by multiplication so rounding does
    /// not accumulate over long runs.
    #[must_use]
    pub fn next_print_after(&self, t: f64) -> f64 {
        let elapsed = (t - self.t0) / self.t_print;
        let mut k = elapsed.floor() + 1.0;
        let mut next = self.t0 + k * self.t_print;
        // Guard against `t` sitting a hair below a print point.
        if next - t <= self.t_print * 1e-9 {
            k += 1.0;
            next = self.t0 + k * self.t_print;
        }
        next.min(self.t_final)
    }
}

/// How an integration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Reached `t_final`.
    Completed,

    /// A callback returned [`StepOutcome::Stop`](crate::StepOutcome::Stop).
    Stopped(StopReason),
}

/// Counters reported after an integration.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationSummary {
    /// Time of the last accepted step.
    pub t_end: f64,

    /// Number of accepted steps.
    pub steps: usize,

    /// Number of rejected step attempts.
    pub rejected: usize,

    /// Number of event callbacks issued.
    pub events: usize,

    pub termination: Termination,
}

/// Errors returned by an [`Integrator`].
#[derive(Debug, Error)]
pub enum IntegrationError<E> {
    /// The system's callbacks failed.
    #[error("system callback failed")]
    System(#[source] E),

    /// The nonlinear solve failed even at the minimum step size.
    #[error("integration failed to converge at t = {t} with step {step}")]
    Convergence { t: f64, step: f64 },

    #[error("invalid integration span")]
    InvalidSpan,

    #[error("initial state has {actual} values, system dimension is {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Advances a [`HybridSystem`] over a [`Span`].
///
/// Implementations must land exactly on `t_final`, on every print point, and
/// on every time returned by [`HybridSystem::time_events`]; they must call
/// [`HybridSystem::on_event`] when a time event is reached or an indicator
/// changes sign between accepted steps, and [`HybridSystem::on_accepted_step`]
/// once per accepted step.
pub trait Integrator {
    /// Integrates `system` from `y0` over `span`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::System`] when a callback fails, and
    /// [`IntegrationError::Convergence`] when the step size collapses.
    fn integrate<S: HybridSystem>(
        &self,
        system: &mut S,
        span: &Span,
        tolerances: &Tolerances,
        y0: &[f64],
    ) -> Result<IntegrationSummary, IntegrationError<S::Error>>;
}
