//! Capability traits for cross-solver observers.
//!
//! These traits abstract over solver-specific event and action types, enabling
//! observers to work generically across different solvers.
//!
//! # Event traits
//!
//! - [`HasTime`]: events stamped with a simulated time
//! - [`HasResidual`]: events that carry a residual value
//! - [`HasObjective`]: events that carry an objective value
//!
//! # Action traits
//!
//! - [`CanStopEarly`]: actions that can signal early termination
//! - [`CanAssumeWorse`]: actions that can signal a worse-than-evaluated outcome
//!
//! # Example
//!
//! ```rust
//! use hybrid_core::Observer;
//! use hybrid_observers::traits::{CanStopEarly, HasResidual};
//!
//! struct GoodEnough {
//!     tolerance: f64,
//!     min_iters: usize,
//!     iter: usize,
//! }
//!
//! impl<E: HasResidual, A: CanStopEarly> Observer<E, A> for GoodEnough {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         self.iter += 1;
//!         if self.iter >= self.min_iters && event.residual().abs() < self.tolerance {
//!             return Some(A::stop_early());
//!         }
//!         None
//!     }
//! }
//! ```

use hybrid_engine::{Progress, extremum_seeking};
use hybrid_solvers::{equation::bisection, optimization::golden_section};

/// An event stamped with a simulated time.
pub trait HasTime {
    fn time(&self) -> f64;
}

/// An event that carries a residual value.
pub trait HasResidual {
    fn residual(&self) -> f64;
}

/// An event that carries an objective value.
pub trait HasObjective {
    /// Returns the objective for this event.
    ///
    /// Returns `f64::NAN` when the event represents a failed evaluation.
    fn objective(&self) -> f64;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    fn stop_early() -> Self;
}

/// An action type that can signal a worse-than-evaluated outcome.
pub trait CanAssumeWorse {
    /// Returns the action that treats this evaluation as worse than the other.
    fn assume_worse() -> Self;
}

impl HasTime for Progress {
    fn time(&self) -> f64 {
        self.t
    }
}

impl HasTime for extremum_seeking::Event {
    fn time(&self) -> f64 {
        self.t
    }
}

impl<I, O> HasResidual for bisection::Event<'_, I, O> {
    fn residual(&self) -> f64 {
        self.eval.residual
    }
}

impl<I, O> HasObjective for golden_section::Event<'_, I, O> {
    fn objective(&self) -> f64 {
        match self {
            golden_section::Event::Evaluated { point, .. } => point.objective,
            golden_section::Event::Failed { .. } => f64::NAN,
        }
    }
}

impl CanStopEarly for hybrid_engine::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

impl CanStopEarly for extremum_seeking::Action {
    fn stop_early() -> Self {
        Self::Stop
    }
}

impl CanStopEarly for bisection::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

impl CanStopEarly for golden_section::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

impl CanAssumeWorse for golden_section::Action {
    fn assume_worse() -> Self {
        Self::AssumeWorse
    }
}
