use hybrid_core::Snapshot;

use crate::equation::Evaluation;

/// How the bisection solver finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Converged,
    MaxIters,
    StoppedByObserver,
}

/// The result of a bisection solve.
#[derive(Debug, Clone)]
pub struct Solution<I, O> {
    pub status: Status,

    /// The reported root estimate.
    pub x: f64,

    /// Residual at `x`.
    pub residual: f64,

    pub snapshot: Snapshot<I, O>,

    /// Number of midpoint iterations performed.
    pub iters: usize,
}

impl<I, O> Solution<I, O> {
    pub(super) fn from_eval(eval: Evaluation<I, O>, status: Status, iters: usize) -> Self {
        Self {
            status,
            x: eval.x,
            residual: eval.residual,
            snapshot: eval.snapshot,
            iters,
        }
    }
}
