use hybrid_core::Snapshot;

/// How the golden section solver finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The interior points met the configured tolerances.
    Converged,

    MaxIters,

    StoppedByObserver,
}

/// The result of a golden section search.
#[derive(Debug, Clone)]
pub struct Solution<I, O> {
    pub status: Status,

    /// Best x evaluated.
    pub x: f64,

    /// Objective value at `x`.
    pub objective: f64,

    pub snapshot: Snapshot<I, O>,

    /// Shrink iterations performed.
    pub iters: usize,
}
