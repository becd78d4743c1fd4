use std::error::Error as StdError;

use hybrid_core::Snapshot;

/// An abscissa and the objective observed there.
///
/// The objective is `NaN` for a point whose evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub objective: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, objective: f64) -> Self {
        Self { x, objective }
    }
}

/// Events emitted by the golden section solver.
///
/// `other` is the opposite interior point, which is always the current best
/// candidate the search would keep if it stopped now.
#[derive(Debug)]
pub enum Event<'a, I, O> {
    /// An interior point was evaluated.
    Evaluated {
        point: Point,
        snapshot: &'a Snapshot<I, O>,
        other: Point,
    },

    /// Evaluating an interior point failed.
    Failed {
        x: f64,
        other: Point,
        error: &'a (dyn StdError + Send + Sync),
    },
}

impl<I, O> Event<'_, I, O> {
    /// Returns the x value that was evaluated or attempted.
    #[must_use]
    pub fn x(&self) -> f64 {
        match self {
            Self::Evaluated { point, .. } => point.x,
            Self::Failed { x, .. } => *x,
        }
    }

    /// Returns the other interior point.
    #[must_use]
    pub fn other(&self) -> Point {
        match self {
            Self::Evaluated { other, .. } | Self::Failed { other, .. } => *other,
        }
    }
}
