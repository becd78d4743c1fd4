use std::error::Error as StdError;

use hybrid_core::HistoryError;
use thiserror::Error;

use crate::Phase;

/// Errors returned by [`SimulationEngine`](crate::SimulationEngine).
///
/// Every failure during [`run`](crate::SimulationEngine::run) is reported
/// after the sink has been finalized, so rows recorded before the failure
/// remain readable.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model's right-hand side rejected the state.
    #[error("model evaluation failed at t = {t}")]
    ModelEvaluation {
        t: f64,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The integrator's nonlinear solve failed at its minimum step.
    #[error("integrator failed to converge at t = {t} with step {step}")]
    Convergence { t: f64, step: f64 },

    /// The record sink failed.
    #[error("result storage failed")]
    Storage(#[source] Box<dyn StdError + Send + Sync>),

    #[error("operation requires the {expected:?} phase, engine is {actual:?}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid span from {t0} to {t_final} every {t_print}")]
    InvalidSpan { t0: f64, t_final: f64, t_print: f64 },

    #[error("delay history rejected a sample: {0}")]
    History(#[from] HistoryError),

    /// Time events kept scheduling further events at the same instant.
    #[error("time events at t = {t} kept scheduling new events at the same instant")]
    EventCascade { t: f64 },
}

impl EngineError {
    pub(crate) fn storage(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}
