use thiserror::Error;

use hybrid_core::{Model, OptimizationProblem, Snapshot};

/// A scalar optimization problem evaluated at one `x`.
#[derive(Debug, Clone)]
pub struct Evaluation<I, O> {
    pub x: f64,
    pub objective: f64,
    pub snapshot: Snapshot<I, O>,
}

/// Errors that can occur when evaluating an optimization problem.
#[derive(Debug, Error)]
pub enum EvalError<ME, PE> {
    #[error("model call failed")]
    Model(#[source] ME),

    #[error("problem error")]
    Problem(#[source] PE),
}

/// Maps `x` to a model input, calls the model, and computes the objective.
///
/// # Errors
///
/// Returns an error if input mapping, the model call, or the objective fails.
#[allow(clippy::type_complexity)]
pub fn evaluate<M, P>(
    model: &M,
    problem: &P,
    x: f64,
) -> Result<Evaluation<M::Input, M::Output>, EvalError<M::Error, P::Error>>
where
    M: Model,
    P: OptimizationProblem<1, Input = M::Input, Output = M::Output>,
{
    let input = problem.input(&[x]).map_err(EvalError::Problem)?;
    let snapshot = model.snapshot(input).map_err(EvalError::Model)?;
    let objective = problem
        .objective(&snapshot.input, &snapshot.output)
        .map_err(EvalError::Problem)?;

    Ok(Evaluation {
        x,
        objective,
        snapshot,
    })
}
