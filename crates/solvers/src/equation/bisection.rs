//! Bisection for scalar equations.
//!
//! Requires a bracket whose endpoint residuals have opposite signs, then
//! halves it until the width or the residual meets the configured tolerance.

mod bracket;
mod config;
mod error;
mod solution;

pub use bracket::{BracketError, Sign};
pub use config::{Config, ConfigError};
pub use error::Error;
pub use solution::{Solution, Status};

use hybrid_core::{EquationProblem, Model, Observer};

use crate::equation::{Evaluation, evaluate};

use bracket::Bracket;

/// Control actions supported by the bisection solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop and return the best evaluation so far.
    StopEarly,
}

/// Iteration event emitted by the bisection solver.
#[derive(Debug)]
pub struct Event<'a, I, O> {
    /// Iteration counter, starting at 1.
    pub iter: usize,

    /// Bracket before this iteration's update.
    pub bracket: [f64; 2],

    /// Evaluation at the current midpoint.
    pub eval: &'a Evaluation<I, O>,
}

/// Finds a root of a scalar equation by bisection.
///
/// # Errors
///
/// Returns an error if the bracket is invalid or does not change sign, if a
/// residual is not finite, or if the model or problem fails.
pub fn solve<M, P, Obs>(
    model: &M,
    problem: &P,
    bracket: [f64; 2],
    config: &Config,
    mut observer: Obs,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    P: EquationProblem<1, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M::Input, M::Output>, Action>,
{
    let bounds = Bracket::bounds(bracket)?;

    let left_eval = checked(evaluate(model, problem, bounds[0])?)?;
    if left_eval.residual.abs() <= config.residual_tol() {
        return Ok(Solution::from_eval(left_eval, Status::Converged, 0));
    }

    let right_eval = checked(evaluate(model, problem, bounds[1])?)?;
    if right_eval.residual.abs() <= config.residual_tol() {
        return Ok(Solution::from_eval(right_eval, Status::Converged, 0));
    }

    let mut bracket = Bracket::new(
        bounds,
        Sign::of(left_eval.residual),
        Sign::of(right_eval.residual),
    )?;

    let mut best = if left_eval.residual.abs() <= right_eval.residual.abs() {
        left_eval
    } else {
        right_eval
    };

    for iter in 1..=config.max_iters() {
        let mid = bracket.midpoint();
        let mid_eval = checked(evaluate(model, problem, mid)?)?;

        let event = Event {
            iter,
            bracket: bracket.as_array(),
            eval: &mid_eval,
        };
        let action = observer.observe(&event);

        let converged = mid_eval.residual.abs() <= config.residual_tol()
            || bracket.is_x_converged(config.x_abs_tol(), config.x_rel_tol());
        let sign = Sign::of(mid_eval.residual);

        if mid_eval.residual.abs() < best.residual.abs() || converged {
            best = mid_eval;
        }

        if let Some(Action::StopEarly) = action {
            return Ok(Solution::from_eval(best, Status::StoppedByObserver, iter));
        }
        if converged {
            return Ok(Solution::from_eval(best, Status::Converged, iter));
        }

        bracket.shrink(mid, sign);
    }

    Ok(Solution::from_eval(best, Status::MaxIters, config.max_iters()))
}

/// Runs bisection without observation.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_unobserved<M, P>(
    model: &M,
    problem: &P,
    bracket: [f64; 2],
    config: &Config,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    P: EquationProblem<1, Input = M::Input, Output = M::Output>,
{
    solve(model, problem, bracket, config, ())
}

fn checked<I, O>(eval: Evaluation<I, O>) -> Result<Evaluation<I, O>, Error> {
    if eval.residual.is_finite() {
        Ok(eval)
    } else {
        Err(Error::NonFiniteResidual {
            x: eval.x,
            residual: eval.residual,
        })
    }
}
