//! Golden section search for single-variable optimization.
//!
//! Finds the minimum or maximum of a unimodal objective on a bounded
//! interval. Two interior points placed by the golden ratio are compared and
//! the bracket shrinks toward the better one, reusing the surviving interior
//! evaluation.
//!
//! The observer receives one [`Event`] per evaluation after the first. It can
//! return [`Action::StopEarly`] to halt, or [`Action::AssumeWorse`] to steer
//! the search away from a point (including one whose evaluation failed).

mod action;
mod bracket;
mod config;
mod error;
mod event;
mod solution;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use bracket::{GoldenBracket, INV_PHI};
pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::{Event, Point};
pub use solution::{Solution, Status};

use hybrid_core::{Model, Observer, OptimizationProblem, Snapshot};

use crate::optimization::evaluate;

/// Finds the minimum of the objective.
///
/// # Errors
///
/// Returns an error if the bracket is not finite, or if an evaluation fails
/// and the observer does not answer with [`Action::AssumeWorse`].
pub fn minimize<M, P, Obs>(
    model: &M,
    problem: &P,
    bracket: [f64; 2],
    config: &Config,
    observer: Obs,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    P: OptimizationProblem<1, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M::Input, M::Output>, Action>,
{
    search(model, problem, bracket, config, observer, |v| v)
}

/// Finds the minimum of the objective without observation.
///
/// # Errors
///
/// See [`minimize`].
pub fn minimize_unobserved<M, P>(
    model: &M,
    problem: &P,
    bracket: [f64; 2],
    config: &Config,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    P: OptimizationProblem<1, Input = M::Input, Output = M::Output>,
{
    minimize(model, problem, bracket, config, ())
}

/// Finds the maximum of the objective.
///
/// # Errors
///
/// See [`minimize`].
pub fn maximize<M, P, Obs>(
    model: &M,
    problem: &P,
    bracket: [f64; 2],
    config: &Config,
    observer: Obs,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    P: OptimizationProblem<1, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M::Input, M::Output>, Action>,
{
    search(model, problem, bracket, config, observer, |v| -v)
}

/// Finds the maximum of the objective without observation.
///
/// # Errors
///
/// See [`minimize`].
pub fn maximize_unobserved<M, P>(
    model: &M,
    problem: &P,
    bracket: [f64; 2],
    config: &Config,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    P: OptimizationProblem<1, Input = M::Input, Output = M::Output>,
{
    maximize(model, problem, bracket, config, ())
}

/// An interior point and the score the search compares (lower is better).
#[derive(Debug, Clone, Copy)]
struct Scored {
    point: Point,
    score: f64,
}

enum Probe<I, O> {
    Scored(Scored, Option<Snapshot<I, O>>),
    Stop,
}

/// Tracks the best real evaluation seen.
struct Best<I, O> {
    scored: Scored,
    snapshot: Snapshot<I, O>,
}

impl<I, O> Best<I, O> {
    fn offer(&mut self, scored: Scored, snapshot: Option<Snapshot<I, O>>) {
        if let Some(snapshot) = snapshot
            && scored.score < self.scored.score
        {
            self.scored = scored;
            self.snapshot = snapshot;
        }
    }

    fn into_solution(self, status: Status, iters: usize) -> Solution<I, O> {
        Solution {
            status,
            x: self.scored.point.x,
            objective: self.scored.point.objective,
            snapshot: self.snapshot,
            iters,
        }
    }
}

fn search<M, P, Obs, F>(
    model: &M,
    problem: &P,
    bounds: [f64; 2],
    config: &Config,
    mut observer: Obs,
    transform: F,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    P: OptimizationProblem<1, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M::Input, M::Output>, Action>,
    F: Fn(f64) -> f64,
{
    if !bounds.iter().all(|b| b.is_finite()) {
        return Err(Error::NonFiniteBracket);
    }
    let mut bracket = GoldenBracket::new(bounds);

    // The first interior point has no `other` yet, so it is not observed.
    let first = evaluate(model, problem, bracket.inner_left())?;
    let mut left = Scored {
        point: Point::new(first.x, first.objective),
        score: transform(first.objective),
    };
    let mut best = Best {
        scored: left,
        snapshot: first.snapshot,
    };

    let mut right = match probe(model, problem, bracket.inner_right(), left, &mut observer, &transform)? {
        Probe::Scored(scored, snapshot) => {
            best.offer(scored, snapshot);
            scored
        }
        Probe::Stop => return Ok(best.into_solution(Status::StoppedByObserver, 0)),
    };

    for iter in 1..=config.max_iters() {
        if is_converged(&bracket, config) {
            return Ok(best.into_solution(Status::Converged, iter - 1));
        }

        if left.score <= right.score {
            let mut next = bracket;
            next.shrink_right();
            match probe(model, problem, next.inner_left(), left, &mut observer, &transform)? {
                Probe::Scored(scored, snapshot) => {
                    best.offer(scored, snapshot);
                    bracket = next;
                    right = left;
                    left = scored;
                }
                Probe::Stop => return Ok(best.into_solution(Status::StoppedByObserver, iter)),
            }
        } else {
            let mut next = bracket;
            next.shrink_left();
            match probe(model, problem, next.inner_right(), right, &mut observer, &transform)? {
                Probe::Scored(scored, snapshot) => {
                    best.offer(scored, snapshot);
                    bracket = next;
                    left = right;
                    right = scored;
                }
                Probe::Stop => return Ok(best.into_solution(Status::StoppedByObserver, iter)),
            }
        }
    }

    let status = if is_converged(&bracket, config) {
        Status::Converged
    } else {
        Status::MaxIters
    };
    Ok(best.into_solution(status, config.max_iters()))
}

/// Evaluates `x`, reports it, and applies the observer's answer.
fn probe<M, P, Obs, F>(
    model: &M,
    problem: &P,
    x: f64,
    other: Scored,
    observer: &mut Obs,
    transform: &F,
) -> Result<Probe<M::Input, M::Output>, Error>
where
    M: Model,
    P: OptimizationProblem<1, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M::Input, M::Output>, Action>,
    F: Fn(f64) -> f64,
{
    match evaluate(model, problem, x) {
        Ok(eval) => {
            let point = Point::new(eval.x, eval.objective);
            let event = Event::Evaluated {
                point,
                snapshot: &eval.snapshot,
                other: other.point,
            };
            Ok(match observer.observe(&event) {
                Some(Action::StopEarly) => Probe::Stop,
                Some(Action::AssumeWorse) => Probe::Scored(worse(point), None),
                None => Probe::Scored(
                    Scored {
                        point,
                        score: transform(eval.objective),
                    },
                    Some(eval.snapshot),
                ),
            })
        }
        Err(err) => {
            let err = Error::from(err);
            let action = match &err {
                Error::Model(e) | Error::Problem(e) => observer.observe(&Event::Failed {
                    x,
                    other: other.point,
                    error: e.as_ref(),
                }),
                Error::NonFiniteBracket => None,
            };
            match action {
                Some(Action::StopEarly) => Ok(Probe::Stop),
                Some(Action::AssumeWorse) => Ok(Probe::Scored(worse(Point::new(x, f64::NAN)), None)),
                None => Err(err),
            }
        }
    }
}

fn worse(point: Point) -> Scored {
    Scored {
        point,
        score: f64::INFINITY,
    }
}

fn is_converged(bracket: &GoldenBracket, config: &Config) -> bool {
    config.is_narrow(bracket.inner_left(), bracket.inner_right())
}
