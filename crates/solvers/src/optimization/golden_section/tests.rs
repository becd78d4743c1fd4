use std::convert::Infallible;

use approx::assert_relative_eq;
use thiserror::Error;

use hybrid_core::{Model, OptimizationProblem};

use super::{
    Action, Config, Error, Event, Status, maximize, maximize_unobserved, minimize,
    minimize_unobserved,
};

/// Monod-style yield curve with a single interior maximum:
/// `f(x) = x (1 - x) / (0.2 + x)`.
struct YieldCurve;

impl Model for YieldCurve {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn call(&self, x: &f64) -> Result<f64, Self::Error> {
        Ok(x * (1.0 - x) / (0.2 + x))
    }
}

/// Uses the model output as the objective.
struct ObjectiveOutput;

impl OptimizationProblem<1> for ObjectiveOutput {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<f64, Self::Error> {
        Ok(x[0])
    }

    fn objective(&self, _input: &f64, output: &f64) -> Result<f64, Self::Error> {
        Ok(*output)
    }
}

#[test]
fn maximizes_yield_curve() {
    // d/dx [x(1-x)/(0.2+x)] = 0 at x = sqrt(0.24) - 0.2.
    let expected = 0.24_f64.sqrt() - 0.2;

    let solution = maximize_unobserved(&YieldCurve, &ObjectiveOutput, [0.0, 1.0], &Config::default())
        .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x, expected, epsilon = 1e-6);
    assert_relative_eq!(solution.snapshot.output, solution.objective);
}

/// `f(x) = (x - 3)^2`.
struct Parabola;

impl Model for Parabola {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn call(&self, x: &f64) -> Result<f64, Self::Error> {
        Ok((x - 3.0).powi(2))
    }
}

#[test]
fn minimizes_parabola_with_reversed_bracket() {
    let solution = minimize_unobserved(&Parabola, &ObjectiveOutput, [10.0, -4.0], &Config::default())
        .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x, 3.0, epsilon = 1e-6);
}

#[test]
fn max_iters_is_reported() {
    let config = Config::new(3, 0.0, 0.0).unwrap();
    let solution =
        minimize_unobserved(&Parabola, &ObjectiveOutput, [0.0, 10.0], &config).expect("runs");

    assert_eq!(solution.status, Status::MaxIters);
    assert_eq!(solution.iters, 3);
}

#[test]
fn observer_can_stop_early() {
    let mut events = 0;
    let observer = |_event: &Event<'_, f64, f64>| {
        events += 1;
        (events == 3).then_some(Action::StopEarly)
    };

    let solution = minimize(&Parabola, &ObjectiveOutput, [0.0, 10.0], &Config::default(), observer)
        .expect("should stop cleanly");

    assert_eq!(solution.status, Status::StoppedByObserver);
    assert_eq!(solution.iters, 2);
}

#[test]
fn assume_worse_points_are_never_best() {
    // Only the unobserved first interior point is a real candidate.
    let observer = |_event: &Event<'_, f64, f64>| Some(Action::AssumeWorse);

    let solution = minimize(&Parabola, &ObjectiveOutput, [0.0, 10.0], &Config::default(), observer)
        .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x, 10.0 * (1.0 - super::INV_PHI));
}

#[derive(Debug, Error)]
#[error("outside the valid domain")]
struct Domain;

/// Fails for negative inputs.
struct SquareRoot;

impl Model for SquareRoot {
    type Input = f64;
    type Output = f64;
    type Error = Domain;

    fn call(&self, x: &f64) -> Result<f64, Self::Error> {
        if *x < 0.0 { Err(Domain) } else { Ok(-x.sqrt() * (2.0 - x)) }
    }
}

struct Passthrough;

impl OptimizationProblem<1> for Passthrough {
    type Input = f64;
    type Output = f64;
    type Error = Domain;

    fn input(&self, x: &[f64; 1]) -> Result<f64, Self::Error> {
        Ok(x[0])
    }

    fn objective(&self, _input: &f64, output: &f64) -> Result<f64, Self::Error> {
        Ok(*output)
    }
}

#[test]
fn model_failure_propagates_without_recovery() {
    // Bracket [-10, 1]: the first interior point (~-5.8) fails.
    let result = minimize_unobserved(&SquareRoot, &Passthrough, [-10.0, 1.0], &Config::default());
    assert!(matches!(result, Err(Error::Model(_))));
}

#[test]
fn assume_worse_recovers_from_failure() {
    let observer = |event: &Event<'_, f64, f64>| match event {
        Event::Failed { .. } => Some(Action::AssumeWorse),
        Event::Evaluated { .. } => None,
    };

    let solution = maximize(&SquareRoot, &Passthrough, [-1.0, 2.0], &Config::default(), observer)
        .expect("should recover");

    // Maximum of -sqrt(x)(2 - x) on [0, 2] is at the ends; the search settles
    // on the valid side.
    assert!(solution.x >= 0.0);
    assert!(solution.objective.is_finite());
}

#[test]
fn non_finite_bracket_is_rejected() {
    let result = minimize_unobserved(&Parabola, &ObjectiveOutput, [f64::NAN, 1.0], &Config::default());
    assert!(matches!(result, Err(Error::NonFiniteBracket)));
}
