//! Solvers for scalar equation problems.
//!
//! An [`EquationProblem`] maps solver variables to a model input, calls the
//! model, and computes residuals. Solvers in this module drive those residuals
//! toward zero.
//!
//! [`EquationProblem`]: hybrid_core::EquationProblem

mod evaluate;

pub use evaluate::{EvalError, EvaluateResult, Evaluation, evaluate};

pub mod bisection;
