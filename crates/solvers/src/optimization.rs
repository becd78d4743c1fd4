//! Solvers for scalar optimization problems.
//!
//! An [`OptimizationProblem`] maps a solver variable to a model input, calls
//! the model, and extracts a scalar objective.
//!
//! [`OptimizationProblem`]: hybrid_core::OptimizationProblem

mod evaluate;

pub use evaluate::{EvalError, Evaluation, evaluate};

pub mod golden_section;
