//! Scalar solvers and time integrators for hybrid simulation.
//!
//! - [`equation::bisection`] finds a bracketed root of a scalar equation.
//! - [`optimization::golden_section`] finds the optimum of a unimodal scalar
//!   objective.
//! - [`integrator::implicit_euler`] and [`integrator::explicit_euler`] advance
//!   a [`HybridSystem`](hybrid_core::HybridSystem), landing exactly on time
//!   events and print points.

pub mod equation;
pub mod integrator;
pub mod optimization;
