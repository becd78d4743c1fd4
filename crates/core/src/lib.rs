//! Core traits and types for hybrid continuous/discrete simulation.
//!
//! This crate defines the shared abstractions that integrators, the simulation
//! engine, and models build on:
//!
//! - [`Model`] and [`Snapshot`] for callable models and their captured calls
//! - [`Observer`] for receiving solver events and returning control actions
//! - [`EquationProblem`] and [`OptimizationProblem`] for scalar solvers
//! - [`StateVariable`] and [`StateVector`] for enum-indexed state
//! - [`TimeEventRegistry`] for scheduled parameter discontinuities
//! - [`ControllerStateMachine`] for indicator-driven discrete modes
//! - [`HybridSystem`] and [`Integrator`] for the callback contract between an
//!   integrator and whatever drives it
//! - [`RecordSink`] for streaming result rows

mod controller;
mod event;
mod history;
mod integrator;
mod model;
mod observer;
mod problems;
mod record;
mod state;
mod system;

pub use controller::{Controller, ControllerStateMachine, NoController, Transition};
pub use event::{TimeEvent, TimeEventRegistry};
pub use history::{DelayHistory, HistoryError};
pub use integrator::{IntegrationError, IntegrationSummary, Integrator, Span, Termination, Tolerances};
pub use model::{Model, Snapshot};
pub use observer::Observer;
pub use problems::{EquationProblem, OptimizationProblem};
pub use record::{RecordSink, Trajectory, TrajectoryError};
pub use state::{DimensionMismatch, StateMut, StateRef, StateVariable, StateVector};
pub use system::{AcceptedStep, Crossing, EventInfo, HybridSystem, StepOutcome, StopReason};
