//! Event-driven simulation of hybrid continuous/discrete models.
//!
//! [`SimulationEngine`] wires a [`HybridModel`] to an
//! [`Integrator`](hybrid_core::Integrator) and a
//! [`RecordSink`](hybrid_core::RecordSink). Scheduled parameter changes are
//! hit exactly, controller transitions are detected from indicator sign
//! changes between accepted steps, and rows are streamed to the sink at the
//! print cadence. The sink is finalized on every exit path.
//!
//! [`extremum_seeking`] runs repeated bounded segments of a plant to locate
//! the input that maximizes a steady-state output.

mod config;
mod engine;
mod error;
pub mod extremum_seeking;
mod model;

pub use config::{ConfigError, EngineConfig, IntegratorConfig, Settings};
pub use engine::{Action, Phase, Progress, RunSummary, SimulationEngine};
pub use error::EngineError;
pub use model::{ControllerEvent, HybridModel, Inputs, Mode, Outputs, Past, Scheduled};
