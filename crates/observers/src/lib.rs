//! Reusable observers for hybrid simulation runs and solvers.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work across the engine, the extremum-seeking search, and the scalar solvers.
//!
//! # Modules
//!
//! - [`traits`]: capability traits for cross-solver observers
//!   ([`HasTime`], [`HasResidual`], [`HasObjective`], [`CanStopEarly`],
//!   [`CanAssumeWorse`])
//! - [`ProgressLog`]: logs simulated-time progress through `tracing`
//! - [`StopAt`]: stops any time-stamped run at a given time
//!
//! [`Observer`]: hybrid_core::Observer
//! [`HasTime`]: traits::HasTime
//! [`HasResidual`]: traits::HasResidual
//! [`HasObjective`]: traits::HasObjective
//! [`CanStopEarly`]: traits::CanStopEarly
//! [`CanAssumeWorse`]: traits::CanAssumeWorse

mod progress;
mod stop;
pub mod traits;

pub use progress::ProgressLog;
pub use stop::StopAt;
