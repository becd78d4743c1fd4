//! Hybrid models driven by the simulation engine.
//!
//! - [`schedule`]: piecewise-constant parameter tables turned into time events
//! - [`tank`]: a compressed gas storage tank cycled by a pressure controller
//! - [`chemostat`]: a Monod chemostat and a two-stage chemostat with delays

pub mod chemostat;
pub mod schedule;
pub mod tank;
