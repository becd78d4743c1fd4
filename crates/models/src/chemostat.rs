//! Chemostat models driven by a dilution rate.
//!
//! [`Chemostat`] is the single-substrate Monod chemostat. [`ChemostatDde`] is
//! the two-stage anaerobic digestion chemostat whose growth terms act after
//! a delay; its equilibrium is known in closed form up to two scalar roots,
//! which makes it the reference plant for extremum seeking.

mod dde;
mod kinetics;
mod simple;

pub use dde::{ChemostatDde, DdeParameters, DdeVar, Optimum, SweepError, SweepPoint};
pub use kinetics::{Haldane, Monod};
pub use simple::{Chemostat, ChemostatParameters, ChemostatVar};

use hybrid_core::TimeEvent;

use crate::schedule::Schedule;

/// Sets the dilution rate `D`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dilution(pub f64);

/// Dilution changes for every row of `schedule` after the first.
#[must_use]
pub fn dilution_events(schedule: &Schedule<f64>, t0: f64) -> Vec<TimeEvent<Dilution>> {
    schedule.time_events(t0, |&d| Dilution(d))
}
