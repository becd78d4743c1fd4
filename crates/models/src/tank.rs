//! A compressed gas storage tank cycled between fueling and extraction.
//!
//! [`TankController`] decides when to fuel, extract, or wait from the tank
//! pressure. [`GasTank`] is the lumped thermal model it drives.

mod controller;
mod model;

pub use controller::{RELATIVE_TOLERANCE, TankController, TankEvent, TankOutputs, TankState};
pub use model::{GasTank, TankError, TankParameter, TankParameters, TankVar};
