//! Shared fixtures for the end-to-end scenarios under `tests/`.

use std::path::Path;

use hybrid_core::StateVector;
use hybrid_models::{
    schedule::Schedule,
    tank::{GasTank, TankController, TankParameters, TankVar},
};
use hybrid_store::{ResultStore, StoreConfig};
use uom::si::{
    f64::{Pressure, ThermodynamicTemperature, Time},
    pressure::bar,
    thermodynamic_temperature::kelvin,
    time::second,
};

/// Dilution rates held for ten time units each, starting from batch culture.
///
/// # Panics
///
/// Never; the rows are valid.
#[must_use]
pub fn dilution_schedule() -> Schedule<f64> {
    Schedule::new([(10.0, 0.0), (10.0, 0.1), (10.0, 0.05), (10.0, 0.15)])
        .expect("reference schedule rows are valid")
}

/// A refueling station tank that rests `wait` seconds between phases.
#[must_use]
pub fn station_tank(wait: f64) -> GasTank {
    let wait = Time::new::<second>(wait);
    GasTank::new(
        TankParameters::default(),
        TankController::default().with_waits(wait, wait),
    )
}

/// The tank at 20 bar with gas and wall at 300 K.
#[must_use]
pub fn nearly_empty(tank: &GasTank) -> StateVector<TankVar> {
    let t = ThermodynamicTemperature::new::<kelvin>(300.0);
    tank.initial_state(t, Pressure::new::<bar>(20.0), t)
}

/// Opens a store rooted at `root` with small chunks, so flushes happen.
///
/// # Panics
///
/// Panics if the store cannot be opened.
#[must_use]
pub fn open_store(root: &Path, group: &str) -> ResultStore {
    ResultStore::open(StoreConfig::new(root, group).with_chunk_size(64))
        .expect("store opens in a fresh directory")
}

/// Returns true if every value is strictly greater than the one before.
#[must_use]
pub fn strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[1] > pair[0])
}
