//! Extremum seeking over a plant observed only through simulation.
//!
//! [`seek`] looks for the input `D*` that maximizes a steady-state output
//! `Q(D)`. The plant is advanced in fixed segments of `main_sim_step`. After
//! each segment the plant reports `Q` and the distance of its state from the
//! known equilibrium for the current input. Only readings within `eps_z` of
//! equilibrium are trusted and advance the search; otherwise the same input
//! is held for another segment.
//!
//! The search itself lives in [`Session`]:
//!
//! - **Stage I** brackets the maximum by exponential steps from the midpoint
//!   of `[d_min, d_max]`, reversing once if the first probe is worse.
//! - **Stage II** shrinks the bracket by golden-section steps, probing one new
//!   interior point per iteration.
//! - **Stage III** reports the bracket midpoint and its observed output.
//!
//! # Example
//!
//! ```
//! use hybrid_engine::extremum_seeking::{Config, Plant, Reading, Status, seek};
//! use std::convert::Infallible;
//!
//! /// A plant that settles instantly onto `Q(D) = -(D - 0.3)^2`.
//! struct Parabola;
//!
//! impl Plant for Parabola {
//!     type Error = Infallible;
//!
//!     fn advance(&mut self, d: f64, _t: f64, _horizon: f64) -> Result<Reading, Infallible> {
//!         Ok(Reading { q: -(d - 0.3).powi(2), distance: 0.0 })
//!     }
//! }
//!
//! let config = Config::new(0.0, 1.0, 1e-3, 0.05).unwrap().with_horizon(1.0, 500.0);
//! let outcome = seek(&mut Parabola, &config, ()).unwrap();
//!
//! assert_eq!(outcome.status, Status::Found);
//! assert!((outcome.d_max - 0.3).abs() <= 1e-3);
//! ```

mod config;
mod plant;
mod session;


pub use config::{Config, ConfigError, ParseError};
pub use plant::{Seekable, SimulationPlant};
pub use session::{Session, Stage};

use hybrid_core::Observer;
use thiserror::Error;
use tracing::{info, warn};

/// A plant advanced one segment at a time under a held input.
pub trait Plant {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Holds input `d` from `t_start` for `horizon` and reports the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the plant cannot be advanced.
    fn advance(&mut self, d: f64, t_start: f64, horizon: f64) -> Result<Reading, Self::Error>;

    /// Called once when the search ends, on success and on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if results cannot be persisted.
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Plant output at the end of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Output to maximize.
    pub q: f64,

    /// Largest absolute difference between the state and the equilibrium
    /// for the held input.
    pub distance: f64,
}

/// Emitted after every segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub segment: usize,

    /// Time at the end of the segment.
    pub t: f64,

    /// Input held during the segment.
    pub d: f64,

    pub reading: Reading,

    /// Stage awaiting the next trusted reading.
    pub stage: Stage,
}

/// Actions an observer can request between segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Stop,
}

/// How the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The maximizer was located.
    Found,

    /// The horizon ran out before the search finished.
    HorizonExhausted,

    /// An observer stopped the search before it finished.
    StoppedByObserver,
}

/// Result of [`seek`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub found: bool,

    /// Located maximizer, or the last input tried when not found.
    pub d_max: f64,

    /// Output observed at `d_max`; `NaN` when not found.
    pub q_max: f64,

    pub status: Status,

    /// Segments simulated.
    pub segments: usize,

    /// Trusted readings consumed by the search.
    pub evaluations: usize,
}

/// Errors returned by [`seek`].
#[derive(Debug, Error)]
pub enum Error<E> {
    #[error("plant failed")]
    Plant(#[source] E),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Runs the extremum-seeking search on `plant`.
///
/// Segments continue until `t_final` even after the maximizer is found, with
/// the input held at `d_max`.
///
/// # Errors
///
/// Returns an error if `config` is invalid or the plant fails.
/// [`Plant::finish`] is called before any plant failure is returned.
pub fn seek<P, O>(plant: &mut P, config: &Config, mut observer: O) -> Result<Outcome, Error<P::Error>>
where
    P: Plant,
    O: Observer<Event, Action>,
{
    config.validate()?;

    let mut session = Session::new(config);
    let mut t = 0.0;
    let mut segments = 0;
    let mut evaluations = 0;
    let mut stopped = false;

    info!(
        d_min = config.d_min,
        d_max = config.d_max,
        t_final = config.t_final,
        "extremum seeking started"
    );

    while config.t_final - t > 1e-12 * config.t_final.max(1.0) {
        let horizon = config.main_sim_step.min(config.t_final - t);
        let d = session.input();

        let reading = match plant.advance(d, t, horizon) {
            Ok(reading) => reading,
            Err(err) => {
                if let Err(finish) = plant.finish() {
                    warn!(error = %finish, "failed to finish plant after failure");
                }
                return Err(Error::Plant(err));
            }
        };
        t += horizon;
        segments += 1;

        if !session.is_found() && reading.distance <= config.eps_z {
            session.step(reading.q);
            evaluations += 1;
        }

        let event = Event {
            segment: segments,
            t,
            d,
            reading,
            stage: session.stage(),
        };
        if let Some(Action::Stop) = observer.observe(&event) {
            stopped = true;
            break;
        }
    }

    plant.finish().map_err(Error::Plant)?;

    let outcome = match session.result() {
        Some((d_max, q_max)) => Outcome {
            found: true,
            d_max,
            q_max,
            status: Status::Found,
            segments,
            evaluations,
        },
        None => Outcome {
            found: false,
            d_max: session.input(),
            q_max: f64::NAN,
            status: if stopped {
                Status::StoppedByObserver
            } else {
                Status::HorizonExhausted
            },
            segments,
            evaluations,
        },
    };

    info!(
        found = outcome.found,
        d_max = outcome.d_max,
        q_max = outcome.q_max,
        segments,
        evaluations,
        "extremum seeking finished"
    );
    Ok(outcome)
}
