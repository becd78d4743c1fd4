use hybrid_core::{
    DelayHistory, Integrator, RecordSink, StateRef, StateVector, Tolerances, Trajectory,
};
use tracing::debug;

use super::{Plant, Reading};
use crate::{EngineError, HybridModel, Mode, Settings, SimulationEngine};

/// A [`HybridModel`] whose steady state is known in closed form.
pub trait Seekable: HybridModel + Clone {
    /// Sets the input held during a segment.
    fn set_input(&mut self, d: f64);

    /// Equilibrium state for input `d`, if one exists.
    fn equilibrium(&self, d: f64) -> Option<StateVector<Self::Var>>;

    /// Output to maximize at state `y`.
    fn output(&self, y: StateRef<'_, Self::Var>) -> f64;
}

/// A [`Plant`] that simulates a [`Seekable`] model one segment at a time.
///
/// Each segment runs a fresh [`SimulationEngine`] seeded with the trailing
/// history window of the previous segment, or with a constant past equal to
/// the initial state before the first one. Every segment's rows are copied to
/// `sink` as one continuous run; the row shared by consecutive segments is
/// written once.
pub struct SimulationPlant<M: Seekable, I, S> {
    model: M,
    integrator: I,
    sink: S,
    mode: Mode<M>,
    tolerances: Tolerances,
    settings: Settings,
    t_print: f64,
    state: StateVector<M::Var>,
    history: Option<DelayHistory>,
    started: bool,
}

impl<M, I, S> SimulationPlant<M, I, S>
where
    M: Seekable,
    I: Integrator + Clone,
    S: RecordSink,
{
    pub fn new(
        model: M,
        integrator: I,
        sink: S,
        initial: StateVector<M::Var>,
        mode: Mode<M>,
        t_print: f64,
    ) -> Self {
        Self {
            model,
            integrator,
            sink,
            mode,
            tolerances: Tolerances::default(),
            settings: Settings::default(),
            t_print,
            state: initial,
            history: None,
            started: false,
        }
    }

    #[must_use]
    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// State at the end of the last segment.
    #[must_use]
    pub fn state(&self) -> &StateVector<M::Var> {
        &self.state
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn copy_rows(&mut self, segment: &Trajectory) -> Result<(), EngineError> {
        let skip = if self.started {
            1
        } else {
            self.sink
                .begin(segment.columns())
                .map_err(EngineError::storage)?;
            self.started = true;
            0
        };
        for row in segment.rows().skip(skip) {
            self.sink.append(row).map_err(EngineError::storage)?;
        }
        Ok(())
    }
}

impl<M, I, S> Plant for SimulationPlant<M, I, S>
where
    M: Seekable,
    I: Integrator + Clone,
    S: RecordSink,
{
    type Error = EngineError;

    fn advance(&mut self, d: f64, t_start: f64, horizon: f64) -> Result<Reading, EngineError> {
        let mut model = self.model.clone();
        model.set_input(d);

        let history = self
            .history
            .take()
            .unwrap_or_else(|| DelayHistory::with_static(self.state.as_slice().to_vec()));

        let mut engine = SimulationEngine::new(model, self.integrator.clone(), Trajectory::new())
            .with_settings(self.settings);
        engine.prepare_from(
            t_start,
            self.state.clone(),
            self.mode,
            self.tolerances,
            history,
        )?;
        let outcome = engine.run(t_start + horizon, self.t_print);

        // Rows up to a failure are still part of the record.
        self.copy_rows(engine.sink())?;
        outcome?;

        if let Some(mode) = engine.mode() {
            self.mode = mode;
        }
        self.history = engine.history().cloned();

        let dimension = self.state.as_slice().len();
        if let Some(last) = engine.sink().last() {
            self.state = StateVector::from_slice(&last[1..=dimension])
                .map_err(|err| EngineError::DimensionMismatch {
                    expected: err.expected,
                    actual: err.actual,
                })?;
        }

        let segment_model = engine.model();
        let q = segment_model.output(self.state.view());
        let distance = segment_model.equilibrium(d).map_or(f64::INFINITY, |eq| {
            eq.as_slice()
                .iter()
                .zip(self.state.as_slice())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        });
        debug!(t_start, d, q, distance, "segment finished");

        Ok(Reading { q, distance })
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        if self.started {
            self.sink.finalize().map_err(EngineError::storage)?;
        }
        Ok(())
    }
}
