//! The simulation engine and its run lifecycle.
//!
//! A run moves through `Uninitialized -> Prepared -> Running` and ends in
//! `Finalized` or `Aborted`. [`SimulationEngine::run`] drives the integrator
//! through a [`HybridSystem`](hybrid_core::HybridSystem) adapter that:
//!
//! - lands exactly on the earliest pending time event,
//! - applies due parameter changes and controller events when it lands there,
//! - transitions the controller when its indicator falls through zero,
//! - records a row at the initial time, every print point, and every event.
//!
//! The sink is finalized before `run` returns, on success and on failure.

mod driver;
mod recorder;

#[cfg(test)]
mod tests;

use hybrid_core::{
    ControllerStateMachine, DelayHistory, IntegrationError, IntegrationSummary, Integrator,
    Observer, RecordSink, Span, StateVariable, StateVector, Termination, TimeEvent,
    TimeEventRegistry, Tolerances,
};
use tracing::{error, info, warn};

use crate::{
    ConfigError, ControllerEvent, EngineConfig, EngineError, HybridModel, Mode, Scheduled,
    Settings,
};

use driver::{Driver, Fault};
use recorder::{Recorder, RowKind};

/// Lifecycle phase of a [`SimulationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Prepared,
    Running,
    Finalized,
    Aborted,
}

/// Progress event sent to the observer after every accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub t: f64,
    pub t_final: f64,
}

impl Progress {
    /// Fraction of the span covered so far.
    #[must_use]
    pub fn fraction(&self, t0: f64) -> f64 {
        if self.t_final > t0 {
            ((self.t - t0) / (self.t_final - t0)).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Actions a progress observer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop after the current step; the run still finalizes normally.
    StopEarly,
}

/// Counters reported by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub t_end: f64,
    pub steps: usize,
    pub rejected: usize,

    /// Event callbacks issued by the integrator.
    pub events: usize,

    /// Controller transitions performed.
    pub transitions: usize,

    /// Scheduled events applied.
    pub time_events: usize,

    /// Rows written to the sink.
    pub rows: usize,

    pub termination: Termination,
}

type Registry<M> =
    TimeEventRegistry<Scheduled<<M as HybridModel>::Parameter, ControllerEvent<M>>>;

/// State created by `prepare` and consumed by `run`.
struct Prepared<M: HybridModel> {
    t0: f64,
    initial: StateVector<M::Var>,
    machine: ControllerStateMachine<M::Controller>,
    tolerances: Tolerances,
    history: DelayHistory,
}

/// Drives a [`HybridModel`] through an [`Integrator`], streaming rows to a
/// [`RecordSink`].
///
/// # Example
///
/// ```ignore
/// let mut engine = SimulationEngine::new(model, ImplicitEuler::default(), Trajectory::new());
/// engine.schedule_all(schedule.time_events());
/// engine.prepare(initial, mode, Tolerances::default())?;
/// let summary = engine.run(100.0, 0.1)?;
/// ```
pub struct SimulationEngine<M: HybridModel, I, S> {
    model: M,
    integrator: I,
    sink: S,
    settings: Settings,
    phase: Phase,
    registry: Registry<M>,
    prepared: Option<Prepared<M>>,
}

impl<M, S> SimulationEngine<M, hybrid_solvers::integrator::ImplicitEuler, S>
where
    M: HybridModel,
    S: RecordSink,
{
    /// Creates an engine using the integrator and settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn from_config(model: M, sink: S, config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(model, config.integrator()?, sink).with_settings(config.settings()))
    }
}

impl<M, I, S> SimulationEngine<M, I, S>
where
    M: HybridModel,
    I: Integrator,
    S: RecordSink,
{
    /// Creates an engine with default settings.
    pub fn new(model: M, integrator: I, sink: S) -> Self {
        Self {
            model,
            integrator,
            sink,
            settings: Settings::default(),
            phase: Phase::Uninitialized,
            registry: TimeEventRegistry::new(),
            prepared: None,
        }
    }

    /// Replaces the event epsilon and record spacing.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the engine, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Returns the current controller state once prepared.
    pub fn mode(&self) -> Option<Mode<M>> {
        self.prepared.as_ref().map(|p| p.machine.state())
    }

    /// Returns the outputs of the current controller state once prepared.
    pub fn outputs(&self) -> Option<&crate::Outputs<M>> {
        self.prepared.as_ref().map(|p| p.machine.outputs())
    }

    /// Returns the delay history once prepared.
    ///
    /// After a run it holds the trailing window of accepted steps.
    #[must_use]
    pub fn history(&self) -> Option<&DelayHistory> {
        self.prepared.as_ref().map(|p| &p.history)
    }

    /// Returns the scheduled events that have not fired yet.
    pub fn pending_events(
        &self,
    ) -> impl Iterator<Item = &TimeEvent<Scheduled<M::Parameter, ControllerEvent<M>>>> {
        self.registry.iter()
    }

    /// Schedules a parameter change.
    pub fn schedule(&mut self, event: TimeEvent<M::Parameter>) {
        self.registry.insert(TimeEvent {
            fires_at: event.fires_at,
            payload: Scheduled::Parameter(event.payload),
            description: event.description,
        });
    }

    /// Schedules every parameter change in `events`.
    pub fn schedule_all(&mut self, events: impl IntoIterator<Item = TimeEvent<M::Parameter>>) {
        for event in events {
            self.schedule(event);
        }
    }

    /// Schedules a controller event, such as the end of a dwell time.
    pub fn schedule_controller(&mut self, event: TimeEvent<ControllerEvent<M>>) {
        self.registry.insert(TimeEvent {
            fires_at: event.fires_at,
            payload: Scheduled::Controller(event.payload),
            description: event.description,
        });
    }

    /// Prepares a run starting at `t = 0` with a constant past equal to
    /// `initial`.
    ///
    /// # Errors
    ///
    /// See [`prepare_from`](Self::prepare_from).
    pub fn prepare(
        &mut self,
        initial: StateVector<M::Var>,
        mode: Mode<M>,
        tolerances: Tolerances,
    ) -> Result<(), EngineError> {
        let history = DelayHistory::with_static(initial.as_slice().to_vec());
        self.prepare_from(0.0, initial, mode, tolerances, history)
    }

    /// Prepares a run starting at `t0` with the given past trajectory.
    ///
    /// Starts a run on the sink with the columns `t`, the state names, and
    /// the model's auxiliary names.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPhase`] unless the engine is
    /// uninitialized, [`EngineError::DimensionMismatch`] if `history` does not
    /// match the state, or [`EngineError::Storage`] if the sink cannot start.
    pub fn prepare_from(
        &mut self,
        t0: f64,
        initial: StateVector<M::Var>,
        mode: Mode<M>,
        tolerances: Tolerances,
        mut history: DelayHistory,
    ) -> Result<(), EngineError> {
        self.expect_phase(Phase::Uninitialized)?;
        let dimension = M::Var::dimension();
        if history.dimension() != dimension {
            return Err(EngineError::DimensionMismatch {
                expected: dimension,
                actual: history.dimension(),
            });
        }
        history.push(t0, initial.as_slice())?;

        let mut columns = Vec::with_capacity(dimension + 1);
        columns.push("t".to_string());
        columns.extend(M::Var::names().into_iter().map(String::from));
        columns.extend(self.model.auxiliary_names().into_iter().map(String::from));
        self.sink.begin(&columns).map_err(EngineError::storage)?;

        let machine = ControllerStateMachine::new(self.model.controller(), mode);
        info!(t0, mode = ?machine.state(), columns = columns.len(), "engine prepared");

        self.prepared = Some(Prepared {
            t0,
            initial,
            machine,
            tolerances,
            history,
        });
        self.phase = Phase::Prepared;
        Ok(())
    }

    /// Runs the prepared simulation to `t_final`, recording every `t_print`.
    ///
    /// # Errors
    ///
    /// See [`run_observed`](Self::run_observed).
    pub fn run(&mut self, t_final: f64, t_print: f64) -> Result<RunSummary, EngineError> {
        self.run_observed(t_final, t_print, ())
    }

    /// Runs the prepared simulation, reporting [`Progress`] after every
    /// accepted step.
    ///
    /// The observer may return [`Action::StopEarly`] to end the run; the
    /// summary then reports [`Termination::Stopped`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPhase`] unless prepared,
    /// [`EngineError::InvalidSpan`] for a bad span (the engine stays
    /// prepared), and otherwise the model, integrator, or storage failure
    /// that ended the run. The sink is finalized before any run failure is
    /// returned.
    pub fn run_observed<O>(
        &mut self,
        t_final: f64,
        t_print: f64,
        observer: O,
    ) -> Result<RunSummary, EngineError>
    where
        O: Observer<Progress, Action>,
    {
        self.expect_phase(Phase::Prepared)?;
        let Some(mut prepared) = self.prepared.take() else {
            return Err(EngineError::InvalidPhase {
                expected: Phase::Prepared,
                actual: self.phase,
            });
        };

        let span = Span::new(prepared.t0, t_final, t_print);
        if !span.is_valid() {
            let t0 = prepared.t0;
            self.prepared = Some(prepared);
            return Err(EngineError::InvalidSpan {
                t0,
                t_final,
                t_print,
            });
        }

        self.phase = Phase::Running;
        info!(t0 = span.t0, t_final, t_print, "run started");

        let recorder = Recorder::new(&mut self.sink, self.settings.record_spacing);
        let mut driver = Driver::new(
            &mut self.model,
            &mut prepared.machine,
            &mut self.registry,
            &mut prepared.history,
            recorder,
            observer,
            self.settings,
            t_final,
        );

        let y0 = prepared.initial.as_slice();
        let result = driver
            .record(RowKind::Print, span.t0, y0)
            .map_err(IntegrationError::System)
            .and_then(|()| {
                self.integrator
                    .integrate(&mut driver, &span, &prepared.tolerances, y0)
            });
        let (counts, mut recorder) = driver.finish();

        let outcome = match result {
            Ok(summary) => recorder
                .finish()
                .map(|()| summary)
                .map_err(EngineError::storage),
            Err(err) => {
                let err = engine_error(err, &span);
                warn!(error = %err, "run failed, finalizing partial results");
                if let Err(storage) = recorder.finish() {
                    error!(error = %storage, "failed to finalize partial results");
                }
                Err(err)
            }
        };
        let rows = recorder.written();
        self.prepared = Some(prepared);

        match outcome {
            Ok(summary) => {
                self.phase = Phase::Finalized;
                let summary = summarize(summary, counts, rows);
                info!(
                    t_end = summary.t_end,
                    steps = summary.steps,
                    rejected = summary.rejected,
                    transitions = summary.transitions,
                    rows = summary.rows,
                    "run finished"
                );
                Ok(summary)
            }
            Err(err) => {
                self.phase = Phase::Aborted;
                Err(err)
            }
        }
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), EngineError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}

fn summarize(summary: IntegrationSummary, counts: driver::Counts, rows: usize) -> RunSummary {
    RunSummary {
        t_end: summary.t_end,
        steps: summary.steps,
        rejected: summary.rejected,
        events: summary.events,
        transitions: counts.transitions,
        time_events: counts.time_events,
        rows,
        termination: summary.termination,
    }
}

fn engine_error<ME, SE>(err: IntegrationError<Fault<ME, SE>>, span: &Span) -> EngineError
where
    ME: std::error::Error + Send + Sync + 'static,
    SE: std::error::Error + Send + Sync + 'static,
{
    match err {
        IntegrationError::System(Fault::Model { t, source }) => EngineError::ModelEvaluation {
            t,
            source: Box::new(source),
        },
        IntegrationError::System(Fault::Sink(source)) => EngineError::storage(source),
        IntegrationError::System(Fault::History(source)) => EngineError::History(source),
        IntegrationError::System(Fault::EventCascade { t }) => EngineError::EventCascade { t },
        IntegrationError::Convergence { t, step } => EngineError::Convergence { t, step },
        IntegrationError::InvalidSpan => EngineError::InvalidSpan {
            t0: span.t0,
            t_final: span.t_final,
            t_print: span.t_print,
        },
        IntegrationError::DimensionMismatch { expected, actual } => {
            EngineError::DimensionMismatch { expected, actual }
        }
    }
}
