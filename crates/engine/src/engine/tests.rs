use std::convert::Infallible;

use approx::assert_relative_eq;
use hybrid_core::{
    Controller, NoController, RecordSink, StateMut, StateRef, StateVariable, StateVector,
    StopReason, Termination, TimeEvent, Tolerances, Trajectory, TrajectoryError,
};
use hybrid_solvers::integrator::ImplicitEuler;
use thiserror::Error;

use super::*;
use crate::Past;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Temp {
    Temperature,
}

impl StateVariable for Temp {
    const ALL: &'static [Self] = &[Self::Temperature];

    fn index(self) -> usize {
        0
    }

    fn name(self) -> &'static str {
        "temperature"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Heating,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Force {
    To(Mode),
}

/// Bang-bang heater switching between two temperature limits.
#[derive(Debug, Clone, Copy)]
struct Thermostat {
    lower: f64,
    upper: f64,
    power: f64,

    /// Margin above `upper` required before heating actually stops.
    guard: f64,

    /// Forces heating back on this long after switching off.
    dwell: Option<f64>,
}

impl Controller for Thermostat {
    type State = Mode;
    type Inputs = f64;
    type Outputs = f64;
    type Event = Force;

    fn outputs_on_entry(&self, state: Mode) -> f64 {
        match state {
            Mode::Heating => self.power,
            Mode::Idle => 0.0,
        }
    }

    fn indicator(&self, state: Mode, temperature: &f64) -> f64 {
        match state {
            Mode::Heating => self.upper - temperature,
            Mode::Idle => temperature - self.lower,
        }
    }

    fn next_state(&self, state: Mode, temperature: &f64) -> Option<Mode> {
        match state {
            Mode::Heating => (*temperature >= self.upper + self.guard).then_some(Mode::Idle),
            Mode::Idle => Some(Mode::Heating),
        }
    }

    fn on_time_event(&self, state: Mode, event: &Force) -> Option<Mode> {
        let Force::To(next) = *event;
        (next != state).then_some(next)
    }

    fn on_exit(&self, from: Mode, _to: Mode, t: f64) -> Vec<TimeEvent<Force>> {
        match (from, self.dwell) {
            (Mode::Heating, Some(dwell)) => {
                vec![TimeEvent::new(t + dwell, Force::To(Mode::Heating), "dwell over")]
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
#[error("temperature {0} is above the rated limit")]
struct Overheated(f64);

/// `T' = power - k (T - ambient)`.
#[derive(Debug, Clone)]
struct Room {
    k: f64,
    ambient: f64,
    thermostat: Thermostat,
    limit: f64,
}

impl Room {
    fn new() -> Self {
        Self {
            k: 0.1,
            ambient: 0.0,
            thermostat: Thermostat {
                lower: -10.0,
                upper: 1e6,
                power: 10.0,
                guard: 0.0,
                dwell: None,
            },
            limit: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ambient {
    Set(f64),
}

impl HybridModel for Room {
    type Var = Temp;
    type Controller = Thermostat;
    type Parameter = Ambient;
    type Error = Overheated;

    fn controller(&self) -> Thermostat {
        self.thermostat
    }

    fn controller_inputs(&self, _t: f64, y: StateRef<'_, Temp>) -> f64 {
        y[Temp::Temperature]
    }

    fn rhs(
        &self,
        _t: f64,
        y: StateRef<'_, Temp>,
        power: &f64,
        _past: &Past<'_, Temp>,
        mut dy: StateMut<'_, Temp>,
    ) -> Result<(), Overheated> {
        let temperature = y[Temp::Temperature];
        if temperature > self.limit {
            return Err(Overheated(temperature));
        }
        dy[Temp::Temperature] = power - self.k * (temperature - self.ambient);
        Ok(())
    }

    fn apply(&mut self, _t: f64, parameter: &Ambient) {
        let Ambient::Set(ambient) = *parameter;
        self.ambient = ambient;
    }

    fn auxiliary_names(&self) -> Vec<&'static str> {
        vec!["power"]
    }

    fn auxiliary(&self, _t: f64, _y: StateRef<'_, Temp>, power: &f64) -> Vec<f64> {
        vec![*power]
    }
}

fn start(temperature: f64) -> StateVector<Temp> {
    StateVector::from_fn(|_| temperature)
}

fn engine(room: Room) -> SimulationEngine<Room, ImplicitEuler, Trajectory> {
    SimulationEngine::new(room, ImplicitEuler::default(), Trajectory::new())
}

fn times(engine: &SimulationEngine<Room, ImplicitEuler, Trajectory>) -> Vec<f64> {
    engine.sink().column("t").unwrap()
}

#[test]
fn records_initial_row_and_every_print_point() {
    let mut engine = engine(Room::new());
    engine.prepare(start(0.0), Mode::Idle, Tolerances::default()).unwrap();
    assert_eq!(engine.phase(), Phase::Prepared);

    let summary = engine.run(1.0, 0.25).unwrap();

    assert_eq!(engine.phase(), Phase::Finalized);
    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(summary.rows, 5);
    assert_relative_eq!(summary.t_end, 1.0);

    let sink = engine.sink();
    assert!(sink.is_finalized());
    assert_eq!(sink.columns(), ["t", "temperature", "power"]);
    for (t, expected) in times(&engine).into_iter().zip([0.0, 0.25, 0.5, 0.75, 1.0]) {
        assert_relative_eq!(t, expected, epsilon = 1e-12);
    }
    assert_eq!(sink.column("power").unwrap(), vec![0.0; 5]);
}

#[test]
fn time_event_is_hit_exactly_and_applied() {
    let mut engine = engine(Room::new());
    engine.schedule(TimeEvent::new(0.3, Ambient::Set(20.0), "warm front"));
    engine.prepare(start(0.0), Mode::Idle, Tolerances::default()).unwrap();

    let summary = engine.run(1.0, 0.25).unwrap();

    assert_eq!(summary.time_events, 1);
    assert_relative_eq!(engine.model().ambient, 20.0);
    assert_eq!(engine.pending_events().count(), 0);

    let t = times(&engine);
    assert_eq!(t.len(), 6);
    assert!(t.iter().any(|&t| (t - 0.3).abs() < 1e-12));

    // Warming only starts once the new ambient is applied.
    let temperature = engine.sink().column("temperature").unwrap();
    assert_relative_eq!(temperature[2], 0.0);
    assert!(temperature[5] > 0.0);
}

#[test]
fn controller_transition_applies_entry_outputs_in_the_same_row() {
    let mut room = Room::new();
    room.thermostat.upper = 5.0;
    let mut engine = engine(room);
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    let summary = engine.run(1.0, 0.1).unwrap();

    assert_eq!(summary.transitions, 1);
    assert_eq!(engine.mode(), Some(Mode::Idle));
    assert_eq!(engine.outputs(), Some(&0.0));

    let sink = engine.sink();
    let power = sink.column("power").unwrap();
    let temperature = sink.column("temperature").unwrap();
    let switched = power.iter().position(|&p| p == 0.0).unwrap();
    assert!(switched > 0);
    assert_relative_eq!(power[switched - 1], 10.0);
    assert!(temperature[switched] >= 5.0 * (1.0 - 1e-10));
    assert!(temperature[switched - 1] < 5.0);
}

#[test]
fn transitions_schedule_controller_events() {
    let mut room = Room::new();
    room.thermostat.upper = 5.0;
    room.thermostat.dwell = Some(100.0);
    let mut engine = engine(room);
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    engine.run(1.0, 0.1).unwrap();

    let pending: Vec<_> = engine.pending_events().collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload, Scheduled::Controller(Force::To(Mode::Heating)));
    assert!(pending[0].fires_at > 100.0 && pending[0].fires_at < 101.0);
}

#[test]
fn zero_dwell_forces_the_return_at_the_same_instant() {
    let mut room = Room::new();
    room.thermostat.upper = 5.0;
    room.thermostat.dwell = Some(0.0);
    let mut engine = engine(room);
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    let summary = engine.run(3.0, 0.1).unwrap();

    assert_eq!(summary.transitions, 2);
    assert_eq!(summary.time_events, 1);
    assert_eq!(engine.mode(), Some(Mode::Heating));
    assert_eq!(engine.pending_events().count(), 0);

    // Heating never actually pauses, so every row sees full power.
    let sink = engine.sink();
    assert!(sink.column("power").unwrap().iter().all(|&p| p == 10.0));
    assert!(sink.last().unwrap()[1] > 5.0);
}

#[test]
fn event_scheduled_at_the_start_fires_before_the_first_step() {
    let mut engine = engine(Room::new());
    engine.schedule_controller(TimeEvent::new(0.0, Force::To(Mode::Idle), "off at start"));
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    let summary = engine.run(1.0, 0.5).unwrap();

    assert_eq!(summary.time_events, 1);
    assert_eq!(engine.mode(), Some(Mode::Idle));
    assert_eq!(engine.sink().column("power").unwrap(), vec![0.0; 3]);
}

#[test]
fn crossing_held_by_the_guard_is_not_retried() {
    let mut room = Room::new();
    room.thermostat.upper = 5.0;
    room.thermostat.guard = 1.0;
    let mut engine = engine(room);
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    let summary = engine.run(2.0, 0.1).unwrap();

    // The crossing at 5 is seen once and rejected; the indicator stays
    // negative afterwards, so passing 6 does not raise a new crossing.
    assert!(summary.events >= 1);
    assert_eq!(summary.transitions, 0);
    assert_eq!(engine.mode(), Some(Mode::Heating));
    assert!(engine.sink().last().unwrap()[1] > 6.0);
}

#[test]
fn controller_time_event_forces_transition() {
    let mut engine = engine(Room::new());
    engine.schedule_controller(TimeEvent::new(0.2, Force::To(Mode::Idle), "shutdown"));
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    let summary = engine.run(0.5, 0.1).unwrap();

    assert_eq!(summary.transitions, 1);
    assert_eq!(summary.time_events, 1);
    assert_eq!(engine.mode(), Some(Mode::Idle));

    let sink = engine.sink();
    let power = sink.column("power").unwrap();
    let at = times(&engine)
        .iter()
        .position(|&t| (t - 0.2).abs() < 1e-12)
        .unwrap();
    assert!(power[..at].iter().all(|&p| p == 10.0));
    assert!(power[at..].iter().all(|&p| p == 0.0));
}

#[test]
fn event_row_replaces_nearby_print_row() {
    let mut engine = engine(Room::new());
    engine.schedule(TimeEvent::new(0.5 + 1e-4, Ambient::Set(1.0), "nudge"));
    engine.prepare(start(0.0), Mode::Idle, Tolerances::default()).unwrap();

    let summary = engine.run(1.0, 0.5).unwrap();

    assert_eq!(summary.rows, 3);
    let t = times(&engine);
    assert_relative_eq!(t[0], 0.0);
    assert_relative_eq!(t[1], 0.5 + 1e-4, epsilon = 1e-12);
    assert_relative_eq!(t[2], 1.0);
}

#[test]
fn print_interval_below_record_spacing_keeps_every_row() {
    let mut engine = engine(Room::new());
    assert!(engine.settings().record_spacing > 1e-4);
    engine.prepare(start(0.0), Mode::Idle, Tolerances::default()).unwrap();

    let summary = engine.run(0.01, 1e-4).unwrap();

    assert_eq!(summary.rows, 101);
    let t = times(&engine);
    assert_eq!(t.len(), 101);
    assert_relative_eq!(t[0], 0.0);
    assert_relative_eq!(t[100], 0.01, epsilon = 1e-12);
    assert!(t.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn model_failure_finalizes_partial_results() {
    let mut room = Room::new();
    room.limit = 2.0;
    let mut engine = engine(room);
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    let err = engine.run(10.0, 0.1).unwrap_err();

    assert!(matches!(err, EngineError::ModelEvaluation { t, .. } if t > 0.0 && t < 10.0));
    assert_eq!(engine.phase(), Phase::Aborted);

    let sink = engine.sink();
    assert!(sink.is_finalized());
    assert!(sink.len() > 1);
    let temperature = sink.column("temperature").unwrap();
    assert!(temperature.iter().all(|&x| x <= 2.0));
}

#[test]
fn lifecycle_is_enforced() {
    let mut engine = engine(Room::new());
    assert!(matches!(
        engine.run(1.0, 0.1),
        Err(EngineError::InvalidPhase {
            expected: Phase::Prepared,
            actual: Phase::Uninitialized
        })
    ));

    engine.prepare(start(0.0), Mode::Idle, Tolerances::default()).unwrap();
    assert!(matches!(
        engine.prepare(start(0.0), Mode::Idle, Tolerances::default()),
        Err(EngineError::InvalidPhase { .. })
    ));

    // A bad span leaves the run prepared.
    assert!(matches!(
        engine.run(1.0, 0.0),
        Err(EngineError::InvalidSpan { .. })
    ));
    assert_eq!(engine.phase(), Phase::Prepared);

    engine.run(1.0, 0.5).unwrap();
    assert!(matches!(
        engine.run(2.0, 0.5),
        Err(EngineError::InvalidPhase {
            actual: Phase::Finalized,
            ..
        })
    ));
}

#[test]
fn observer_can_stop_the_run() {
    let mut engine = engine(Room::new());
    engine.prepare(start(0.0), Mode::Heating, Tolerances::default()).unwrap();

    let mut calls = 0;
    let observer = |progress: &Progress| {
        calls += 1;
        (progress.t >= 0.5).then_some(Action::StopEarly)
    };
    let summary = engine.run_observed(1.0, 0.1, observer).unwrap();

    assert!(calls > 0);
    assert_eq!(summary.termination, Termination::Stopped(StopReason::Observer));
    assert!(summary.t_end >= 0.5 && summary.t_end < 1.0);
    assert_eq!(engine.phase(), Phase::Finalized);

    let last = engine.sink().last().unwrap()[0];
    assert_relative_eq!(last, summary.t_end);
}

#[derive(Debug, Error)]
#[error("disk full")]
struct DiskFull;

/// Trajectory that refuses rows beyond a fixed count.
#[derive(Debug, Default)]
struct Bounded {
    inner: Trajectory,
    capacity: usize,
    finalized: bool,
}

impl RecordSink for Bounded {
    type Error = DiskFull;

    fn begin(&mut self, columns: &[String]) -> Result<(), DiskFull> {
        self.inner.begin(columns).map_err(|_: TrajectoryError| DiskFull)
    }

    fn append(&mut self, row: &[f64]) -> Result<(), DiskFull> {
        if self.inner.len() >= self.capacity {
            return Err(DiskFull);
        }
        self.inner.append(row).map_err(|_| DiskFull)
    }

    fn finalize(&mut self) -> Result<(), DiskFull> {
        self.finalized = true;
        Ok(())
    }
}

#[test]
fn storage_failure_aborts_the_run() {
    let sink = Bounded {
        capacity: 3,
        ..Bounded::default()
    };
    let mut engine = SimulationEngine::new(Room::new(), ImplicitEuler::default(), sink);
    engine.prepare(start(0.0), Mode::Idle, Tolerances::default()).unwrap();

    let err = engine.run(1.0, 0.1).unwrap_err();

    assert!(matches!(err, EngineError::Storage(_)));
    assert_eq!(engine.phase(), Phase::Aborted);
    assert!(engine.sink().finalized);
    assert_eq!(engine.sink().inner.len(), 3);
}

#[test]
fn builds_from_config() {
    let config = EngineConfig::from_toml_str(
        r"
        record_spacing = 0.0

        [integrator]
        max_step = 0.01
        ",
    )
    .unwrap();
    let mut engine = SimulationEngine::from_config(Room::new(), Trajectory::new(), &config).unwrap();
    assert_relative_eq!(engine.settings().record_spacing, 0.0);

    engine.prepare(start(1.0), Mode::Idle, config.tolerances).unwrap();
    let summary = engine.run(0.5, 0.5).unwrap();
    assert!(summary.steps >= 50);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lag {
    X,
}

impl StateVariable for Lag {
    const ALL: &'static [Self] = &[Self::X];

    fn index(self) -> usize {
        0
    }

    fn name(self) -> &'static str {
        "x"
    }
}

/// `x' = -x(t - tau)`.
struct Delayed {
    tau: f64,
}

impl HybridModel for Delayed {
    type Var = Lag;
    type Controller = NoController<()>;
    type Parameter = ();
    type Error = Infallible;

    fn controller(&self) -> NoController<()> {
        NoController::new()
    }

    fn controller_inputs(&self, _t: f64, _y: StateRef<'_, Lag>) {}

    fn rhs(
        &self,
        t: f64,
        _y: StateRef<'_, Lag>,
        _mode: &(),
        past: &Past<'_, Lag>,
        mut dy: StateMut<'_, Lag>,
    ) -> Result<(), Infallible> {
        dy[Lag::X] = -past.value(t - self.tau, Lag::X);
        Ok(())
    }

    fn delays(&self) -> Vec<f64> {
        vec![self.tau, 4.0 * self.tau]
    }
}

#[test]
fn delay_models_step_within_the_shortest_delay() {
    let mut engine = SimulationEngine::new(
        Delayed { tau: 0.05 },
        ImplicitEuler::default(),
        Trajectory::new(),
    );
    engine
        .prepare(StateVector::from_fn(|_| 1.0), (), Tolerances::default())
        .unwrap();

    let summary = engine.run(1.0, 0.05).unwrap();

    assert!(summary.steps >= 20);
    let x = engine.sink().column("x").unwrap();
    // Over the first delay the derivative is the constant history.
    assert_relative_eq!(x[1], 0.95, epsilon = 1e-9);
    assert!(x[20] < x[1]);

    let history = engine.history().unwrap();
    assert_eq!(history.last_time(), Some(1.0));
    assert_relative_eq!(history.value(1.0, 0), x[20], epsilon = 1e-12);
    assert!(history.len() < summary.steps);
}

#[test]
fn zero_delay_reads_the_current_state() {
    let mut engine = SimulationEngine::new(
        Delayed { tau: 0.0 },
        ImplicitEuler::default(),
        Trajectory::new(),
    );
    engine
        .prepare(StateVector::from_fn(|_| 1.0), (), Tolerances::default())
        .unwrap();

    engine.run(1.0, 0.5).unwrap();

    // With no delay the model is plain `x' = -x`.
    let x = engine.sink().column("x").unwrap();
    assert_eq!(x.len(), 3);
    assert_relative_eq!(x[1], (-0.5_f64).exp(), epsilon = 1e-2);
    assert_relative_eq!(x[2], (-1.0_f64).exp(), epsilon = 1e-2);
}
