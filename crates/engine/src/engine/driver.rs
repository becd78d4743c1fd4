use hybrid_core::{
    AcceptedStep, ControllerStateMachine, Crossing, DelayHistory, EventInfo, HistoryError,
    HybridSystem, Observer, RecordSink, StateMut, StateRef, StateVariable, StepOutcome,
    StopReason, Transition,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Action, Progress, Registry};
use crate::{ControllerEvent, HybridModel, Mode, Past, Scheduled, Settings};

use super::recorder::{Recorder, RowKind};

/// Failures raised inside integrator callbacks.
#[derive(Debug, Error)]
pub(super) enum Fault<ME, SE> {
    #[error("model evaluation failed at t = {t}")]
    Model {
        t: f64,
        #[source]
        source: ME,
    },

    #[error("record sink failed")]
    Sink(#[source] SE),

    #[error("delay history rejected a sample")]
    History(#[source] HistoryError),

    #[error("time events at t = {t} kept scheduling new events at the same instant")]
    EventCascade { t: f64 },
}

/// Rounds of same-instant time events fired before a run gives up.
const MAX_EVENT_ROUNDS: usize = 64;

/// Event counters gathered during a run.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Counts {
    pub(super) transitions: usize,
    pub(super) time_events: usize,
}

/// Adapts a [`HybridModel`] and its controller to the [`HybridSystem`]
/// callbacks of an integrator.
pub(super) struct Driver<'a, 's, M: HybridModel, S, O> {
    model: &'a mut M,
    machine: &'a mut ControllerStateMachine<M::Controller>,
    registry: &'a mut Registry<M>,
    history: &'a mut DelayHistory,
    recorder: Recorder<'s, S>,
    observer: O,
    settings: Settings,
    t_final: f64,
    max_step: Option<f64>,
    window: Option<f64>,
    counts: Counts,
}

type Step<M, S> = StepOutcome<Fault<<M as HybridModel>::Error, <S as RecordSink>::Error>>;

impl<'a, 's, M, S, O> Driver<'a, 's, M, S, O>
where
    M: HybridModel,
    S: RecordSink,
    O: Observer<Progress, Action>,
{
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        model: &'a mut M,
        machine: &'a mut ControllerStateMachine<M::Controller>,
        registry: &'a mut Registry<M>,
        history: &'a mut DelayHistory,
        recorder: Recorder<'s, S>,
        observer: O,
        settings: Settings,
        t_final: f64,
    ) -> Self {
        let delays = model.delays();
        let max_step = delays
            .iter()
            .copied()
            .filter(|&tau| tau > 0.0)
            .reduce(f64::min);
        let window = max_step.map(|_| model.history_window());
        Self {
            model,
            machine,
            registry,
            history,
            recorder,
            observer,
            settings,
            t_final,
            max_step,
            window,
            counts: Counts::default(),
        }
    }

    /// Ends the run, returning the counters and the recorder.
    pub(super) fn finish(self) -> (Counts, Recorder<'s, S>) {
        (self.counts, self.recorder)
    }

    /// Records the row for `(t, y)` including auxiliary columns.
    pub(super) fn record(
        &mut self,
        kind: RowKind,
        t: f64,
        y: &[f64],
    ) -> Result<(), Fault<M::Error, S::Error>> {
        let state = StateRef::<M::Var>::new(y);
        let auxiliary = self.model.auxiliary(t, state, self.machine.outputs());
        let mut row = Vec::with_capacity(1 + y.len() + auxiliary.len());
        row.push(t);
        row.extend_from_slice(y);
        row.extend(auxiliary);
        self.recorder.record(kind, row).map_err(Fault::Sink)
    }

    fn transitioned(&mut self, transition: Transition<Mode<M>, ControllerEvent<M>>) {
        info!(
            t = transition.at,
            from = ?transition.from,
            to = ?transition.to,
            scheduled = transition.scheduled.len(),
            "controller transition"
        );
        self.counts.transitions += 1;
        for event in transition.scheduled {
            debug!(fires_at = event.fires_at, description = %event.description, "controller scheduled event");
            self.registry.insert(hybrid_core::TimeEvent {
                fires_at: event.fires_at,
                payload: Scheduled::Controller(event.payload),
                description: event.description,
            });
        }
    }

    /// Fires every event due at `t`, including events that transitions
    /// schedule for `t` itself, such as a zero dwell.
    fn fire_due(&mut self, t: f64) -> Result<(), Fault<M::Error, S::Error>> {
        for _ in 0..MAX_EVENT_ROUNDS {
            let due = self.registry.drain_due(t, self.settings.time_event_epsilon);
            if due.is_empty() {
                return Ok(());
            }
            for event in due {
                self.counts.time_events += 1;
                info!(t, fires_at = event.fires_at, description = %event.description, "time event");
                match event.payload {
                    Scheduled::Parameter(parameter) => self.model.apply(t, &parameter),
                    Scheduled::Controller(controller_event) => {
                        if let Some(transition) =
                            self.machine.process_time_event(t, &controller_event)
                        {
                            self.transitioned(transition);
                        }
                    }
                }
            }
        }
        Err(Fault::EventCascade { t })
    }
}

impl<M, S, O> HybridSystem for Driver<'_, '_, M, S, O>
where
    M: HybridModel,
    S: RecordSink,
    O: Observer<Progress, Action>,
{
    type Error = Fault<M::Error, S::Error>;

    fn dimension(&self) -> usize {
        M::Var::dimension()
    }

    fn num_indicators(&self) -> usize {
        1
    }

    fn rhs(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<(), Self::Error> {
        let past = Past::new(&*self.history).with_current(t, y);
        self.model
            .rhs(
                t,
                StateRef::new(y),
                self.machine.outputs(),
                &past,
                StateMut::new(dy),
            )
            .map_err(|source| Fault::Model { t, source })
    }

    fn state_events(&self, t: f64, y: &[f64], out: &mut [f64]) -> Result<(), Self::Error> {
        let inputs = self.model.controller_inputs(t, StateRef::new(y));
        out[0] = self.machine.indicator(&inputs);
        Ok(())
    }

    fn max_step(&self) -> Option<f64> {
        self.max_step
    }

    fn time_events(&mut self, t: f64) -> Option<f64> {
        let stale = self
            .registry
            .discard_before(t - self.settings.time_event_epsilon);
        if stale > 0 {
            warn!(t, stale, "discarded time events scheduled in the past");
        }
        self.registry.peek_earliest()
    }

    fn on_event(&mut self, t: f64, y: &[f64], info: &EventInfo<'_>) -> Step<M, S> {
        if info.time_event
            && let Err(err) = self.fire_due(t)
        {
            return StepOutcome::Fail(err);
        }
        if info.state_events.first() == Some(&Crossing::Falling) {
            let inputs = self.model.controller_inputs(t, StateRef::new(y));
            match self.machine.make_transition(t, &inputs) {
                Some(transition) => {
                    self.transitioned(transition);
                    if let Err(err) = self.fire_due(t) {
                        return StepOutcome::Fail(err);
                    }
                }
                None => debug!(t, mode = ?self.machine.state(), "crossing held by chatter guard"),
            }
        }
        StepOutcome::from_result(self.record(RowKind::Event, t, y))
    }

    fn on_accepted_step(&mut self, step: &AcceptedStep<'_>) -> Step<M, S> {
        if let Some(window) = self.window {
            if let Err(err) = self.history.push(step.t, step.y) {
                return StepOutcome::Fail(Fault::History(err));
            }
            self.history.trim_before(step.t - window);
        }

        let progress = Progress {
            t: step.t,
            t_final: self.t_final,
        };
        let stop = matches!(self.observer.observe(&progress), Some(Action::StopEarly));

        if step.is_output || stop {
            let kind = if step.is_output {
                RowKind::Print
            } else {
                RowKind::Event
            };
            if let Err(err) = self.record(kind, step.t, step.y) {
                return StepOutcome::Fail(err);
            }
        }

        if stop {
            info!(t = step.t, "run stopped by observer");
            StepOutcome::Stop(StopReason::Observer)
        } else {
            StepOutcome::Continue
        }
    }
}
