use std::{fmt::Debug, marker::PhantomData};

use crate::TimeEvent;

/// Discrete control logic with a closed set of states.
///
/// Each state owns a fixed tuple of outputs assigned on entry, and a signed
/// indicator whose sign becomes non-positive exactly when the state must be
/// left. [`ControllerStateMachine`] tracks the indicator between accepted
/// integration steps and performs transitions through this trait.
pub trait Controller {
    /// The closed set of controller states.
    type State: Copy + Eq + Debug;

    /// Values read from the continuous state to evaluate the indicator.
    type Inputs;

    /// Parameters visible to the physical model.
    type Outputs: Clone + Debug;

    /// Time-event payload understood by this controller.
    type Event;

    /// Returns the outputs assigned when `state` is entered.
    fn outputs_on_entry(&self, state: Self::State) -> Self::Outputs;

    /// Returns the transition indicator for `state`.
    ///
    /// A positive value means the state is still valid; the sign becomes
    /// negative exactly at the trigger condition.
    fn indicator(&self, state: Self::State, inputs: &Self::Inputs) -> f64;

    /// Decides the state to enter after an indicator crossing.
    ///
    /// Returns `None` when the crossing does not satisfy the guarded
    /// threshold, which keeps the current state. A held crossing is not
    /// retried; the state is only reconsidered after the indicator turns
    /// positive and falls again.
    fn next_state(&self, state: Self::State, inputs: &Self::Inputs) -> Option<Self::State>;

    /// Decides the state forced by a time event, if any.
    fn on_time_event(&self, _state: Self::State, _event: &Self::Event) -> Option<Self::State> {
        None
    }

    /// Exit actions run when leaving `from` for `to` at time `t`.
    ///
    /// Returned events are inserted into the engine's time-event registry,
    /// which is how a transition schedules a future forced transition.
    fn on_exit(&self, _from: Self::State, _to: Self::State, _t: f64) -> Vec<TimeEvent<Self::Event>> {
        Vec::new()
    }
}

/// A completed controller transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, E> {
    /// Time at which the transition happened.
    pub at: f64,

    /// State that was left.
    pub from: S,

    /// State that was entered.
    pub to: S,

    /// Time events scheduled by the exit actions.
    pub scheduled: Vec<TimeEvent<E>>,
}

/// Tracks a [`Controller`]'s current state and detects indicator crossings.
///
/// The machine remembers the indicator value from the previous accepted step.
/// A crossing from positive to non-positive calls [`make_transition`], which
/// runs exit actions, assigns the new state, and assigns the entry outputs.
/// After any transition the indicator is re-baselined against the new state,
/// so two evaluations at the same threshold cannot trigger twice.
///
/// [`make_transition`]: ControllerStateMachine::make_transition
#[derive(Debug, Clone)]
pub struct ControllerStateMachine<C: Controller> {
    controller: C,
    state: C::State,
    outputs: C::Outputs,
    last_indicator: Option<f64>,
    transitions: usize,
}

impl<C: Controller> ControllerStateMachine<C> {
    /// Creates a machine in `initial`, applying its entry outputs.
    pub fn new(controller: C, initial: C::State) -> Self {
        let outputs = controller.outputs_on_entry(initial);
        Self {
            controller,
            state: initial,
            outputs,
            last_indicator: None,
            transitions: 0,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> C::State {
        self.state
    }

    /// Returns the outputs assigned on entry to the current state.
    pub fn outputs(&self) -> &C::Outputs {
        &self.outputs
    }

    /// Returns the wrapped controller.
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Returns the number of transitions made so far.
    pub fn transitions(&self) -> usize {
        self.transitions
    }

    /// Evaluates the indicator for the current state.
    pub fn indicator(&self, inputs: &C::Inputs) -> f64 {
        self.controller.indicator(self.state, inputs)
    }

    /// Records `inputs` as the new baseline without checking for a crossing.
    pub fn rebaseline(&mut self, inputs: &C::Inputs) {
        self.last_indicator = Some(self.indicator(inputs));
    }

    /// Compares the indicator against the previous baseline and transitions
    /// if it crossed into non-positive values.
    ///
    /// The first call only establishes the baseline.
    pub fn observe(&mut self, t: f64, inputs: &C::Inputs) -> Option<Transition<C::State, C::Event>> {
        let current = self.indicator(inputs);
        let crossed = matches!(self.last_indicator, Some(prev) if prev > 0.0 && current <= 0.0);
        self.last_indicator = Some(current);

        if crossed {
            self.make_transition(t, inputs)
        } else {
            None
        }
    }

    /// Moves to the state chosen by [`Controller::next_state`].
    ///
    /// Returns `None` when the chatter guard keeps the current state.
    pub fn make_transition(
        &mut self,
        t: f64,
        inputs: &C::Inputs,
    ) -> Option<Transition<C::State, C::Event>> {
        let next = self.controller.next_state(self.state, inputs)?;
        let transition = self.enter(next, t);
        self.rebaseline(inputs);
        Some(transition)
    }

    /// Applies a time event, forcing a transition if the controller maps it
    /// to a state.
    ///
    /// The indicator baseline is cleared, so the next [`observe`] call only
    /// re-establishes it.
    ///
    /// [`observe`]: ControllerStateMachine::observe
    pub fn process_time_event(
        &mut self,
        t: f64,
        event: &C::Event,
    ) -> Option<Transition<C::State, C::Event>> {
        let next = self.controller.on_time_event(self.state, event)?;
        let transition = self.enter(next, t);
        self.last_indicator = None;
        Some(transition)
    }

    fn enter(&mut self, next: C::State, t: f64) -> Transition<C::State, C::Event> {
        let from = self.state;
        let scheduled = self.controller.on_exit(from, next, t);
        self.state = next;
        self.outputs = self.controller.outputs_on_entry(next);
        self.transitions += 1;
        Transition {
            at: t,
            from,
            to: next,
            scheduled,
        }
    }
}

/// A controller with a single state that never transitions.
///
/// Use `NoController` for models without discrete modes. The event type is
/// left generic so it can match the model's time-event payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoController<E>(PhantomData<E>);

impl<E> NoController<E> {
    /// Creates a new no-op controller.
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Controller for NoController<E> {
    type State = ();
    type Inputs = ();
    type Outputs = ();
    type Event = E;

    fn outputs_on_entry(&self, _state: ()) {}

    fn indicator(&self, _state: (), _inputs: &()) -> f64 {
        1.0
    }

    fn next_state(&self, _state: (), _inputs: &()) -> Option<()> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    /// Heater that switches off above a limit and back on below a floor.
    struct Heater {
        low: f64,
        high: f64,
        rel_tol: f64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        On,
        Off,
        Locked,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Unlock,
    }

    impl Controller for Heater {
        type State = Mode;
        type Inputs = f64;
        type Outputs = f64;
        type Event = Event;

        fn outputs_on_entry(&self, state: Mode) -> f64 {
            match state {
                Mode::On => 1.0,
                Mode::Off | Mode::Locked => 0.0,
            }
        }

        fn indicator(&self, state: Mode, temperature: &f64) -> f64 {
            match state {
                Mode::On => self.high - temperature,
                Mode::Off => temperature - self.low,
                Mode::Locked => 1.0,
            }
        }

        fn next_state(&self, state: Mode, temperature: &f64) -> Option<Mode> {
            match state {
                Mode::On if *temperature > (1.0 - self.rel_tol) * self.high => Some(Mode::Locked),
                Mode::Off if *temperature < (1.0 + self.rel_tol) * self.low => Some(Mode::On),
                _ => None,
            }
        }

        fn on_time_event(&self, _state: Mode, event: &Event) -> Option<Mode> {
            match event {
                Event::Unlock => Some(Mode::Off),
            }
        }

        fn on_exit(&self, from: Mode, to: Mode, t: f64) -> Vec<TimeEvent<Event>> {
            if from == Mode::On && to == Mode::Locked {
                vec![TimeEvent::new(t + 5.0, Event::Unlock, "unlock")]
            } else {
                Vec::new()
            }
        }
    }

    fn heater() -> Heater {
        Heater {
            low: 10.0,
            high: 20.0,
            rel_tol: 1e-10,
        }
    }

    #[test]
    fn entry_outputs_are_applied_on_construction() {
        let machine = ControllerStateMachine::new(heater(), Mode::On);
        assert_relative_eq!(*machine.outputs(), 1.0);
    }

    #[test]
    fn first_observation_only_sets_baseline() {
        let mut machine = ControllerStateMachine::new(heater(), Mode::On);
        assert!(machine.observe(0.0, &25.0).is_none());
        assert_eq!(machine.state(), Mode::On);
    }

    #[test]
    fn crossing_transitions_and_schedules_events() {
        let mut machine = ControllerStateMachine::new(heater(), Mode::On);
        assert!(machine.observe(0.0, &15.0).is_none());

        let transition = machine.observe(1.0, &20.0).expect("should transition");
        assert_eq!(transition.from, Mode::On);
        assert_eq!(transition.to, Mode::Locked);
        assert_eq!(transition.scheduled.len(), 1);
        assert_relative_eq!(transition.scheduled[0].fires_at, 6.0);
        assert_relative_eq!(*machine.outputs(), 0.0);
    }

    #[test]
    fn repeated_threshold_evaluations_transition_once() {
        let mut machine = ControllerStateMachine::new(heater(), Mode::On);
        machine.rebaseline(&19.0);

        let first = machine.observe(1.0, &20.0);
        let second = machine.observe(1.0, &20.0);

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(machine.transitions(), 1);
    }

    #[test]
    fn chatter_guard_rejects_crossing_short_of_threshold() {
        let mut machine = ControllerStateMachine::new(heater(), Mode::On);
        // Below the guarded threshold the crossing is not honored.
        let inputs = 20.0 * (1.0 - 1e-9);
        assert!(machine.make_transition(0.0, &inputs).is_none());
        assert_eq!(machine.state(), Mode::On);
    }

    #[test]
    fn time_event_forces_transition() {
        let mut machine = ControllerStateMachine::new(heater(), Mode::Locked);
        let transition = machine
            .process_time_event(6.0, &Event::Unlock)
            .expect("should force");
        assert_eq!(transition.to, Mode::Off);
        assert_eq!(machine.state(), Mode::Off);
    }

    #[test]
    fn no_controller_never_transitions() {
        let mut machine = ControllerStateMachine::new(NoController::<()>::new(), ());
        assert!(machine.observe(0.0, &()).is_none());
        assert!(machine.observe(1.0, &()).is_none());
        assert!(machine.process_time_event(2.0, &()).is_none());
    }
}
