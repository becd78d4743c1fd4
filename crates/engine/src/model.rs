use std::{fmt::Debug, marker::PhantomData};

use hybrid_core::{Controller, DelayHistory, StateMut, StateRef, StateVariable};

/// Controller state of a model.
pub type Mode<M> = <<M as HybridModel>::Controller as Controller>::State;

/// Parameters the controller assigns on entry to a state.
pub type Outputs<M> = <<M as HybridModel>::Controller as Controller>::Outputs;

/// Values read from the continuous state to evaluate the controller.
pub type Inputs<M> = <<M as HybridModel>::Controller as Controller>::Inputs;

/// Time-event payload understood by a model's controller.
pub type ControllerEvent<M> = <<M as HybridModel>::Controller as Controller>::Event;

/// Payload of an event in the engine's time-event registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled<P, E> {
    /// A parameter change applied to the model.
    Parameter(P),

    /// A controller event that may force a transition.
    Controller(E),
}

/// A physical model with continuous state and a discrete controller.
///
/// The engine owns the model for the duration of a run. Parameter changes
/// arrive through [`apply`](HybridModel::apply); controller outputs are passed
/// to every right-hand-side evaluation.
pub trait HybridModel {
    /// Enum naming the continuous state variables.
    type Var: StateVariable;

    type Controller: Controller;

    /// Payload of scheduled parameter changes.
    type Parameter: Debug;

    /// Raised when the state leaves the model's valid domain.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the controller driving this model's discrete modes.
    fn controller(&self) -> Self::Controller;

    /// Extracts the controller inputs from the current state.
    fn controller_inputs(
        &self,
        t: f64,
        y: StateRef<'_, Self::Var>,
    ) -> <Self::Controller as Controller>::Inputs;

    /// Writes `dy/dt` at `(t, y)` given the controller outputs and the past
    /// trajectory.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is physically invalid.
    fn rhs(
        &self,
        t: f64,
        y: StateRef<'_, Self::Var>,
        mode: &<Self::Controller as Controller>::Outputs,
        past: &Past<'_, Self::Var>,
        dy: StateMut<'_, Self::Var>,
    ) -> Result<(), Self::Error>;

    /// Applies a scheduled parameter change at time `t`.
    fn apply(&mut self, _t: f64, _parameter: &Self::Parameter) {}

    /// Names of the auxiliary columns recorded after the state.
    fn auxiliary_names(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Values of the auxiliary columns at `(t, y)`.
    fn auxiliary(
        &self,
        _t: f64,
        _y: StateRef<'_, Self::Var>,
        _mode: &<Self::Controller as Controller>::Outputs,
    ) -> Vec<f64> {
        Vec::new()
    }

    /// Delays appearing in the right-hand side.
    ///
    /// A model with positive delays has its accepted steps kept in a
    /// history, and the step size is capped at the shortest of them. A zero
    /// delay reads the state being evaluated.
    fn delays(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Length of past trajectory to keep, at least the longest delay.
    fn history_window(&self) -> f64 {
        self.delays().into_iter().fold(0.0, f64::max)
    }
}

/// Read access to the past trajectory for delayed terms.
///
/// With [`with_current`](Past::with_current), queries past the last stored
/// sample interpolate toward the state being evaluated, and a zero delay
/// reads that state itself.
#[derive(Debug, Clone, Copy)]
pub struct Past<'a, V> {
    history: &'a DelayHistory,
    current: Option<(f64, &'a [f64])>,
    _marker: PhantomData<V>,
}

impl<'a, V: StateVariable> Past<'a, V> {
    #[must_use]
    pub fn new(history: &'a DelayHistory) -> Self {
        Self {
            history,
            current: None,
            _marker: PhantomData,
        }
    }

    /// Adds the state `y` at time `t` as the newest point of the trajectory.
    #[must_use]
    pub fn with_current(mut self, t: f64, y: &'a [f64]) -> Self {
        self.current = Some((t, y));
        self
    }

    /// Returns `var` at time `t`, typically `t_now - tau`.
    #[must_use]
    pub fn value(&self, t: f64, var: V) -> f64 {
        let index = var.index();
        let Some((t_now, y)) = self.current else {
            return self.history.value(t, index);
        };
        if t >= t_now {
            return y[index];
        }
        match (self.history.last_time(), self.history.last()) {
            (Some(last), Some(sample)) if t > last && t_now > last => {
                let fraction = (t - last) / (t_now - last);
                sample[index] + (y[index] - sample[index]) * fraction
            }
            _ => self.history.value(t, index),
        }
    }
}
