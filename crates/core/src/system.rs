/// Direction in which a state-event indicator changed sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Crossing {
    /// No sign change since the previous accepted step.
    #[default]
    None,

    /// The indicator moved from non-positive to positive.
    Rising,

    /// The indicator moved from positive to non-positive.
    Falling,
}

impl Crossing {
    /// Classifies the change from `previous` to `current`.
    #[must_use]
    pub fn between(previous: f64, current: f64) -> Self {
        if previous > 0.0 && current <= 0.0 {
            Self::Falling
        } else if previous <= 0.0 && current > 0.0 {
            Self::Rising
        } else {
            Self::None
        }
    }

    /// Returns true for [`Crossing::None`].
    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

/// Why a run stopped before reaching its final time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// An observer asked the run to stop.
    Observer,

    /// The model or driver requested termination.
    Requested(String),
}

/// Result of a step or event callback.
///
/// Replaces exception-based control flow: stopping is an ordinary value, and
/// only genuine failures carry an error.
#[derive(Debug)]
pub enum StepOutcome<E> {
    Continue,
    Stop(StopReason),
    Fail(E),
}

impl<E> StepOutcome<E> {
    /// Converts a `Result` into `Continue` or `Fail`.
    pub fn from_result(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(error) => Self::Fail(error),
        }
    }
}

/// An accepted integration step handed to [`HybridSystem::on_accepted_step`].
#[derive(Debug, Clone, Copy)]
pub struct AcceptedStep<'a> {
    /// Time at the end of the step.
    pub t: f64,

    /// State at the end of the step.
    pub y: &'a [f64],

    /// Size of the step just taken.
    pub h: f64,

    /// True when `t` is a requested print point or the final time.
    pub is_output: bool,
}

/// Events located at the end of an accepted step.
#[derive(Debug, Clone, Copy)]
pub struct EventInfo<'a> {
    /// Crossing direction per state-event indicator.
    pub state_events: &'a [Crossing],

    /// True when a scheduled time event was reached.
    pub time_event: bool,
}

impl EventInfo<'_> {
    /// Returns true if any indicator crossed.
    #[must_use]
    pub fn has_state_event(&self) -> bool {
        self.state_events.iter().any(|c| !c.is_none())
    }
}

/// Callback contract between an integrator and whatever drives it.
///
/// The integrator owns the stepping loop and calls back into the system for
/// derivatives, event indicators, the next scheduled discontinuity, and
/// notifications of accepted steps and located events. Implementations may
/// mutate their own parameters in `on_event`; the integrator re-evaluates the
/// derivative afterwards.
pub trait HybridSystem {
    type Error;

    /// Number of continuous state variables.
    fn dimension(&self) -> usize;

    /// Number of state-event indicators.
    fn num_indicators(&self) -> usize {
        0
    }

    /// Writes `dy/dt` at `(t, y)` into `dy`.
    ///
    /// # Errors
    ///
    /// Returns an error when the state is outside the model's valid domain.
    /// Such errors end the integration.
    fn rhs(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<(), Self::Error>;

    /// Writes the state-event indicators at `(t, y)` into `out`.
    ///
    /// # Errors
    ///
    /// Returns an error when the indicators cannot be evaluated.
    fn state_events(&self, _t: f64, _y: &[f64], _out: &mut [f64]) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Upper bound on the step size, such as the shortest delay of a delay
    /// equation.
    fn max_step(&self) -> Option<f64> {
        None
    }

    /// Returns the next time the integrator must land on exactly, if any.
    ///
    /// Called with the current time before each step.
    fn time_events(&mut self, _t: f64) -> Option<f64> {
        None
    }

    /// Called once per accepted step, after any events at that step.
    fn on_accepted_step(&mut self, step: &AcceptedStep<'_>) -> StepOutcome<Self::Error>;

    /// Called when a state event or time event is located at `t`.
    fn on_event(&mut self, _t: f64, _y: &[f64], _info: &EventInfo<'_>) -> StepOutcome<Self::Error> {
        StepOutcome::Continue
    }
}
