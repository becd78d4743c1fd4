use hybrid_core::{
    AcceptedStep, Crossing, EventInfo, HybridSystem, IntegrationError, IntegrationSummary, Span,
    StepOutcome, Termination, Tolerances,
};

/// A single accepted step proposed by a [`Stepper`].
#[derive(Debug, Clone)]
pub(super) struct Step {
    /// Size of the step taken; never larger than the limit passed in.
    pub(super) h: f64,

    /// State at `t + h`.
    pub(super) y: Vec<f64>,

    /// Attempts rejected before this step was accepted.
    pub(super) rejected: usize,
}

/// Takes one step of at most `h_limit` from `(t, y)` with derivative `f`.
pub(super) trait Stepper {
    fn attempt<S: HybridSystem>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64],
        f: &[f64],
        h_limit: f64,
        tolerances: &Tolerances,
    ) -> Result<Step, IntegrationError<S::Error>>;

    /// Called after a discontinuity so adaptive steppers can start small.
    fn restart(&mut self) {}
}

/// Running counters and callback state shared by the integration loop.
struct Run<'s, S: HybridSystem> {
    system: &'s mut S,
    t: f64,
    y: Vec<f64>,
    f: Vec<f64>,
    g: Vec<f64>,
    steps: usize,
    rejected: usize,
    events: usize,
}

impl<S: HybridSystem> Run<'_, S> {
    fn refresh(&mut self) -> Result<(), IntegrationError<S::Error>> {
        self.system
            .rhs(self.t, &self.y, &mut self.f)
            .map_err(IntegrationError::System)?;
        self.system
            .state_events(self.t, &self.y, &mut self.g)
            .map_err(IntegrationError::System)
    }

    fn summary(&self, termination: Termination) -> IntegrationSummary {
        IntegrationSummary {
            t_end: self.t,
            steps: self.steps,
            rejected: self.rejected,
            events: self.events,
            termination,
        }
    }

    /// Issues an event callback and re-evaluates derivatives afterwards.
    fn fire(
        &mut self,
        crossings: &[Crossing],
        time_event: bool,
    ) -> Result<Option<Termination>, IntegrationError<S::Error>> {
        self.events += 1;
        let info = EventInfo {
            state_events: crossings,
            time_event,
        };
        let outcome = self.system.on_event(self.t, &self.y, &info);
        if let Some(termination) = settle(outcome)? {
            return Ok(Some(termination));
        }
        self.refresh()?;
        Ok(None)
    }
}

fn settle<E>(outcome: StepOutcome<E>) -> Result<Option<Termination>, IntegrationError<E>> {
    match outcome {
        StepOutcome::Continue => Ok(None),
        StepOutcome::Stop(reason) => Ok(Some(Termination::Stopped(reason))),
        StepOutcome::Fail(error) => Err(IntegrationError::System(error)),
    }
}

/// Relative tolerance for treating two times as equal.
fn time_tolerance(t: f64) -> f64 {
    1e-12 * t.abs().max(1.0)
}

/// Integrates `system` over `span` using `stepper` for individual steps.
#[allow(clippy::float_cmp)]
pub(super) fn drive<S, T>(
    system: &mut S,
    span: &Span,
    tolerances: &Tolerances,
    y0: &[f64],
    stepper: &mut T,
) -> Result<IntegrationSummary, IntegrationError<S::Error>>
where
    S: HybridSystem,
    T: Stepper,
{
    if !span.is_valid() || !tolerances.is_valid() {
        return Err(IntegrationError::InvalidSpan);
    }
    let n = system.dimension();
    if y0.len() != n {
        return Err(IntegrationError::DimensionMismatch {
            expected: n,
            actual: y0.len(),
        });
    }
    let m = system.num_indicators();

    let mut run = Run {
        system,
        t: span.t0,
        y: y0.to_vec(),
        f: vec![0.0; n],
        g: vec![0.0; m],
        steps: 0,
        rejected: 0,
        events: 0,
    };
    run.refresh()?;

    let no_crossings = vec![Crossing::None; m];

    // A time event due at the start is handled before the first step.
    if let Some(te) = run.system.time_events(run.t)
        && te <= run.t + time_tolerance(run.t)
    {
        if let Some(termination) = run.fire(&no_crossings, true)? {
            return Ok(run.summary(termination));
        }
        stepper.restart();
    }

    let mut next_print = span.next_print_after(run.t);
    let mut g_new = vec![0.0; m];
    let mut crossings = vec![Crossing::None; m];

    while span.t_final - run.t > time_tolerance(span.t_final) {
        let time_event = run
            .system
            .time_events(run.t)
            .filter(|&te| te > run.t + time_tolerance(run.t));

        let target = time_event.map_or(span.t_final, |te| te.min(span.t_final)).min(next_print);
        let to_target = target - run.t;
        let h_limit = run
            .system
            .max_step()
            .filter(|&cap| cap > 0.0)
            .map_or(to_target, |cap| cap.min(to_target));

        let step = stepper.attempt(&*run.system, run.t, &run.y, &run.f, h_limit, tolerances)?;
        run.rejected += step.rejected;
        run.steps += 1;

        // A remainder shorter than the time tolerance is absorbed into the step.
        let lands = to_target - step.h <= time_tolerance(target);
        run.t = if lands { target } else { run.t + step.h };
        run.y = step.y;

        run.system
            .rhs(run.t, &run.y, &mut run.f)
            .map_err(IntegrationError::System)?;
        run.system
            .state_events(run.t, &run.y, &mut g_new)
            .map_err(IntegrationError::System)?;

        for ((c, &before), &after) in crossings.iter_mut().zip(&run.g).zip(&g_new) {
            *c = Crossing::between(before, after);
        }
        run.g.copy_from_slice(&g_new);

        let hit_time_event = lands && time_event == Some(target);
        if hit_time_event || crossings.iter().any(|c| !c.is_none()) {
            if let Some(termination) = run.fire(&crossings, hit_time_event)? {
                return Ok(run.summary(termination));
            }
            stepper.restart();
        }

        let is_output = lands && (target == next_print || target == span.t_final);
        if lands && target == next_print {
            next_print = span.next_print_after(run.t);
        }

        let accepted = AcceptedStep {
            t: run.t,
            y: &run.y,
            h: step.h,
            is_output,
        };
        if let Some(termination) = settle(run.system.on_accepted_step(&accepted))? {
            return Ok(run.summary(termination));
        }
    }

    Ok(run.summary(Termination::Completed))
}
