use hybrid_core::Observer;
use hybrid_engine::{Action, Progress, extremum_seeking};
use tracing::info;

/// Logs progress through `tracing` at a fixed simulated-time cadence.
///
/// The first event is always reported, then the first event at or after
/// each multiple of `interval`. A non-positive interval reports every event.
/// `ProgressLog` never requests an action.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    interval: f64,
    label: &'static str,
    next: Option<f64>,
    reports: usize,
}

impl ProgressLog {
    #[must_use]
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            label: "simulation",
            next: None,
            reports: 0,
        }
    }

    /// Sets the `run` field attached to every report.
    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Number of reports emitted so far.
    #[must_use]
    pub fn reports(&self) -> usize {
        self.reports
    }

    fn due(&mut self, t: f64) -> bool {
        if self.next.is_some_and(|next| t < next) {
            return false;
        }
        self.next = (self.interval > 0.0 && self.interval.is_finite())
            .then(|| ((t / self.interval).floor() + 1.0) * self.interval);
        self.reports += 1;
        true
    }
}

impl Observer<Progress, Action> for ProgressLog {
    fn observe(&mut self, event: &Progress) -> Option<Action> {
        if self.due(event.t) {
            info!(run = self.label, t = event.t, t_final = event.t_final, "progress");
        }
        None
    }
}

impl Observer<extremum_seeking::Event, extremum_seeking::Action> for ProgressLog {
    fn observe(&mut self, event: &extremum_seeking::Event) -> Option<extremum_seeking::Action> {
        if self.due(event.t) {
            info!(
                run = self.label,
                segment = event.segment,
                t = event.t,
                d = event.d,
                q = event.reading.q,
                distance = event.reading.distance,
                stage = event.stage.label(),
                "progress"
            );
        }
        None
    }
}
