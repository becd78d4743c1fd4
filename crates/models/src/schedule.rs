//! Piecewise-constant parameter schedules.

use hybrid_core::TimeEvent;
use serde::Deserialize;
use thiserror::Error;

/// A table of `(duration, value)` rows holding each value for its duration.
///
/// Row 0 is the initial value. Every later row takes effect at the sum of the
/// durations before it, which is where [`time_events`](Schedule::time_events)
/// places one event per row. After the last row its value is held.
///
/// # Examples
///
/// ```
/// use hybrid_models::schedule::Schedule;
///
/// let schedule = Schedule::new([(10.0, 0.0), (10.0, 0.1), (10.0, 0.05)]).unwrap();
///
/// assert_eq!(schedule.initial(), &0.0);
/// assert_eq!(schedule.value_at(15.0), &0.1);
/// assert_eq!(schedule.value_at(100.0), &0.05);
///
/// let events = schedule.time_events(0.0, |d| *d);
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[1].fires_at, 20.0);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<(f64, V)>")]
pub struct Schedule<V> {
    rows: Vec<(f64, V)>,
    starts: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ScheduleError {
    #[error("schedule has no rows")]
    Empty,

    #[error("row {row} has an invalid duration {duration}")]
    Duration { row: usize, duration: f64 },
}

impl<V> Schedule<V> {
    /// Creates a schedule from `(duration, value)` rows.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no rows or a duration is negative or not
    /// finite.
    pub fn new<I>(rows: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = (f64, V)>,
    {
        let rows: Vec<_> = rows.into_iter().collect();
        if rows.is_empty() {
            return Err(ScheduleError::Empty);
        }

        let mut starts = Vec::with_capacity(rows.len());
        let mut start = 0.0;
        for (row, &(duration, _)) in rows.iter().enumerate() {
            if !duration.is_finite() || duration < 0.0 {
                return Err(ScheduleError::Duration { row, duration });
            }
            starts.push(start);
            start += duration;
        }

        Ok(Self { rows, starts })
    }

    /// Returns the value in effect at the start.
    #[must_use]
    pub fn initial(&self) -> &V {
        &self.rows[0].1
    }

    /// Returns the rows in order.
    #[must_use]
    pub fn rows(&self) -> &[(f64, V)] {
        &self.rows
    }

    /// Sum of all durations.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.rows.iter().map(|(duration, _)| duration).sum()
    }

    /// Returns the value in effect at `t`, measured from the schedule start.
    ///
    /// A row takes effect at its start, so `t` on a boundary returns the later
    /// row.
    #[must_use]
    pub fn value_at(&self, t: f64) -> &V {
        let index = self.starts.partition_point(|&start| start <= t);
        &self.rows[index.saturating_sub(1)].1
    }

    /// One time event per row after the first, offset by `t0`.
    pub fn time_events<P, F>(&self, t0: f64, mut payload: F) -> Vec<TimeEvent<P>>
    where
        F: FnMut(&V) -> P,
    {
        self.rows
            .iter()
            .zip(&self.starts)
            .enumerate()
            .skip(1)
            .map(|(row, ((_, value), start))| {
                TimeEvent::new(t0 + start, payload(value), format!("schedule row {row}"))
            })
            .collect()
    }
}

impl<V> TryFrom<Vec<(f64, V)>> for Schedule<V> {
    type Error = ScheduleError;

    fn try_from(rows: Vec<(f64, V)>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}
