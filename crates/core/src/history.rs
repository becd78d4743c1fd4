use thiserror::Error;

/// Errors raised when building a [`DelayHistory`].
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum HistoryError {
    #[error("sample has {actual} values, history dimension is {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("sample time {t} is before the last stored time {last}")]
    NonMonotonic { t: f64, last: f64 },

    #[error("sample time is not finite")]
    NonFinite,
}

/// Past trajectory used to evaluate delayed terms `y(t - tau)`.
///
/// Samples are stored in increasing time order and interpolated linearly.
/// Before the first sample the optional static prefix is returned, and when
/// no prefix is set the first sample is held constant. After the last sample
/// the last value is held.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayHistory {
    dimension: usize,
    prefix: Option<Vec<f64>>,
    times: Vec<f64>,
    values: Vec<f64>,
}

impl DelayHistory {
    /// Creates an empty history for vectors of `dimension` values.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            prefix: None,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Creates a history whose value before the first sample is `prefix`.
    #[must_use]
    pub fn with_static(prefix: Vec<f64>) -> Self {
        Self {
            dimension: prefix.len(),
            prefix: Some(prefix),
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the number of stored samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns true if no samples are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Returns the time of the last stored sample.
    #[must_use]
    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// Returns the last stored sample.
    #[must_use]
    pub fn last(&self) -> Option<&[f64]> {
        let n = self.times.len();
        (n > 0).then(|| self.row(n - 1))
    }

    /// Appends a sample.
    ///
    /// A sample at the same time as the last one replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample has the wrong dimension, its time is
    /// not finite, or it is earlier than the last stored sample.
    pub fn push(&mut self, t: f64, y: &[f64]) -> Result<(), HistoryError> {
        if y.len() != self.dimension {
            return Err(HistoryError::Dimension {
                expected: self.dimension,
                actual: y.len(),
            });
        }
        if !t.is_finite() {
            return Err(HistoryError::NonFinite);
        }
        match self.times.last() {
            Some(&last) if t < last => return Err(HistoryError::NonMonotonic { t, last }),
            #[allow(clippy::float_cmp)]
            Some(&last) if t == last => {
                let start = self.values.len() - self.dimension;
                self.values[start..].copy_from_slice(y);
                return Ok(());
            }
            _ => {}
        }
        self.times.push(t);
        self.values.extend_from_slice(y);
        Ok(())
    }

    /// Returns component `index` evaluated at time `t`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the history dimension.
    #[must_use]
    pub fn value(&self, t: f64, index: usize) -> f64 {
        assert!(index < self.dimension, "history index out of range");

        let Some(&first) = self.times.first() else {
            return self.prefix.as_ref().map_or(0.0, |p| p[index]);
        };
        if t < first {
            return match &self.prefix {
                Some(prefix) => prefix[index],
                None => self.values[index],
            };
        }

        let n = self.times.len();
        let upper = self.times.partition_point(|&s| s <= t);
        if upper >= n {
            return self.row(n - 1)[index];
        }

        let lower = upper - 1;
        let (t0, t1) = (self.times[lower], self.times[upper]);
        let (y0, y1) = (self.row(lower)[index], self.row(upper)[index]);
        y0 + (y1 - y0) * (t - t0) / (t1 - t0)
    }

    /// Returns the full vector evaluated at time `t`.
    #[must_use]
    pub fn at(&self, t: f64) -> Vec<f64> {
        (0..self.dimension).map(|i| self.value(t, i)).collect()
    }

    /// Drops samples that are no longer needed to evaluate times `>= t`.
    ///
    /// The last sample before `t` is kept so interpolation at `t` stays exact.
    pub fn trim_before(&mut self, t: f64) {
        let keep_from = self.times.partition_point(|&s| s <= t).saturating_sub(1);
        if keep_from > 0 {
            self.times.drain(..keep_from);
            self.values.drain(..keep_from * self.dimension);
        }
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.dimension..(i + 1) * self.dimension]
    }
}
