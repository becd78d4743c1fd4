use thiserror::Error;

/// Destination for result rows produced by a simulation run.
///
/// A run calls `begin` once with the column names, `append` for each row,
/// and `finalize` exactly once, including on error paths, so partial results
/// stay readable.
pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Starts a run with the given column names.
    ///
    /// # Errors
    ///
    /// Returns an error if a run is already active or cannot be started.
    fn begin(&mut self, columns: &[String]) -> Result<(), Self::Error>;

    /// Appends one row whose width matches the columns passed to `begin`.
    ///
    /// # Errors
    ///
    /// Returns an error if no run is active or the row width is wrong.
    fn append(&mut self, row: &[f64]) -> Result<(), Self::Error>;

    /// Completes the active run.
    ///
    /// # Errors
    ///
    /// Returns an error if no run is active or the results cannot be persisted.
    fn finalize(&mut self) -> Result<(), Self::Error>;
}

impl<T: RecordSink + ?Sized> RecordSink for &mut T {
    type Error = T::Error;

    fn begin(&mut self, columns: &[String]) -> Result<(), Self::Error> {
        (**self).begin(columns)
    }

    fn append(&mut self, row: &[f64]) -> Result<(), Self::Error> {
        (**self).append(row)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        (**self).finalize()
    }
}

/// Errors returned by [`Trajectory`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrajectoryError {
    #[error("no run has been started")]
    NotStarted,

    #[error("row has {actual} values, expected {expected}")]
    RowWidth { expected: usize, actual: usize },
}

/// An in-memory [`RecordSink`].
///
/// Calling `begin` again starts over with new columns. `finalize` only marks
/// the trajectory as complete; rows remain readable either way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    columns: Vec<String>,
    values: Vec<f64>,
    started: bool,
    finalized: bool,
}

impl Trajectory {
    /// Creates an empty trajectory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.values.len() / self.columns.len()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once `finalize` has been called for the current run.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        let width = self.columns.len();
        (i < self.len()).then(|| &self.values[i * width..(i + 1) * width])
    }

    /// Iterates over all rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.columns.len().max(1))
    }

    /// Returns the last row.
    #[must_use]
    pub fn last(&self) -> Option<&[f64]> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }

    /// Returns the position of the named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns every value of the named column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.column_index(name)?;
        Some(self.rows().map(|row| row[index]).collect())
    }
}

impl RecordSink for Trajectory {
    type Error = TrajectoryError;

    fn begin(&mut self, columns: &[String]) -> Result<(), Self::Error> {
        self.columns = columns.to_vec();
        self.values.clear();
        self.started = true;
        self.finalized = false;
        Ok(())
    }

    fn append(&mut self, row: &[f64]) -> Result<(), Self::Error> {
        if !self.started {
            return Err(TrajectoryError::NotStarted);
        }
        if row.len() != self.columns.len() {
            return Err(TrajectoryError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.values.extend_from_slice(row);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        if !self.started {
            return Err(TrajectoryError::NotStarted);
        }
        self.finalized = true;
        Ok(())
    }
}
