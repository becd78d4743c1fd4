use std::{fs, path::PathBuf};

use hybrid_core::RecordSink;
use tracing::{debug, info};

use crate::{
    Dataset, RunEntry, StorageError, StoreConfig,
    config::family_name,
    dataset::{DATASET_EXTENSION, encode, write_atomic},
    metadata::GroupMetadata,
    run::ActiveRun,
};

/// Append-only storage for the runs of one dataset group.
///
/// Opening the same group twice is harmless: an existing family counter is
/// kept, a missing one starts at zero. Each [`begin_run`] reserves the next
/// index, so run names never repeat within a group.
///
/// [`begin_run`]: ResultStore::begin_run
#[derive(Debug)]
pub struct ResultStore {
    dir: PathBuf,
    chunk_size: usize,
    metadata: GroupMetadata,
    active: Option<ActiveRun>,
    flushes: usize,
}

impl ResultStore {
    /// Opens or creates the dataset group described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the group directory cannot
    /// be created, or existing metadata cannot be read.
    pub fn open(config: StoreConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let dir = config.group_dir();
        fs::create_dir_all(&dir).map_err(StorageError::io(&dir))?;

        let metadata = match GroupMetadata::load(&dir)? {
            Some(existing) => {
                debug!(
                    group = ?dir,
                    runs = existing.num_results_so_far,
                    "opened existing dataset group"
                );
                existing
            }
            None => {
                let fresh = GroupMetadata {
                    family_template: config.family_template.clone(),
                    num_results_so_far: 0,
                    runs: Vec::new(),
                };
                fresh.save(&dir)?;
                debug!(group = ?dir, "created dataset group");
                fresh
            }
        };

        Ok(Self {
            dir,
            chunk_size: config.chunk_size,
            metadata,
            active: None,
            flushes: 0,
        })
    }

    /// Returns the group directory.
    #[must_use]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Returns the number of indices reserved so far.
    #[must_use]
    pub fn family_counter(&self) -> u64 {
        self.metadata.num_results_so_far
    }

    /// Returns the finalized runs in the order they were finalized.
    #[must_use]
    pub fn runs(&self) -> &[RunEntry] {
        &self.metadata.runs
    }

    /// Returns the name of the active run, if any.
    #[must_use]
    pub fn active_run(&self) -> Option<&str> {
        self.active.as_ref().map(|run| run.name.as_str())
    }

    /// Returns the number of buffer flushes performed by the current or last
    /// run.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Starts a new run with the given columns and returns its public name.
    ///
    /// The family counter is incremented and persisted before the raw file is
    /// created, so a failed or abandoned run never gives its index away.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RunAlreadyActive`] if a run has not been
    /// finalized, [`StorageError::InvalidColumn`] for a name that cannot
    /// appear in a flat export header, [`StorageError::NameCollision`] if
    /// the name is already taken, or an I/O error.
    pub fn begin_run(&mut self, columns: &[String]) -> Result<String, StorageError> {
        if let Some(active) = &self.active {
            return Err(StorageError::RunAlreadyActive {
                name: active.name.clone(),
            });
        }
        if columns.is_empty() {
            return Err(StorageError::NoColumns);
        }
        if let Some(name) = columns
            .iter()
            .find(|name| name.is_empty() || name.contains([',', '"', '\n', '\r']))
        {
            return Err(StorageError::InvalidColumn { name: name.clone() });
        }

        let index = self.metadata.num_results_so_far + 1;
        let name = family_name(&self.metadata.family_template, index)?;
        self.metadata.num_results_so_far = index;
        self.metadata.save(&self.dir)?;

        if self.metadata.runs.iter().any(|run| run.name == name)
            || self.dataset_path(&name).exists()
        {
            return Err(StorageError::NameCollision { name });
        }

        let run = ActiveRun::create(&self.dir, index, name.clone(), columns.to_vec(), self.chunk_size)?;
        info!(run = %name, index, columns = columns.len(), "run started");
        self.active = Some(run);
        self.flushes = 0;
        Ok(name)
    }

    /// Appends one row to the active run.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoActiveRun`] before [`begin_run`], a row
    /// width error, or an I/O error from a flush.
    ///
    /// [`begin_run`]: ResultStore::begin_run
    pub fn append_row(&mut self, row: &[f64]) -> Result<(), StorageError> {
        let run = self.active.as_mut().ok_or(StorageError::NoActiveRun)?;
        if run.append(row)? {
            self.flushes += 1;
            debug!(run = %run.name, rows = run.rows(), "flushed chunk");
        }
        Ok(())
    }

    /// Flushes remaining rows, compacts the run into a compressed dataset,
    /// and deletes the raw file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoActiveRun`] if no run is active, or an I/O
    /// error. The run is no longer active afterwards in either case.
    pub fn finish_run(&mut self) -> Result<RunEntry, StorageError> {
        let mut run = self.active.take().ok_or(StorageError::NoActiveRun)?;
        if run.flush()? {
            self.flushes += 1;
        }

        let values = run.read_flushed()?;
        let path = self.dataset_path(&run.name);
        if path.exists() {
            return Err(StorageError::NameCollision { name: run.name });
        }
        let bytes = encode(&run.columns, &values).map_err(StorageError::io(&path))?;
        write_atomic(&path, &bytes)?;

        let entry = RunEntry {
            index: run.index,
            name: run.name.clone(),
            rows: run.rows(),
            columns: run.columns.clone(),
        };
        run.remove()?;
        self.metadata.runs.push(entry.clone());
        self.metadata.save(&self.dir)?;

        info!(
            run = %entry.name,
            rows = entry.rows,
            flushes = self.flushes,
            bytes = bytes.len(),
            "run finalized"
        );
        Ok(entry)
    }

    /// Opens a finalized run, the latest one when `index` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownRun`] if no finalized run has `index`,
    /// [`StorageError::NoRuns`] if the group has none, or
    /// [`StorageError::Corrupt`] if the dataset fails its checks.
    pub fn load_run(&self, index: Option<u64>) -> Result<Dataset, StorageError> {
        let entry = match index {
            Some(index) => self
                .metadata
                .find(index)
                .ok_or(StorageError::UnknownRun { index })?,
            None => self.metadata.latest().ok_or(StorageError::NoRuns)?,
        };
        Dataset::read(&entry.name, entry.index, &self.dataset_path(&entry.name))
    }

    fn dataset_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{DATASET_EXTENSION}"))
    }
}

impl RecordSink for ResultStore {
    type Error = StorageError;

    fn begin(&mut self, columns: &[String]) -> Result<(), Self::Error> {
        self.begin_run(columns).map(|_| ())
    }

    fn append(&mut self, row: &[f64]) -> Result<(), Self::Error> {
        self.append_row(row)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        self.finish_run().map(|_| ())
    }
}
