//! Append-only result storage for simulation runs.
//!
//! A [`ResultStore`] manages one dataset group on disk. Each run streams rows
//! into an in-memory buffer that is flushed to an uncompressed raw file one
//! chunk at a time. Finalizing a run compacts the raw rows into a compressed,
//! checksummed [`Dataset`] under the run's public name and deletes the raw
//! file. A family counter persisted in the group metadata gives every run a
//! unique name, so earlier runs are never overwritten.
//!
//! Only finalized datasets are visible to [`ResultStore::load_run`].
//!
//! # Example
//!
//! ```no_run
//! use hybrid_core::RecordSink;
//! use hybrid_store::{ResultStore, StoreConfig};
//!
//! # fn main() -> Result<(), hybrid_store::StorageError> {
//! let mut store = ResultStore::open(StoreConfig::new("results", "cycles"))?;
//! store.begin(&["t".to_string(), "x".to_string()])?;
//! store.append(&[0.0, 1.0])?;
//! store.finalize()?;
//!
//! let dataset = store.load_run(None)?;
//! dataset.export_flat("results/latest.csv")?;
//! # Ok(())
//! # }
//! ```

mod config;
mod dataset;
mod error;
mod metadata;
mod run;
mod store;

pub use config::{ConfigError, StoreConfig};
pub use dataset::Dataset;
pub use error::StorageError;
pub use metadata::RunEntry;
pub use store::ResultStore;
