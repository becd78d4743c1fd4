use std::{io, path::PathBuf};

use thiserror::Error;

use crate::ConfigError;

/// Errors returned by [`ResultStore`](crate::ResultStore) and
/// [`Dataset`](crate::Dataset).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid group metadata at {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset `{name}` already exists")]
    NameCollision { name: String },

    #[error("no run is active")]
    NoActiveRun,

    #[error("run `{name}` is still active")]
    RunAlreadyActive { name: String },

    #[error("row has {actual} values, expected {expected}")]
    RowWidth { expected: usize, actual: usize },

    #[error("a run needs at least one column")]
    NoColumns,

    #[error("column name {name:?} cannot appear in a CSV header")]
    InvalidColumn { name: String },

    #[error("no finalized run with index {index}")]
    UnknownRun { index: u64 },

    #[error("group has no finalized runs")]
    NoRuns,

    #[error("dataset {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid store config: {0}")]
    Config(#[from] ConfigError),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
