use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{StorageError, dataset::write_atomic};

pub(crate) const METADATA_FILE: &str = "group.json";

/// A finalized run recorded in the group metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEntry {
    /// Family index assigned when the run began.
    pub index: u64,

    /// Public dataset name.
    pub name: String,

    /// Number of rows in the finalized dataset.
    pub rows: u64,

    /// Column names in storage order.
    pub columns: Vec<String>,
}

/// Persisted group-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct GroupMetadata {
    pub(crate) family_template: String,
    pub(crate) num_results_so_far: u64,
    #[serde(default)]
    pub(crate) runs: Vec<RunEntry>,
}

impl GroupMetadata {
    /// Loads the metadata in `dir`, or `None` if the group is new.
    pub(crate) fn load(dir: &Path) -> Result<Option<Self>, StorageError> {
        let path = dir.join(METADATA_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Metadata { path, source })
    }

    pub(crate) fn save(&self, dir: &Path) -> Result<(), StorageError> {
        let path = dir.join(METADATA_FILE);
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| StorageError::Metadata {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)
    }

    pub(crate) fn find(&self, index: u64) -> Option<&RunEntry> {
        self.runs.iter().find(|run| run.index == index)
    }

    pub(crate) fn latest(&self) -> Option<&RunEntry> {
        self.runs.iter().max_by_key(|run| run.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_metadata_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(GroupMetadata::load(dir.path()).unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = GroupMetadata {
            family_template: "simulation_{index:04}".into(),
            num_results_so_far: 2,
            runs: vec![RunEntry {
                index: 2,
                name: "simulation_0002".into(),
                rows: 5,
                columns: vec!["t".into()],
            }],
        };
        metadata.save(dir.path()).unwrap();

        let loaded = GroupMetadata::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(loaded.latest().map(|r| r.index), Some(2));
        assert!(loaded.find(1).is_none());
    }

    #[test]
    fn garbage_metadata_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE), b"not json").unwrap();
        assert!(matches!(
            GroupMetadata::load(dir.path()),
            Err(StorageError::Metadata { .. })
        ));
    }
}
