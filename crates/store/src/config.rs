use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location and layout of a dataset group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory that holds every dataset group.
    pub root: PathBuf,

    /// Name of the dataset group below `root`.
    pub group: String,

    /// Template for run names; `{index}` or `{index:0N}` is replaced by the
    /// run's family index. Names stay inside the group directory, so path
    /// separators and `..` are rejected.
    pub family_template: String,

    /// Rows buffered in memory before a flush to the raw file.
    pub chunk_size: usize,
}

/// Errors that can occur when loading or validating a [`StoreConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("family template `{template}` must contain `{{index}}` or `{{index:0N}}`")]
    InvalidTemplate { template: String },

    #[error("group name must be a non-empty single path component")]
    InvalidGroup,

    #[error("chunk_size must be at least 1")]
    ChunkSize,

    #[error("failed to parse store config")]
    Parse(#[from] toml::de::Error),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("results"),
            group: "cycles".to_string(),
            family_template: "simulation_{index:04}".to_string(),
            chunk_size: 10_000,
        }
    }
}

impl StoreConfig {
    /// Creates a config with default template and chunk size.
    pub fn new(root: impl Into<PathBuf>, group: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            group: group.into(),
            ..Self::default()
        }
    }

    /// Sets the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the family template.
    #[must_use]
    pub fn with_family_template(mut self, template: impl Into<String>) -> Self {
        self.family_template = template.into();
        self
    }

    /// Parses and validates a config from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or the config is invalid.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the group name, the chunk size, and the family template.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut components = Path::new(&self.group).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !single {
            return Err(ConfigError::InvalidGroup);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ChunkSize);
        }
        family_name(&self.family_template, 0).map(|_| ())
    }

    /// Returns the directory of the dataset group.
    #[must_use]
    pub fn group_dir(&self) -> PathBuf {
        self.root.join(&self.group)
    }
}

/// Instantiates `template` with `index`.
pub(crate) fn family_name(template: &str, index: u64) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidTemplate {
        template: template.to_string(),
    };

    if template.contains(['/', '\\']) || template.contains("..") {
        return Err(invalid());
    }

    let start = template.find("{index").ok_or_else(invalid)?;
    let rest = &template[start + "{index".len()..];
    let end = rest.find('}').ok_or_else(invalid)?;
    let format = &rest[..end];
    let suffix = &rest[end + 1..];

    let width = match format.strip_prefix(":0") {
        None if format.is_empty() => 0,
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<usize>().map_err(|_| invalid())?
        }
        _ => return Err(invalid()),
    };
    if suffix.contains('{') || suffix.contains('}') || template[..start].contains('}') {
        return Err(invalid());
    }

    Ok(format!("{}{index:0width$}{suffix}", &template[..start]))
}
