use hybrid_core::Tolerances;
use hybrid_solvers::integrator::{ImplicitEuler, implicit_euler};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine settings loaded from TOML.
///
/// Every field has a default, so an empty document is a valid config.
///
/// ```
/// use hybrid_engine::EngineConfig;
///
/// let config = EngineConfig::from_toml_str(
///     r#"
///     record_spacing = 0.01
///
///     [tolerances]
///     atol = 1e-8
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.tolerances.atol, 1e-8);
/// assert_eq!(config.tolerances.rtol, 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerances: Tolerances,

    /// Events due within this absolute time of the current time fire together.
    pub time_event_epsilon: f64,

    /// An event row closer than this to a neighboring row merges with it.
    /// Print rows are always kept.
    pub record_spacing: f64,

    pub integrator: IntegratorConfig,
}

/// Settings of the implicit Euler integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub initial_step: f64,
    pub min_step: f64,

    /// Unbounded when absent.
    pub max_step: Option<f64>,

    pub max_newton_iters: usize,
    pub newton_tolerance: f64,
}

/// Runtime settings used by [`SimulationEngine`](crate::SimulationEngine).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub time_event_epsilon: f64,
    pub record_spacing: f64,
}

/// Errors that can occur when loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tolerances must be finite, non-negative, and not both zero")]
    Tolerances,

    #[error("time_event_epsilon must be finite and non-negative")]
    TimeEventEpsilon,

    #[error("record_spacing must be finite and non-negative")]
    RecordSpacing,

    #[error("invalid integrator settings: {0}")]
    Integrator(#[from] implicit_euler::ConfigError),

    #[error("failed to parse engine config")]
    Parse(#[from] toml::de::Error),
}

impl Default for EngineConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            tolerances: Tolerances::default(),
            time_event_epsilon: settings.time_event_epsilon,
            record_spacing: settings.record_spacing,
            integrator: IntegratorConfig::default(),
        }
    }
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            initial_step: 1e-3,
            min_step: 1e-12,
            max_step: None,
            max_newton_iters: 8,
            newton_tolerance: 0.1,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_event_epsilon: 1e-6,
            record_spacing: 1e-3,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a config from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or any setting is invalid.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every setting, including the integrator's.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerances.is_valid() {
            return Err(ConfigError::Tolerances);
        }
        if !(self.time_event_epsilon.is_finite() && self.time_event_epsilon >= 0.0) {
            return Err(ConfigError::TimeEventEpsilon);
        }
        if !(self.record_spacing.is_finite() && self.record_spacing >= 0.0) {
            return Err(ConfigError::RecordSpacing);
        }
        self.integrator.build()?;
        Ok(())
    }

    /// Builds the configured integrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the integrator settings are invalid.
    pub fn integrator(&self) -> Result<ImplicitEuler, ConfigError> {
        Ok(ImplicitEuler::new(self.integrator.build()?))
    }

    /// Returns the engine's runtime settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            time_event_epsilon: self.time_event_epsilon,
            record_spacing: self.record_spacing,
        }
    }
}

impl IntegratorConfig {
    fn build(&self) -> Result<implicit_euler::Config, implicit_euler::ConfigError> {
        implicit_euler::Config::new(
            self.initial_step,
            self.min_step,
            self.max_step.unwrap_or(f64::INFINITY),
            self.max_newton_iters,
            self.newton_tolerance,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_relative_eq!(config.time_event_epsilon, 1e-6);
        assert_relative_eq!(config.record_spacing, 1e-3);
        assert_eq!(config.integrator.max_step, None);
    }

    #[test]
    fn reads_integrator_section() {
        let config = EngineConfig::from_toml_str(
            r"
            time_event_epsilon = 1e-9

            [integrator]
            initial_step = 0.01
            max_step = 0.5
            max_newton_iters = 4
            ",
        )
        .unwrap();

        assert_relative_eq!(config.time_event_epsilon, 1e-9);
        assert_eq!(config.integrator.max_step, Some(0.5));
        let integrator = config.integrator().unwrap();
        assert_relative_eq!(integrator.config().max_step(), 0.5);
        assert_eq!(integrator.config().max_newton_iters(), 4);
    }

    #[test]
    fn rejects_invalid_values() {
        let config = EngineConfig {
            record_spacing: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::RecordSpacing)));

        let config = EngineConfig {
            tolerances: Tolerances {
                atol: 0.0,
                rtol: 0.0,
            },
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Tolerances)));

        let result = EngineConfig::from_toml_str(
            r"
            [integrator]
            initial_step = 1e-15
            ",
        );
        assert!(matches!(result, Err(ConfigError::Integrator(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("time_event_epsilon = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
