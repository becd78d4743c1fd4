use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings of an extremum-seeking search.
///
/// Loadable from TOML; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lower bound of the input range.
    pub d_min: f64,

    /// Upper bound of the input range.
    pub d_max: f64,

    /// Final bracket width.
    pub eps: f64,

    /// Initial Stage I step.
    pub h: f64,

    /// Largest distance from equilibrium at which a reading is trusted.
    pub eps_z: f64,

    /// Length of one plant segment.
    pub main_sim_step: f64,

    pub t_final: f64,

    /// Print cadence inside each segment.
    pub t_print: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("input range [{d_min}, {d_max}] is empty or not finite")]
    Range { d_min: f64, d_max: f64 },

    #[error("eps must be positive and finite, got {0}")]
    Eps(f64),

    #[error("step h must be positive and finite, got {0}")]
    Step(f64),

    #[error("eps_z must be non-negative, got {0}")]
    EpsZ(f64),

    #[error("segment length, final time, and print cadence must be positive and finite")]
    Horizon,
}

#[derive(Debug, Error)]
#[error("failed to parse extremum seeking config")]
pub struct ParseError(#[from] toml::de::Error);

impl Default for Config {
    fn default() -> Self {
        Self {
            d_min: 0.22,
            d_max: 0.33,
            eps: 0.001,
            h: 0.025,
            eps_z: 0.01,
            main_sim_step: 10.0,
            t_final: 5000.0,
            t_print: 0.1,
        }
    }
}

impl Config {
    /// Creates a config over `[d_min, d_max]` with the remaining defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the range, `eps`, or `h` is invalid.
    pub fn new(d_min: f64, d_max: f64, eps: f64, h: f64) -> Result<Self, ConfigError> {
        let config = Self {
            d_min,
            d_max,
            eps,
            h,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the segment length and final time.
    #[must_use]
    pub fn with_horizon(mut self, main_sim_step: f64, t_final: f64) -> Self {
        self.main_sim_step = main_sim_step;
        self.t_final = t_final;
        self
    }

    #[must_use]
    pub fn with_eps_z(mut self, eps_z: f64) -> Self {
        self.eps_z = eps_z;
        self
    }

    #[must_use]
    pub fn with_t_print(mut self, t_print: f64) -> Self {
        self.t_print = t_print;
        self
    }

    /// Parses a config from TOML without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, ParseError> {
        Ok(toml::from_str(s)?)
    }

    /// Midpoint of the input range, where the search starts.
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.d_min + self.d_max)
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.d_min.is_finite() && self.d_max.is_finite() && self.d_min < self.d_max) {
            return Err(ConfigError::Range {
                d_min: self.d_min,
                d_max: self.d_max,
            });
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ConfigError::Eps(self.eps));
        }
        if !(self.h.is_finite() && self.h > 0.0) {
            return Err(ConfigError::Step(self.h));
        }
        if self.eps_z.is_nan() || self.eps_z < 0.0 {
            return Err(ConfigError::EpsZ(self.eps_z));
        }
        let positive = |x: f64| x.is_finite() && x > 0.0;
        if !(positive(self.main_sim_step) && positive(self.t_print) && positive(self.t_final)) {
            return Err(ConfigError::Horizon);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn defaults_match_the_reference_search() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.midpoint(), 0.275);
        assert_relative_eq!(config.eps_z, 0.01);
        assert_relative_eq!(config.main_sim_step, 10.0);
    }

    #[test]
    fn parses_partial_toml() {
        let config = Config::from_toml_str(
            r"
            d_min = 0.0
            d_max = 1.0
            t_final = 200.0
            ",
        )
        .unwrap();
        assert_relative_eq!(config.d_max, 1.0);
        assert_relative_eq!(config.h, 0.025);
        assert_relative_eq!(config.t_final, 200.0);
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(matches!(
            Config::new(0.3, 0.2, 1e-3, 0.01),
            Err(ConfigError::Range { .. })
        ));
        assert!(matches!(
            Config::new(0.0, 1.0, 0.0, 0.01),
            Err(ConfigError::Eps(_))
        ));
        assert!(matches!(
            Config::new(0.0, 1.0, 1e-3, -1.0),
            Err(ConfigError::Step(_))
        ));
        let config = Config::default().with_horizon(0.0, 10.0);
        assert_eq!(config.validate(), Err(ConfigError::Horizon));
        let config = Config::default().with_eps_z(f64::NAN);
        assert!(matches!(config.validate(), Err(ConfigError::EpsZ(_))));
    }
}
