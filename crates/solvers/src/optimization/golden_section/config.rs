use thiserror::Error;

/// Stopping rules for golden-section search.
///
/// The search stops once the interior bracket is narrower than
/// `x_abs_tol + x_rel_tol * |midpoint|`, or after `max_iters` shrinks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    x_abs_tol: f64,
    x_rel_tol: f64,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("x_abs_tol must be finite and non-negative")]
    XAbs,

    #[error("x_rel_tol must be finite and non-negative")]
    XRel,
}

impl Default for Config {
    /// Tight enough to locate an optimal dilution rate to machine precision.
    fn default() -> Self {
        Self {
            max_iters: 200,
            x_abs_tol: 1e-10,
            x_rel_tol: 1e-10,
        }
    }
}

impl Config {
    /// # Errors
    ///
    /// Returns an error if either tolerance is negative or not finite.
    pub fn new(max_iters: usize, x_abs_tol: f64, x_rel_tol: f64) -> Result<Self, ConfigError> {
        let valid = |tol: f64| tol.is_finite() && tol >= 0.0;
        match (valid(x_abs_tol), valid(x_rel_tol)) {
            (false, _) => Err(ConfigError::XAbs),
            (_, false) => Err(ConfigError::XRel),
            (true, true) => Ok(Self {
                max_iters,
                x_abs_tol,
                x_rel_tol,
            }),
        }
    }

    /// Returns the maximum number of shrink iterations.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns true if `[left, right]` is narrow enough to stop.
    #[must_use]
    pub fn is_narrow(&self, left: f64, right: f64) -> bool {
        let mid = 0.5 * (left + right);
        (right - left).abs() <= self.x_abs_tol + self.x_rel_tol * mid.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_tolerances() {
        assert_eq!(Config::new(10, -1.0, 0.0), Err(ConfigError::XAbs));
        assert_eq!(Config::new(10, 0.0, f64::NAN), Err(ConfigError::XRel));
    }

    #[test]
    fn narrowness_scales_with_the_midpoint() {
        let config = Config::new(10, 1e-3, 1e-2).unwrap();
        assert!(config.is_narrow(0.0, 1e-3));
        assert!(!config.is_narrow(0.0, 2e-3));
        assert!(config.is_narrow(100.0, 101.0));
        assert!(config.is_narrow(101.0, 100.0));
    }
}
