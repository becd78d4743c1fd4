use std::convert::Infallible;

use hybrid_core::Model;
use serde::{Deserialize, Serialize};

/// Monod growth `mu(s) = m s / (k + s)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Monod {
    /// Maximum specific growth rate.
    pub m: f64,

    /// Half saturation constant.
    pub k: f64,
}

impl Monod {
    #[must_use]
    pub fn rate(&self, s: f64) -> f64 {
        self.m * s / (self.k + s)
    }
}

impl Model for Monod {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn call(&self, s: &f64) -> Result<f64, Infallible> {
        Ok(self.rate(*s))
    }
}

/// Haldane growth with substrate inhibition,
/// `mu(s) = m s / (k + s + (s / k_i)^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Haldane {
    pub m: f64,
    pub k: f64,

    /// Inhibition constant.
    pub k_i: f64,
}

impl Haldane {
    #[must_use]
    pub fn rate(&self, s: f64) -> f64 {
        let inhibition = s / self.k_i;
        self.m * s / (self.k + s + inhibition * inhibition)
    }

    /// Substrate concentration of the peak rate, `k_i sqrt(k)`.
    #[must_use]
    pub fn peak(&self) -> f64 {
        self.k_i * self.k.sqrt()
    }
}

impl Model for Haldane {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn call(&self, s: &f64) -> Result<f64, Infallible> {
        Ok(self.rate(*s))
    }
}
