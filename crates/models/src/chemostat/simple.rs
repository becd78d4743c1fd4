use std::convert::Infallible;

use hybrid_core::{NoController, StateMut, StateRef, StateVariable, StateVector};
use hybrid_engine::{HybridModel, Past};
use serde::{Deserialize, Serialize};

use super::{Dilution, Monod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChemostatVar {
    Substrate,
    Biomass,
}

impl StateVariable for ChemostatVar {
    const ALL: &'static [Self] = &[Self::Substrate, Self::Biomass];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::Substrate => "S",
            Self::Biomass => "X",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChemostatParameters {
    pub growth: Monod,

    /// Substrate concentration of the feed.
    pub s_in: f64,

    /// Biomass concentration of the feed.
    pub x_in: f64,

    /// Yield coefficient.
    pub gamma: f64,
}

impl Default for ChemostatParameters {
    fn default() -> Self {
        Self {
            growth: Monod { m: 3.0, k: 3.67 },
            s_in: 2.2,
            x_in: 0.0,
            gamma: 1.0,
        }
    }
}

/// Single-substrate chemostat:
///
/// ```text
/// S' = D (S_in - S) - mu(S) X / gamma
/// X' = D (X_in - X) + mu(S) X
/// ```
///
/// The dilution rate `D` is changed by [`Dilution`] events and recorded as
/// the auxiliary column `D`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chemostat {
    pub parameters: ChemostatParameters,
    dilution: f64,
}

impl Chemostat {
    #[must_use]
    pub fn new(parameters: ChemostatParameters, dilution: f64) -> Self {
        Self {
            parameters,
            dilution,
        }
    }

    #[must_use]
    pub fn dilution(&self) -> f64 {
        self.dilution
    }

    #[must_use]
    pub fn state(substrate: f64, biomass: f64) -> StateVector<ChemostatVar> {
        StateVector::from_fn(|var| match var {
            ChemostatVar::Substrate => substrate,
            ChemostatVar::Biomass => biomass,
        })
    }

    /// Steady state for the current dilution rate with a sterile feed.
    ///
    /// Returns the washout point `(S_in, 0)` when the biomass cannot outgrow
    /// the dilution, and `None` if the feed carries biomass.
    #[must_use]
    pub fn equilibrium(&self) -> Option<StateVector<ChemostatVar>> {
        let ChemostatParameters {
            growth,
            s_in,
            x_in,
            gamma,
        } = self.parameters;
        if x_in != 0.0 {
            return None;
        }
        let d = self.dilution;
        if d >= growth.rate(s_in) {
            return Some(Self::state(s_in, 0.0));
        }
        let s = growth.k * d / (growth.m - d);
        Some(Self::state(s, gamma * (s_in - s)))
    }
}

impl HybridModel for Chemostat {
    type Var = ChemostatVar;
    type Controller = NoController<()>;
    type Parameter = Dilution;
    type Error = Infallible;

    fn controller(&self) -> NoController<()> {
        NoController::new()
    }

    fn controller_inputs(&self, _t: f64, _y: StateRef<'_, ChemostatVar>) {}

    fn rhs(
        &self,
        _t: f64,
        y: StateRef<'_, ChemostatVar>,
        _mode: &(),
        _past: &Past<'_, ChemostatVar>,
        mut dy: StateMut<'_, ChemostatVar>,
    ) -> Result<(), Infallible> {
        let ChemostatParameters {
            growth,
            s_in,
            x_in,
            gamma,
        } = self.parameters;
        let d = self.dilution;
        let s = y[ChemostatVar::Substrate];
        let x = y[ChemostatVar::Biomass];
        let mu = growth.rate(s);

        dy[ChemostatVar::Substrate] = d * (s_in - s) - mu * x / gamma;
        dy[ChemostatVar::Biomass] = d * (x_in - x) + mu * x;
        Ok(())
    }

    fn apply(&mut self, _t: f64, parameter: &Dilution) {
        self.dilution = parameter.0;
    }

    fn auxiliary_names(&self) -> Vec<&'static str> {
        vec!["D"]
    }

    fn auxiliary(&self, _t: f64, _y: StateRef<'_, ChemostatVar>, _mode: &()) -> Vec<f64> {
        vec![self.dilution]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hybrid_core::DelayHistory;

    fn derivative(chemostat: &Chemostat, y: &StateVector<ChemostatVar>) -> StateVector<ChemostatVar> {
        let history = DelayHistory::new(ChemostatVar::dimension());
        let mut dy = StateVector::zeros();
        chemostat
            .rhs(0.0, y.view(), &(), &Past::new(&history), dy.view_mut())
            .unwrap();
        dy
    }

    #[test]
    fn equilibrium_is_a_fixed_point() {
        let chemostat = Chemostat::new(ChemostatParameters::default(), 0.1);
        let y = chemostat.equilibrium().unwrap();
        assert!(y[ChemostatVar::Biomass] > 0.0);

        let dy = derivative(&chemostat, &y);
        assert_relative_eq!(dy[ChemostatVar::Substrate], 0.0, epsilon = 1e-12);
        assert_relative_eq!(dy[ChemostatVar::Biomass], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn fast_dilution_washes_out() {
        let chemostat = Chemostat::new(ChemostatParameters::default(), 2.0);
        let y = chemostat.equilibrium().unwrap();
        assert_relative_eq!(y[ChemostatVar::Substrate], 2.2);
        assert_relative_eq!(y[ChemostatVar::Biomass], 0.0);
    }

    #[test]
    fn batch_culture_consumes_substrate() {
        let chemostat = Chemostat::new(ChemostatParameters::default(), 0.0);
        let dy = derivative(&chemostat, &Chemostat::state(1.0, 0.5));
        assert!(dy[ChemostatVar::Substrate] < 0.0);
        assert_relative_eq!(dy[ChemostatVar::Biomass], -dy[ChemostatVar::Substrate]);
    }

    #[test]
    fn dilution_events_update_the_auxiliary_column() {
        let mut chemostat = Chemostat::new(ChemostatParameters::default(), 0.0);
        chemostat.apply(10.0, &Dilution(0.15));
        assert_eq!(chemostat.auxiliary_names(), ["D"]);
        assert_eq!(
            chemostat.auxiliary(10.0, Chemostat::state(0.0, 0.0).view(), &()),
            [0.15]
        );
    }
}
