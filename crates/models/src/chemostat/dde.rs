use std::convert::Infallible;

use hybrid_core::{
    EquationProblem, Model, NoController, OptimizationProblem, StateMut, StateRef, StateVariable,
    StateVector,
};
use hybrid_engine::{HybridModel, Past, extremum_seeking::Seekable};
use hybrid_solvers::{equation::bisection, optimization::golden_section};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{Dilution, Haldane, Monod};

/// State of the two-stage chemostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdeVar {
    /// Organic substrate.
    S1,

    /// Acidogenic biomass.
    X1,

    /// Volatile fatty acids.
    S2,

    /// Methanogenic biomass.
    X2,
}

impl StateVariable for DdeVar {
    const ALL: &'static [Self] = &[Self::S1, Self::X1, Self::S2, Self::X2];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::S1 => "s1",
            Self::X1 => "x1",
            Self::S2 => "s2",
            Self::X2 => "x2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdeParameters {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,

    /// Methane yield.
    pub k4: f64,
    pub s1_in: f64,
    pub s2_in: f64,

    /// Fraction of biomass leaving with the outflow.
    pub a: f64,
    pub mu1: Monod,
    pub mu2: Haldane,

    /// Growth delays.
    pub tau1: f64,
    pub tau2: f64,

    /// Constant state assumed before the start.
    pub history: [f64; 4],
}

impl Default for DdeParameters {
    fn default() -> Self {
        Self {
            k1: 10.53,
            k2: 28.6,
            k3: 1074.0,
            k4: 100.0,
            s1_in: 7.5,
            s2_in: 75.0,
            a: 0.5,
            mu1: Monod { m: 1.2, k: 7.1 },
            mu2: Haldane {
                m: 0.74,
                k: 9.28,
                k_i: 16.0,
            },
            tau1: 2.0,
            tau2: 7.0,
            history: [2.0, 0.1, 10.0, 0.05],
        }
    }
}

/// One point of [`ChemostatDde::equilibrium_sweep`].
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub d: f64,
    pub state: StateVector<DdeVar>,

    /// Methane flow at the equilibrium.
    pub q: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SweepError {
    #[error("sweep range [{d_min}, {d_max}] is empty or negative")]
    Range { d_min: f64, d_max: f64 },

    #[error("sweep step must be positive and finite, got {0}")]
    Step(f64),
}

/// Maximizer of the equilibrium methane flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Optimum {
    pub d: f64,
    pub q: f64,
}

/// Two-stage anaerobic digestion chemostat with growth delays:
///
/// ```text
/// s1' = D (s1_in - s1) - k1 mu1(s1) x1
/// x1' = exp(-a D tau1) mu1(s1(t - tau1)) x1(t - tau1) - a D x1
/// s2' = D (s2_in - s2) + k2 mu1(s1) x1 - k3 mu2(s2) x2
/// x2' = exp(-a D tau2) mu2(s2(t - tau2)) x2(t - tau2) - a D x2
/// ```
///
/// The output is the methane flow `Q = k4 mu2(s2) x2`. Recorded auxiliary
/// columns are `D` and `Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemostatDde {
    pub parameters: DdeParameters,
    dilution: f64,
}

impl ChemostatDde {
    #[must_use]
    pub fn new(parameters: DdeParameters, dilution: f64) -> Self {
        Self {
            parameters,
            dilution,
        }
    }

    #[must_use]
    pub fn dilution(&self) -> f64 {
        self.dilution
    }

    /// The constant pre-start state, used as the initial state.
    #[must_use]
    pub fn initial_state(&self) -> StateVector<DdeVar> {
        StateVector::from_fn(|var: DdeVar| self.parameters.history[var.index()])
    }

    /// Methane flow at `y`.
    #[must_use]
    pub fn methane_flow(&self, y: StateRef<'_, DdeVar>) -> f64 {
        let p = &self.parameters;
        p.k4 * p.mu2.rate(y[DdeVar::S2]) * y[DdeVar::X2]
    }

    /// Steady state for dilution rate `d`.
    ///
    /// `D == 0` gives the zero state. When the acidogenic stage cannot grow,
    /// `s1 = s1_in` and `x1 = 0`. When the methanogenic stage cannot grow,
    /// `x2 = 0` and `s2` carries all the acids produced upstream.
    #[must_use]
    pub fn equilibrium_at(&self, d: f64) -> StateVector<DdeVar> {
        let p = &self.parameters;
        if d == 0.0 {
            return StateVector::zeros();
        }
        let ad = p.a * d;

        let (s1, x1) = growth_root(&p.mu1, ad, p.tau1, [0.0, p.s1_in])
            .map(|s1| (s1, (-ad * p.tau1).exp() * (p.s1_in - s1) / (p.a * p.k1)))
            .filter(|&(_, x1)| x1 >= 0.0)
            .unwrap_or((p.s1_in, 0.0));

        let produced = p.k2 * p.mu1.rate(s1) * x1;
        let (s2, x2) = growth_root(&p.mu2, ad, p.tau2, [0.0, p.mu2.peak()])
            .map(|s2| (s2, ((p.s2_in - s2) * d + produced) / (p.k3 * p.mu2.rate(s2))))
            .filter(|&(s2, x2)| s2 >= 0.0 && x2 >= 0.0)
            .unwrap_or((p.s2_in + produced / d, 0.0));

        StateVector::from_fn(|var| match var {
            DdeVar::S1 => s1,
            DdeVar::X1 => x1,
            DdeVar::S2 => s2,
            DdeVar::X2 => x2,
        })
    }

    /// Methane flow at the equilibrium for `d`.
    #[must_use]
    pub fn equilibrium_flow(&self, d: f64) -> f64 {
        self.methane_flow(self.equilibrium_at(d).view())
    }

    /// Equilibria for `d_min, d_min + step, ...` up to `d_max`.
    ///
    /// The sweep ends after the first nonzero `d` whose methanogenic biomass
    /// is washed out, since every larger rate washes out as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty or negative, or the step is not
    /// positive.
    pub fn equilibrium_sweep(
        &self,
        d_min: f64,
        d_max: f64,
        step: f64,
    ) -> Result<Vec<SweepPoint>, SweepError> {
        if !(d_min >= 0.0 && d_min <= d_max && d_max.is_finite()) {
            return Err(SweepError::Range { d_min, d_max });
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(SweepError::Step(step));
        }

        let mut points = Vec::new();
        for i in 0_u32.. {
            let d = d_min + f64::from(i) * step;
            if d > d_max + 1e-9 * step {
                break;
            }
            let state = self.equilibrium_at(d);
            let q = self.methane_flow(state.view());
            let washed_out = d != 0.0 && state[DdeVar::X2] == 0.0;
            points.push(SweepPoint { d, state, q });
            if washed_out {
                debug!(d, "methanogens washed out, sweep stopped");
                break;
            }
        }
        Ok(points)
    }

    /// Dilution rate in `[d_min, d_max]` maximizing the equilibrium methane
    /// flow, by golden-section search.
    ///
    /// # Errors
    ///
    /// Returns an error if the bracket is not finite.
    pub fn optimum(&self, d_min: f64, d_max: f64) -> Result<Optimum, golden_section::Error> {
        let solution = golden_section::maximize_unobserved(
            &EquilibriumFlow(self),
            &FlowObjective,
            [d_min, d_max],
            &golden_section::Config::default(),
        )?;
        Ok(Optimum {
            d: solution.x,
            q: solution.objective,
        })
    }
}

/// Root of `a D - exp(-a D tau) mu(s)` in `bracket`, if the residual changes
/// sign there.
fn growth_root<M>(growth: &M, ad: f64, tau: f64, bracket: [f64; 2]) -> Option<f64>
where
    M: Model<Input = f64, Output = f64>,
{
    let balance = GrowthBalance {
        uptake: ad,
        survival: (-ad * tau).exp(),
    };
    bisection::solve_unobserved(growth, &balance, bracket, &bisection::Config::default())
        .ok()
        .map(|solution| solution.x)
}

/// Balance between washout and delayed growth at equilibrium.
struct GrowthBalance {
    uptake: f64,
    survival: f64,
}

impl EquationProblem<1> for GrowthBalance {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<f64, Infallible> {
        Ok(x[0])
    }

    fn residuals(&self, _s: &f64, mu: &f64) -> Result<[f64; 1], Infallible> {
        Ok([self.uptake - self.survival * mu])
    }
}

struct EquilibriumFlow<'a>(&'a ChemostatDde);

impl Model for EquilibriumFlow<'_> {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn call(&self, d: &f64) -> Result<f64, Infallible> {
        Ok(self.0.equilibrium_flow(*d))
    }
}

struct FlowObjective;

impl OptimizationProblem<1> for FlowObjective {
    type Input = f64;
    type Output = f64;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<f64, Infallible> {
        Ok(x[0])
    }

    fn objective(&self, _d: &f64, q: &f64) -> Result<f64, Infallible> {
        Ok(*q)
    }
}

impl HybridModel for ChemostatDde {
    type Var = DdeVar;
    type Controller = NoController<()>;
    type Parameter = Dilution;
    type Error = Infallible;

    fn controller(&self) -> NoController<()> {
        NoController::new()
    }

    fn controller_inputs(&self, _t: f64, _y: StateRef<'_, DdeVar>) {}

    fn rhs(
        &self,
        t: f64,
        y: StateRef<'_, DdeVar>,
        _mode: &(),
        past: &Past<'_, DdeVar>,
        mut dy: StateMut<'_, DdeVar>,
    ) -> Result<(), Infallible> {
        let p = &self.parameters;
        let d = self.dilution;
        let ad = p.a * d;

        let growth1 = p.mu1.rate(y[DdeVar::S1]) * y[DdeVar::X1];
        let growth2 = p.mu2.rate(y[DdeVar::S2]) * y[DdeVar::X2];
        let delayed1 =
            p.mu1.rate(past.value(t - p.tau1, DdeVar::S1)) * past.value(t - p.tau1, DdeVar::X1);
        let delayed2 =
            p.mu2.rate(past.value(t - p.tau2, DdeVar::S2)) * past.value(t - p.tau2, DdeVar::X2);

        dy[DdeVar::S1] = d * (p.s1_in - y[DdeVar::S1]) - p.k1 * growth1;
        dy[DdeVar::X1] = (-ad * p.tau1).exp() * delayed1 - ad * y[DdeVar::X1];
        dy[DdeVar::S2] = d * (p.s2_in - y[DdeVar::S2]) + p.k2 * growth1 - p.k3 * growth2;
        dy[DdeVar::X2] = (-ad * p.tau2).exp() * delayed2 - ad * y[DdeVar::X2];
        Ok(())
    }

    fn apply(&mut self, _t: f64, parameter: &Dilution) {
        self.dilution = parameter.0;
    }

    fn auxiliary_names(&self) -> Vec<&'static str> {
        vec!["D", "Q"]
    }

    fn auxiliary(&self, _t: f64, y: StateRef<'_, DdeVar>, _mode: &()) -> Vec<f64> {
        vec![self.dilution, self.methane_flow(y)]
    }

    fn delays(&self) -> Vec<f64> {
        vec![self.parameters.tau1, self.parameters.tau2]
    }

    fn history_window(&self) -> f64 {
        self.parameters.tau1.max(self.parameters.tau2) + 1.0
    }
}

impl Seekable for ChemostatDde {
    fn set_input(&mut self, d: f64) {
        self.dilution = d;
    }

    fn equilibrium(&self, d: f64) -> Option<StateVector<DdeVar>> {
        Some(self.equilibrium_at(d))
    }

    fn output(&self, y: StateRef<'_, DdeVar>) -> f64 {
        self.methane_flow(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hybrid_core::DelayHistory;

    fn chemostat(d: f64) -> ChemostatDde {
        ChemostatDde::new(DdeParameters::default(), d)
    }

    /// Derivative at `y` with a history frozen at `y`.
    fn derivative(chemostat: &ChemostatDde, y: &StateVector<DdeVar>) -> StateVector<DdeVar> {
        let history = DelayHistory::with_static(y.as_slice().to_vec());
        let mut dy = StateVector::zeros();
        chemostat
            .rhs(0.0, y.view(), &(), &Past::new(&history), dy.view_mut())
            .unwrap();
        dy
    }

    #[test]
    fn equilibrium_is_a_fixed_point() {
        for d in [0.1, 0.22, 0.3] {
            let chemostat = chemostat(d);
            let y = chemostat.equilibrium_at(d);
            assert!(y[DdeVar::X2] > 0.0, "d = {d}");

            let dy = derivative(&chemostat, &y);
            for var in DdeVar::ALL {
                assert_relative_eq!(dy[*var], 0.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn zero_delays_read_the_current_state() {
        let parameters = DdeParameters {
            tau1: 0.0,
            tau2: 0.0,
            ..DdeParameters::default()
        };
        let chemostat = ChemostatDde::new(parameters, 0.3);
        let y = chemostat.equilibrium_at(0.3);
        assert!(y[DdeVar::X2] > 0.0);

        // A washed-out past must not leak into undelayed growth terms.
        let history = DelayHistory::with_static(vec![0.0; 4]);
        let past = Past::new(&history).with_current(5.0, y.as_slice());
        let mut dy = StateVector::zeros();
        chemostat
            .rhs(5.0, y.view(), &(), &past, dy.view_mut())
            .unwrap();
        for var in DdeVar::ALL {
            assert_relative_eq!(dy[*var], 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn zero_dilution_gives_the_zero_state() {
        let y = chemostat(0.0).equilibrium_at(0.0);
        assert_eq!(y.as_slice(), [0.0; 4]);
    }

    #[test]
    fn fast_dilution_washes_out_methanogens() {
        let chemostat = chemostat(0.5);
        let y = chemostat.equilibrium_at(0.5);
        assert_relative_eq!(y[DdeVar::X2], 0.0);
        assert!(y[DdeVar::X1] > 0.0);

        // Acids leave at the rate they are produced.
        let dy = derivative(&chemostat, &y);
        assert_relative_eq!(dy[DdeVar::S2], 0.0, epsilon = 1e-8);
    }

    #[test]
    fn very_fast_dilution_washes_out_both_stages() {
        let p = DdeParameters::default();
        let y = chemostat(2.0).equilibrium_at(2.0);
        assert_relative_eq!(y[DdeVar::S1], p.s1_in);
        assert_relative_eq!(y[DdeVar::X1], 0.0);
        assert_relative_eq!(y[DdeVar::S2], p.s2_in);
        assert_relative_eq!(y[DdeVar::X2], 0.0);
    }

    #[test]
    fn sweep_stops_after_washout() {
        let points = chemostat(0.0).equilibrium_sweep(0.0, 1.0, 0.01).unwrap();

        assert_eq!(points.len(), 35);
        assert_relative_eq!(points[0].q, 0.0);
        let last = points.last().unwrap();
        assert_relative_eq!(last.d, 0.34, epsilon = 1e-12);
        assert_relative_eq!(last.state[DdeVar::X2], 0.0);
        assert!(points[33].state[DdeVar::X2] > 0.0);
    }

    #[test]
    fn sweep_rejects_bad_arguments() {
        let chemostat = chemostat(0.0);
        assert!(matches!(
            chemostat.equilibrium_sweep(0.5, 0.1, 0.01),
            Err(SweepError::Range { .. })
        ));
        assert_eq!(
            chemostat.equilibrium_sweep(0.0, 1.0, 0.0),
            Err(SweepError::Step(0.0))
        );
    }

    #[test]
    fn optimum_beats_every_swept_point() {
        let chemostat = chemostat(0.0);
        let optimum = chemostat.optimum(0.22, 0.33).unwrap();

        assert_relative_eq!(optimum.d, 0.2975, epsilon = 1e-3);
        assert_relative_eq!(optimum.q, 2.17, epsilon = 1e-3);

        let points = chemostat.equilibrium_sweep(0.22, 0.33, 0.005).unwrap();
        assert!(points.iter().all(|point| point.q <= optimum.q + 1e-12));
    }

    #[test]
    fn records_dilution_and_methane_flow() {
        let chemostat = chemostat(0.3);
        let y = chemostat.equilibrium_at(0.3);
        let aux = chemostat.auxiliary(0.0, y.view(), &());
        assert_eq!(chemostat.auxiliary_names(), ["D", "Q"]);
        assert_relative_eq!(aux[0], 0.3);
        assert_relative_eq!(aux[1], chemostat.output(y.view()));
        assert_relative_eq!(chemostat.history_window(), 8.0);
    }
}
