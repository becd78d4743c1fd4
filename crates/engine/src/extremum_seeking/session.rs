use hybrid_solvers::optimization::golden_section::INV_PHI;
use tracing::debug;

use super::Config;

/// Step of the search table.
///
/// Stages marked as probes wait for a trusted reading at the current input;
/// the others run immediately after the step that chained into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Probe at the starting point.
    I0,
    /// First probe one step away.
    I1,
    /// Probe after reversing direction.
    I2,
    /// Exponential steps until the output drops.
    I3,
    /// Bracket closed.
    II,
    /// Place both golden-section points.
    II0,
    /// Probe at the left golden point.
    II1P0,
    /// Probe at the right golden point.
    II1Q0,
    /// Discard the worse half of the bracket.
    II2,
    /// Check the width and pick the next probe.
    II3,
    /// Probe at the new left point.
    II3P1,
    /// Probe at the new right point.
    II3Q1,
    /// Shift the new points into place.
    II31,
    /// Probe at the reported maximizer.
    III,
}

impl Stage {
    /// Label used in logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::I0 => "I.0",
            Self::I1 => "I.1",
            Self::I2 => "I.2",
            Self::I3 => "I.3",
            Self::II => "II",
            Self::II0 => "II.0",
            Self::II1P0 => "II.1.p0",
            Self::II1Q0 => "II.1.q0",
            Self::II2 => "II.2",
            Self::II3 => "II.3",
            Self::II3P1 => "II.3.p1",
            Self::II3Q1 => "II.3.q1",
            Self::II31 => "II.3.1",
            Self::III => "III",
        }
    }

    /// Returns true for stages that consume a reading.
    #[must_use]
    pub fn is_probe(self) -> bool {
        matches!(
            self,
            Self::I0
                | Self::I1
                | Self::I2
                | Self::I3
                | Self::II1P0
                | Self::II1Q0
                | Self::II3P1
                | Self::II3Q1
                | Self::III
        )
    }
}

/// What a stage asks for after running.
enum Next {
    /// Wait for a reading at the new input.
    Probe(Stage),
    /// Run the stage right away.
    Chain(Stage),
}

/// Stage I bookkeeping: the last three probes and the step.
#[derive(Debug, Clone, Copy)]
struct Bracketing {
    h: f64,
    sigma: f64,
    d0: f64,
    q0: f64,
    d1: f64,
    q1: f64,
}

/// Stage II bookkeeping: the outer bracket and both interior points, for the
/// current (`0`) and next (`1`) iteration.
#[derive(Debug, Clone, Copy)]
struct Golden {
    lo0: f64,
    hi0: f64,
    lo1: f64,
    hi1: f64,
    width: f64,
    d_p0: f64,
    q_p0: f64,
    d_q0: f64,
    q_q0: f64,
    d_p1: f64,
    q_p1: f64,
    d_q1: f64,
    q_q1: f64,
}

/// The extremum-seeking state machine.
///
/// Feed one trusted reading at a time to [`step`](Session::step); read the
/// next input to hold with [`input`](Session::input). Every input is clamped
/// into `[d_min, d_max]`.
#[derive(Debug, Clone)]
pub struct Session {
    d_min: f64,
    d_max: f64,
    eps: f64,
    d: f64,
    stage: Stage,
    bracketing: Bracketing,
    golden: Golden,
    found: Option<(f64, f64)>,
}

impl Session {
    /// Starts at the midpoint of the configured range.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            d_min: config.d_min,
            d_max: config.d_max,
            eps: config.eps,
            d: config.midpoint(),
            stage: Stage::I0,
            bracketing: Bracketing {
                h: config.h,
                sigma: 1.0,
                d0: f64::NAN,
                q0: f64::NAN,
                d1: f64::NAN,
                q1: f64::NAN,
            },
            golden: Golden {
                lo0: f64::NAN,
                hi0: f64::NAN,
                lo1: f64::NAN,
                hi1: f64::NAN,
                width: f64::NAN,
                d_p0: f64::NAN,
                q_p0: f64::NAN,
                d_q0: f64::NAN,
                q_q0: f64::NAN,
                d_p1: f64::NAN,
                q_p1: f64::NAN,
                d_q1: f64::NAN,
                q_q1: f64::NAN,
            },
            found: None,
        }
    }

    /// Input to hold until the next reading.
    #[must_use]
    pub fn input(&self) -> f64 {
        self.d
    }

    /// Stage waiting for the next reading.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        self.found.is_some()
    }

    /// The maximizer and its output, once found.
    #[must_use]
    pub fn result(&self) -> Option<(f64, f64)> {
        self.found
    }

    /// Consumes a trusted reading `q` taken at [`input`](Session::input).
    ///
    /// Runs the waiting stage and every stage it chains into, stopping at the
    /// next probe. Does nothing once the maximizer is found.
    pub fn step(&mut self, q: f64) {
        if self.found.is_some() {
            return;
        }
        let mut stage = self.stage;
        loop {
            let next = self.run(stage, q);
            debug!(stage = stage.label(), d = self.d, q, "extremum seeking step");
            match next {
                Next::Chain(chained) => stage = chained,
                Next::Probe(probe) => {
                    self.stage = probe;
                    break;
                }
            }
        }
        self.d = self.d.clamp(self.d_min, self.d_max);
    }

    fn run(&mut self, stage: Stage, q: f64) -> Next {
        let d = self.d;
        let b = &mut self.bracketing;
        let g = &mut self.golden;
        match stage {
            Stage::I0 => {
                b.d0 = d;
                b.q0 = q;
                b.sigma = 1.0;
                self.d = b.d0 + b.h;
                Next::Probe(Stage::I1)
            }
            Stage::I1 => {
                b.d1 = d;
                b.q1 = q;
                if b.q1 > b.q0 {
                    b.h *= 2.0;
                    self.d = b.d1 + b.sigma * b.h;
                    Next::Probe(Stage::I3)
                } else {
                    b.sigma = -1.0;
                    self.d = b.d0 + b.sigma * b.h;
                    Next::Probe(Stage::I2)
                }
            }
            Stage::I2 => {
                b.d1 = d;
                b.q1 = q;
                if b.q1 > b.q0 {
                    b.h *= 2.0;
                    self.d = b.d1 + b.sigma * b.h;
                    Next::Probe(Stage::I3)
                } else {
                    b.h /= 2.0;
                    if b.h <= self.eps / 2.0 {
                        self.d = b.d0;
                        Next::Probe(Stage::III)
                    } else {
                        b.sigma = 1.0;
                        self.d = b.d0 + b.sigma * b.h;
                        Next::Probe(Stage::I1)
                    }
                }
            }
            Stage::I3 => {
                let (d2, q2) = (d, q);
                if q2 <= b.q1 {
                    g.lo0 = b.d0.min(d2);
                    g.hi0 = b.d0.max(d2);
                    Next::Chain(Stage::II)
                } else {
                    b.d0 = b.d1;
                    b.q0 = b.q1;
                    b.d1 = d2;
                    b.q1 = q2;
                    b.h *= 2.0;
                    self.d = b.d1 + b.sigma * b.h;
                    Next::Probe(Stage::I3)
                }
            }
            Stage::II => {
                g.width = g.hi0 - g.lo0;
                Next::Chain(Stage::II0)
            }
            Stage::II0 => {
                let offset = (1.0 - INV_PHI) * g.width;
                g.d_p0 = g.lo0 + offset;
                g.d_q0 = g.hi0 - offset;
                self.d = g.d_p0;
                Next::Probe(Stage::II1P0)
            }
            Stage::II1P0 => {
                g.d_p0 = d;
                g.q_p0 = q;
                self.d = g.d_q0;
                Next::Probe(Stage::II1Q0)
            }
            Stage::II1Q0 => {
                g.d_q0 = d;
                g.q_q0 = q;
                Next::Chain(Stage::II2)
            }
            Stage::II2 => {
                let inner = g.d_q0 - g.d_p0;
                if g.q_p0 > g.q_q0 {
                    g.lo1 = g.lo0;
                    g.hi1 = g.d_q0;
                    g.d_p1 = g.lo1 + inner;
                    g.d_q1 = g.d_p0;
                    g.q_q1 = g.q_p0;
                } else {
                    g.lo1 = g.d_p0;
                    g.hi1 = g.hi0;
                    g.d_p1 = g.d_q0;
                    g.q_p1 = g.q_q0;
                    g.d_q1 = g.hi1 - inner;
                }
                g.width = g.hi1 - g.lo1;
                Next::Chain(Stage::II3)
            }
            Stage::II3 => {
                if g.width <= self.eps {
                    self.d = 0.5 * (g.lo1 + g.hi1);
                    Next::Probe(Stage::III)
                } else if g.d_p1 >= g.d_q1 {
                    // Interior points crossed; restart on the shrunk bracket.
                    g.lo0 = g.lo1;
                    g.hi0 = g.hi1;
                    Next::Chain(Stage::II0)
                } else if g.q_p0 > g.q_q0 {
                    self.d = g.d_p1;
                    Next::Probe(Stage::II3P1)
                } else {
                    self.d = g.d_q1;
                    Next::Probe(Stage::II3Q1)
                }
            }
            Stage::II3P1 => {
                g.d_p1 = d;
                g.q_p1 = q;
                Next::Chain(Stage::II31)
            }
            Stage::II3Q1 => {
                g.d_q1 = d;
                g.q_q1 = q;
                Next::Chain(Stage::II31)
            }
            Stage::II31 => {
                g.d_p0 = g.d_p1;
                g.d_q0 = g.d_q1;
                g.lo0 = g.lo1;
                g.hi0 = g.hi1;
                g.q_p0 = g.q_p1;
                g.q_q0 = g.q_q1;
                Next::Chain(Stage::II2)
            }
            Stage::III => {
                self.found = Some((d, q));
                Next::Probe(Stage::III)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn session(d_min: f64, d_max: f64, h: f64) -> Session {
        let config = Config::new(d_min, d_max, 1e-3, h).unwrap();
        Session::new(&config)
    }

    #[test]
    fn starts_at_midpoint_and_probes_forward() {
        let mut s = session(0.0, 1.0, 0.1);
        assert_relative_eq!(s.input(), 0.5);
        assert_eq!(s.stage(), Stage::I0);

        s.step(1.0);
        assert_eq!(s.stage(), Stage::I1);
        assert_relative_eq!(s.input(), 0.6);
    }

    #[test]
    fn worse_first_probe_reverses_direction() {
        let mut s = session(0.0, 1.0, 0.1);
        s.step(1.0);
        s.step(0.5);
        assert_eq!(s.stage(), Stage::I2);
        assert_relative_eq!(s.input(), 0.4);
    }

    #[test]
    fn improvement_doubles_the_step() {
        let mut s = session(0.0, 1.0, 0.1);
        s.step(1.0);
        s.step(2.0);
        assert_eq!(s.stage(), Stage::I3);
        assert_relative_eq!(s.input(), 0.8);

        s.step(3.0);
        assert_eq!(s.stage(), Stage::I3);
        assert_relative_eq!(s.input(), 1.0);
    }

    #[test]
    fn closing_the_bracket_moves_to_golden_points() {
        let mut s = session(0.0, 1.0, 0.1);
        s.step(1.0); // d = 0.5
        s.step(2.0); // d = 0.6
        s.step(1.5); // d = 0.8, bracket [0.5, 0.8]

        assert_eq!(s.stage(), Stage::II1P0);
        assert_relative_eq!(s.input(), 0.5 + (1.0 - INV_PHI) * 0.3, epsilon = 1e-12);

        s.step(2.0);
        assert_eq!(s.stage(), Stage::II1Q0);
        assert_relative_eq!(s.input(), 0.8 - (1.0 - INV_PHI) * 0.3, epsilon = 1e-12);
    }

    #[test]
    fn input_is_clamped_to_range() {
        let mut s = session(0.0, 1.0, 0.4);
        s.step(1.0);
        assert_relative_eq!(s.input(), 0.9);
        s.step(2.0);
        assert_relative_eq!(s.input(), 1.0);
    }

    #[test]
    fn labels_follow_the_table() {
        assert_eq!(Stage::II1P0.label(), "II.1.p0");
        assert_eq!(Stage::II31.label(), "II.3.1");
        assert!(Stage::III.is_probe());
        assert!(!Stage::II2.is_probe());
    }
}
