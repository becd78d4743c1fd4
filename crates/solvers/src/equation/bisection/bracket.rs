use thiserror::Error;

/// Errors raised when a bisection bracket is rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BracketError {
    #[error("non-finite endpoint(s)")]
    NonFinite,

    #[error("zero width")]
    ZeroWidth,

    #[error("residuals at both endpoints have the same sign")]
    NoSignChange,
}

/// The sign of a residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Residual is positive (or zero).
    Positive,
    Negative,
}

impl Sign {
    /// Returns the sign of a residual value.
    #[must_use]
    pub fn of(value: f64) -> Self {
        if value >= 0.0 {
            Sign::Positive
        } else {
            Sign::Negative
        }
    }
}

/// Ordered interval known to contain a sign change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Bracket {
    left: f64,
    right: f64,
    left_sign: Sign,
}

impl Bracket {
    /// Validates and orders raw endpoints.
    pub(super) fn bounds(bracket: [f64; 2]) -> Result<[f64; 2], BracketError> {
        let [a, b] = bracket;
        if !a.is_finite() || !b.is_finite() {
            return Err(BracketError::NonFinite);
        }
        #[allow(clippy::float_cmp)]
        if a == b {
            return Err(BracketError::ZeroWidth);
        }
        Ok(if a < b { [a, b] } else { [b, a] })
    }

    /// Creates a bracket from ordered bounds and endpoint residual signs.
    pub(super) fn new(
        [left, right]: [f64; 2],
        left_sign: Sign,
        right_sign: Sign,
    ) -> Result<Self, BracketError> {
        if left_sign == right_sign {
            return Err(BracketError::NoSignChange);
        }
        Ok(Self {
            left,
            right,
            left_sign,
        })
    }

    pub(super) fn as_array(&self) -> [f64; 2] {
        [self.left, self.right]
    }

    pub(super) fn midpoint(&self) -> f64 {
        0.5 * (self.left + self.right)
    }

    pub(super) fn is_x_converged(&self, x_abs_tol: f64, x_rel_tol: f64) -> bool {
        self.right - self.left <= x_abs_tol + x_rel_tol * self.midpoint().abs()
    }

    /// Replaces the endpoint whose residual shares `sign`.
    pub(super) fn shrink(&mut self, x: f64, sign: Sign) {
        if sign == self.left_sign {
            self.left = x;
        } else {
            self.right = x;
        }
    }
}
