/// The golden ratio: φ = (1 + √5) / 2
const PHI: f64 = 1.618_033_988_749_895;

/// The inverse golden ratio, which equals φ - 1.
pub const INV_PHI: f64 = PHI - 1.0;

/// Outer interval plus two interior points placed by the golden ratio.
///
/// Shrinking toward either side turns one interior point into the other, so
/// only one new evaluation is needed per iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoldenBracket {
    left: f64,
    right: f64,
    inner_left: f64,
    inner_right: f64,
}

impl GoldenBracket {
    /// Creates a bracket from bounds, swapping them if reversed.
    #[must_use]
    pub fn new(bounds: [f64; 2]) -> Self {
        let [a, b] = bounds;
        let (left, right) = if a <= b { (a, b) } else { (b, a) };
        let width = right - left;
        Self {
            left,
            right,
            inner_left: left + (1.0 - INV_PHI) * width,
            inner_right: left + INV_PHI * width,
        }
    }

    #[must_use]
    pub fn left(&self) -> f64 {
        self.left
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Interior point at `left + (1 - φ⁻¹) * width`.
    #[must_use]
    pub fn inner_left(&self) -> f64 {
        self.inner_left
    }

    /// Interior point at `left + φ⁻¹ * width`.
    #[must_use]
    pub fn inner_right(&self) -> f64 {
        self.inner_right
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.left + self.right)
    }

    /// Keeps `[left, inner_right]`; the old `inner_left` becomes `inner_right`.
    pub fn shrink_right(&mut self) {
        self.right = self.inner_right;
        self.inner_right = self.inner_left;
        self.inner_left = self.left + (1.0 - INV_PHI) * self.width();
    }

    /// Keeps `[inner_left, right]`; the old `inner_right` becomes `inner_left`.
    pub fn shrink_left(&mut self) {
        self.left = self.inner_left;
        self.inner_left = self.inner_right;
        self.inner_right = self.left + INV_PHI * self.width();
    }
}
