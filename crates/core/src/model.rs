/// A deterministic map from a typed input to a typed output.
///
/// Models are the building blocks the scalar solvers work on: growth laws,
/// equilibrium flows, and anything else evaluated point by point. The same
/// input must always produce the same result.
pub trait Model {
    type Input;
    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Calls the model with the given input.
    ///
    /// # Errors
    ///
    /// Returns the model's own error type for domain failures.
    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;

    /// Calls the model and keeps the input alongside the output.
    ///
    /// # Errors
    ///
    /// Returns the error from [`call`](Model::call).
    fn snapshot(
        &self,
        input: Self::Input,
    ) -> Result<Snapshot<Self::Input, Self::Output>, Self::Error> {
        let output = self.call(&input)?;
        Ok(Snapshot { input, output })
    }
}

/// An input and the output a model produced for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot<I, O> {
    pub input: I,
    pub output: O,
}

impl<I, O> Snapshot<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    struct Square;

    impl Model for Square {
        type Input = f64;
        type Output = f64;
        type Error = Infallible;

        fn call(&self, x: &f64) -> Result<f64, Infallible> {
            Ok(x * x)
        }
    }

    #[test]
    fn snapshot_pairs_input_with_output() {
        let snapshot = Square.snapshot(3.0).unwrap();
        assert_eq!(snapshot, Snapshot::new(3.0, 9.0));
    }
}
