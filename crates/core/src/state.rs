use std::{
    fmt::Debug,
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use thiserror::Error;

/// A named, fixed-order component of a simulation state vector.
///
/// Implemented by fieldless enums so that state access is resolved at compile
/// time instead of by string lookup. `ALL` lists every variant in storage
/// order, and `index` must agree with that order.
///
/// # Example
///
/// ```
/// use hybrid_core::{StateVariable, StateVector};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Var {
///     S,
///     X,
/// }
///
/// impl StateVariable for Var {
///     const ALL: &'static [Self] = &[Var::S, Var::X];
///
///     fn index(self) -> usize {
///         self as usize
///     }
///
///     fn name(self) -> &'static str {
///         match self {
///             Var::S => "S",
///             Var::X => "X",
///         }
///     }
/// }
///
/// let mut y = StateVector::<Var>::zeros();
/// y[Var::X] = 0.5;
/// assert_eq!(y.as_slice(), &[0.0, 0.5]);
/// ```
pub trait StateVariable: Copy + Eq + Debug + 'static {
    /// Every variable, in storage order.
    const ALL: &'static [Self];

    /// Position of this variable in the state vector.
    fn index(self) -> usize;

    /// Column name used when recording results.
    fn name(self) -> &'static str;

    /// Number of state variables.
    #[must_use]
    fn dimension() -> usize {
        Self::ALL.len()
    }

    /// Column names in storage order.
    #[must_use]
    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.name()).collect()
    }
}

/// Returned when a slice does not match the dimension of a state vector.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("expected {expected} state values, got {actual}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// An owned state vector indexed by a [`StateVariable`] enum.
///
/// The dimension is fixed by `V` and never changes.
#[derive(Clone, PartialEq)]
pub struct StateVector<V> {
    values: Vec<f64>,
    _marker: PhantomData<V>,
}

impl<V: StateVariable> StateVector<V> {
    /// Creates a state vector with every component set to zero.
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            values: vec![0.0; V::dimension()],
            _marker: PhantomData,
        }
    }

    /// Creates a state vector by evaluating `f` for each variable.
    pub fn from_fn(mut f: impl FnMut(V) -> f64) -> Self {
        Self {
            values: V::ALL.iter().map(|&v| f(v)).collect(),
            _marker: PhantomData,
        }
    }

    /// Creates a state vector from a slice in storage order.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionMismatch`] if the slice length differs from `V::ALL`.
    pub fn from_slice(values: &[f64]) -> Result<Self, DimensionMismatch> {
        check_dimension::<V>(values.len())?;
        Ok(Self {
            values: values.to_vec(),
            _marker: PhantomData,
        })
    }

    /// Returns the values in storage order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Returns a borrowed view of this vector.
    #[must_use]
    pub fn view(&self) -> StateRef<'_, V> {
        StateRef::new(&self.values)
    }

    /// Returns a mutable view, as passed to right-hand-side evaluation.
    pub fn view_mut(&mut self) -> StateMut<'_, V> {
        StateMut::new(&mut self.values)
    }

    /// Consumes the vector, returning the raw values.
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl<V: StateVariable> Debug for StateVector<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(V::ALL.iter().map(|v| (v.name(), self.values[v.index()])))
            .finish()
    }
}

impl<V: StateVariable> Index<V> for StateVector<V> {
    type Output = f64;

    fn index(&self, var: V) -> &f64 {
        &self.values[var.index()]
    }
}

impl<V: StateVariable> IndexMut<V> for StateVector<V> {
    fn index_mut(&mut self, var: V) -> &mut f64 {
        &mut self.values[var.index()]
    }
}

/// A read-only view of raw integrator values indexed by `V`.
#[derive(Debug, Clone, Copy)]
pub struct StateRef<'a, V> {
    values: &'a [f64],
    _marker: PhantomData<V>,
}

impl<'a, V: StateVariable> StateRef<'a, V> {
    /// Wraps a slice whose length has already been checked against `V`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the slice length does not match.
    #[must_use]
    pub fn new(values: &'a [f64]) -> Self {
        debug_assert_eq!(values.len(), V::dimension());
        Self {
            values,
            _marker: PhantomData,
        }
    }

    /// Returns the values in storage order.
    #[must_use]
    pub fn as_slice(&self) -> &'a [f64] {
        self.values
    }

    /// Copies the view into an owned vector.
    #[must_use]
    pub fn to_vector(&self) -> StateVector<V> {
        StateVector {
            values: self.values.to_vec(),
            _marker: PhantomData,
        }
    }
}

impl<V: StateVariable> Index<V> for StateRef<'_, V> {
    type Output = f64;

    fn index(&self, var: V) -> &f64 {
        &self.values[var.index()]
    }
}

/// A mutable view used to write derivatives.
#[derive(Debug)]
pub struct StateMut<'a, V> {
    values: &'a mut [f64],
    _marker: PhantomData<V>,
}

impl<'a, V: StateVariable> StateMut<'a, V> {
    /// Wraps a mutable slice whose length has already been checked against `V`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the slice length does not match.
    #[must_use]
    pub fn new(values: &'a mut [f64]) -> Self {
        debug_assert_eq!(values.len(), V::dimension());
        Self {
            values,
            _marker: PhantomData,
        }
    }
}

impl<V: StateVariable> Index<V> for StateMut<'_, V> {
    type Output = f64;

    fn index(&self, var: V) -> &f64 {
        &self.values[var.index()]
    }
}

impl<V: StateVariable> IndexMut<V> for StateMut<'_, V> {
    fn index_mut(&mut self, var: V) -> &mut f64 {
        &mut self.values[var.index()]
    }
}

fn check_dimension<V: StateVariable>(actual: usize) -> Result<(), DimensionMismatch> {
    let expected = V::dimension();
    if actual == expected {
        Ok(())
    } else {
        Err(DimensionMismatch { expected, actual })
    }
}
