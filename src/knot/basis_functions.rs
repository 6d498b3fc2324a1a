use crate::misc::FloatingPoint;

/// Non-vanishing basis function values at one parameter
///
/// Holds the `degree + 1` values (or derivative values) of the basis functions
/// that are non-zero on the knot span containing the parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct BasisFunctions<T> {
    span: usize,
    degree: usize,
    values: Vec<T>,
}

impl<T: FloatingPoint> BasisFunctions<T> {
    pub fn new(span: usize, degree: usize, values: Vec<T>) -> Self {
        Self {
            span,
            degree,
            values,
        }
    }

    /// Index of the knot span containing the parameter
    pub fn span(&self) -> usize {
        self.span
    }

    /// Index of the control point weighted by the first value
    pub fn first_index(&self) -> usize {
        self.span - self.degree
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn sum(&self) -> T {
        self.values.iter().fold(T::zero(), |acc, v| acc + *v)
    }

    /// Iterate over `(control point index, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        let first = self.first_index();
        self.values.iter().enumerate().map(move |(i, v)| (first + i, *v))
    }
}
