//! Error types for volume construction, evaluation and projection.

use thiserror::Error;

use crate::misc::ParametricDirection;

/// Errors raised by knot construction, fitting, evaluation and projection.
///
/// Every failure is local to the call that produced it; nothing is downgraded to
/// an approximate result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VolumeError {
    /// Knot or sample input cannot form a valid clamped spline.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Too few samples or control points for the requested order.
    #[error(
        "underdetermined fit in {direction}: {samples} samples, {control_points} control points, order {order}"
    )]
    UnderdeterminedFit {
        /// Direction whose counts are inconsistent.
        direction: ParametricDirection,
        /// Number of samples along the direction.
        samples: usize,
        /// Requested number of control points.
        control_points: usize,
        /// Requested spline order.
        order: usize,
    },

    /// The normal equations of a direction are rank deficient.
    #[error("singular least-squares system in {direction} (pivot ratio {pivot_ratio:e})")]
    SingularFitMatrix {
        /// Direction whose basis matrix is rank deficient.
        direction: ParametricDirection,
        /// Smallest over largest squared Cholesky pivot.
        pivot_ratio: f64,
    },

    /// A parametric coordinate lies outside `[0, 1]`.
    #[error("{direction} = {value} is outside the parametric domain [0, 1]")]
    Domain {
        /// Offending direction.
        direction: ParametricDirection,
        /// Offending value.
        value: f64,
    },

    /// An original-data query on a volume built without retained samples.
    #[error("volume has no retained original data")]
    NoOriginalData,

    /// No projection seed met the tolerance within the iteration budget.
    #[error(
        "projection did not converge from {seeds} seeds within {max_iters} iterations (best distance {best_distance:e})"
    )]
    ProjectionDidNotConverge {
        /// Number of seeds tried.
        seeds: usize,
        /// Iteration budget per seed.
        max_iters: u64,
        /// Smallest distance reached by any seed, converged or not.
        best_distance: f64,
    },

    /// Corner, edge or face index out of range.
    #[error("{kind} index {index} is out of range (0..{count})")]
    InvalidIndex {
        /// "corner", "edge" or "face".
        kind: &'static str,
        /// Requested index.
        index: usize,
        /// Number of valid indices.
        count: usize,
    },

    /// Grid or lattice storage does not match its declared shape.
    #[error("invalid shape: {0}")]
    InvalidShape(String),
}

/// Result alias for volume operations
pub type Result<T> = std::result::Result<T, VolumeError>;

impl VolumeError {
    pub(crate) fn domain<T: crate::misc::FloatingPoint>(
        direction: ParametricDirection,
        value: T,
    ) -> Self {
        VolumeError::Domain {
            direction,
            value: value.to_f64_lossy(),
        }
    }
}
