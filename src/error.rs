//! Error types for consistent rescaling.

use thiserror::Error;

/// Failures raised by the distance routine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Metric name is not recognised.
    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    /// Parameter not accepted by the chosen metric.
    #[error("Metric '{metric}' does not accept parameter '{param}'")]
    UnexpectedParam { metric: String, param: String },

    /// Parameter accepted but its value is out of range.
    #[error("Invalid value {value} for parameter '{param}': {reason}")]
    InvalidParam {
        param: String,
        value: f64,
        reason: &'static str,
    },

    /// Point cloud has points but no features.
    #[error("Point cloud has no features")]
    EmptyFeatures,

    /// Precomputed distances must form a square matrix.
    #[error("Precomputed distance matrix must be square, got {rows}x{cols}")]
    PrecomputedNotSquare { rows: usize, cols: usize },

    /// Precomputed distances must be non-negative.
    #[error("Negative value in precomputed distance matrix at ({row}, {col})")]
    NegativePrecomputed { row: usize, col: usize },

    /// NaN or infinite coordinate.
    #[error("Non-finite value at point {point}, feature {feature}")]
    NonFiniteInput { point: usize, feature: usize },
}

/// Main error type for consistent rescaling operations.
#[derive(Error, Debug)]
pub enum RescaleError {
    /// `transform` called before `fit`.
    #[error("This ConsistentRescaling instance is not fitted yet. Call 'fit' before 'transform'")]
    NotFitted,

    /// The pairwise distance routine rejected the input.
    #[error("Distance computation failed: {0}")]
    MetricComputation(#[from] MetricError),

    /// `n_neighbor` does not index into a sorted distance row.
    #[error("n_neighbor={n_neighbor} is out of range for a cloud of {n_points} points")]
    NeighborRankOutOfRange { n_neighbor: usize, n_points: usize },

    /// Distance matrix is not square.
    #[error("Distance matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// `n_jobs == 0` has no meaning.
    #[error("n_jobs == 0 has no meaning")]
    InvalidJobs,

    /// `n_neighbor == 0` selects the self distance.
    #[error("n_neighbor must be at least 1, got {0}")]
    InvalidNeighbor(usize),

    /// Worker pool could not be started.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias for consistent rescaling operations.
pub type Result<T> = std::result::Result<T, RescaleError>;

impl RescaleError {
    /// Create a neighbor rank error.
    #[must_use]
    pub const fn neighbor_out_of_range(n_neighbor: usize, n_points: usize) -> Self {
        Self::NeighborRankOutOfRange {
            n_neighbor,
            n_points,
        }
    }

    /// Create a non-square matrix error.
    #[must_use]
    pub const fn not_square(rows: usize, cols: usize) -> Self {
        Self::NotSquare { rows, cols }
    }
}
