//! Consistent rescaling of pairwise distances for topological data analysis.
//!
//! Each point cloud of a batch is turned into its distance matrix, then every
//! distance is divided by the geometric mean of the two endpoints' k-th
//! nearest neighbor distances. The result no longer depends on local sampling
//! density and can be fed to a persistent homology computation.

pub mod error;
pub mod models;
pub mod utils;

pub use error::{MetricError, RescaleError, Result};
pub use models::base_model::BaseTransformer;
pub use models::consistent_rescaling::{ConsistentRescaling, RescalingParams};
pub use utils::distance::{pairwise_distances, Metric, MetricParams};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pymodule]
fn consistent_rescaling(_py: Python, m: &PyModule) -> PyResult<()> {
    // ConsistentRescaling:
    m.add_class::<models::consistent_rescaling::PyConsistentRescaling>()?;
    Ok(())
}
