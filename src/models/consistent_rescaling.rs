// src/models/consistent_rescaling.rs

use linfa::traits::Transformer;
use log::{debug, warn};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3};

use crate::error::{RescaleError, Result};
use crate::models::base_model::BaseTransformer;
use crate::utils::distance::{pairwise_distances, Metric, MetricParams};
use crate::utils::pool::{build_pool, parallel_map};

/// Hyperparameters of [`ConsistentRescaling`].
#[derive(Debug, Clone, PartialEq)]
pub struct RescalingParams {
    /// Distance metric name, e.g. `"euclidean"`.
    pub metric: String,
    /// Keyword parameters passed to the metric.
    pub metric_params: MetricParams,
    /// Rank of the neighbor used for rescaling (0 = self).
    pub n_neighbor: usize,
    /// Maximum number of workers. Negative values count back from the CPU count.
    pub n_jobs: isize,
}

impl Default for RescalingParams {
    fn default() -> Self {
        RescalingParams {
            metric: "euclidean".to_string(),
            metric_params: MetricParams::new(),
            n_neighbor: 1,
            n_jobs: 1,
        }
    }
}

impl RescalingParams {
    /// Check the hyperparameters without touching any data.
    ///
    /// Never called implicitly: `fit` and `transform` accept anything and fail
    /// later, where the bad value is actually used.
    pub fn validate(&self) -> Result<()> {
        Metric::resolve(&self.metric, &self.metric_params)?;
        if self.n_neighbor == 0 {
            return Err(RescaleError::InvalidNeighbor(self.n_neighbor));
        }
        if self.n_jobs == 0 {
            return Err(RescaleError::InvalidJobs);
        }
        Ok(())
    }
}

/// Consistent rescaling of pairwise distances.
///
/// Every cloud of a batch is turned into its distance matrix, and every
/// off-diagonal entry `d(i, j)` is divided by `sqrt(d_i * d_j)`, where `d_i`
/// is the distance from point `i` to its `n_neighbor`-th nearest point. This
/// removes sampling density from the scale of the distances before a
/// persistent homology computation.
#[derive(Debug, Clone, Default)]
pub struct ConsistentRescaling {
    params: RescalingParams,
    is_fitted: bool,
}

impl ConsistentRescaling {
    pub fn new(
        metric: impl Into<String>,
        metric_params: MetricParams,
        n_neighbor: usize,
        n_jobs: isize,
    ) -> Self {
        Self::from_params(RescalingParams {
            metric: metric.into(),
            metric_params,
            n_neighbor,
            n_jobs,
        })
    }

    pub fn from_params(params: RescalingParams) -> Self {
        ConsistentRescaling {
            params,
            is_fitted: false,
        }
    }

    pub fn get_params(&self) -> RescalingParams {
        self.params.clone()
    }

    pub fn validate_params(&self) -> Result<()> {
        self.params.validate()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Transform clouds that may differ in point count.
    ///
    /// Returns one square matrix per cloud, in input order.
    pub fn transform_ragged(&self, clouds: &[ArrayView2<f64>]) -> Result<Vec<Array2<f64>>> {
        if !self.is_fitted {
            return Err(RescaleError::NotFitted);
        }

        let pool = build_pool(self.params.n_jobs)?;
        debug!(
            "rescaling {} clouds with metric '{}' on {} workers",
            clouds.len(),
            self.params.metric,
            pool.current_num_threads()
        );

        let distances = parallel_map(&pool, clouds, |cloud| {
            Ok(pairwise_distances(
                cloud.view(),
                &self.params.metric,
                &self.params.metric_params,
            )?)
        })?;
        debug!("computed {} distance matrices", distances.len());

        parallel_map(&pool, &distances, |dm| {
            Self::consistent_homology_distance(dm.view(), self.params.n_neighbor)
        })
    }

    /// Rescale one distance matrix by its neighbor distances.
    ///
    /// `d_i` is the entry at position `n_neighbor` of row `i` once sorted, self
    /// distance included. A zero `d_i` is not guarded: the affected entries
    /// come out as `inf` or `NaN`.
    pub fn consistent_homology_distance(x: ArrayView2<f64>, n_neighbor: usize) -> Result<Array2<f64>> {
        let (n, cols) = x.dim();
        if n != cols {
            return Err(RescaleError::not_square(n, cols));
        }
        if n_neighbor >= n {
            return Err(RescaleError::neighbor_out_of_range(n_neighbor, n));
        }

        let neighbor_distances: Vec<f64> = x
            .outer_iter()
            .map(|row| {
                let mut sorted = row.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                sorted[n_neighbor]
            })
            .collect();

        let degenerate = neighbor_distances.iter().filter(|&&d| d == 0.0).count();
        if degenerate > 0 {
            warn!(
                "{} of {} points have a zero distance to neighbor {}; output will contain non-finite values",
                degenerate, n, n_neighbor
            );
        }

        // Upper triangle only, mirrored below
        let mut upper = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i + 1..n {
                upper[[i, j]] = x[[i, j]] / (neighbor_distances[i] * neighbor_distances[j]).sqrt();
            }
        }

        Ok(&upper + &upper.t())
    }
}

impl BaseTransformer for ConsistentRescaling {
    fn fit(&mut self, _x: ArrayView3<f64>, _y: Option<ArrayView1<f64>>) -> Result<()> {
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, x: ArrayView3<f64>) -> Result<Array3<f64>> {
        let (n_clouds, n_points, _) = x.dim();
        let clouds: Vec<ArrayView2<f64>> = x.outer_iter().collect();
        let matrices = self.transform_ragged(&clouds)?;

        let mut out = Array3::<f64>::zeros((n_clouds, n_points, n_points));
        for (mut slot, matrix) in out.outer_iter_mut().zip(matrices.iter()) {
            slot.assign(matrix);
        }
        Ok(out)
    }
}

impl<'a> Transformer<ArrayView3<'a, f64>, Result<Array3<f64>>> for ConsistentRescaling {
    fn transform(&self, x: ArrayView3<'a, f64>) -> Result<Array3<f64>> {
        BaseTransformer::transform(self, x)
    }
}

#[cfg(feature = "python")]
mod python {
    use super::*;
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;
    use pyo3::types::{PyAny, PyDict};

    impl From<RescaleError> for PyErr {
        fn from(err: RescaleError) -> PyErr {
            PyValueError::new_err(err.to_string())
        }
    }

    /// Python-exposed wrapper around ConsistentRescaling
    #[pyclass(name = "ConsistentRescaling")]
    pub struct PyConsistentRescaling {
        inner: ConsistentRescaling,
    }

    #[pymethods]
    impl PyConsistentRescaling {
        #[new]
        #[pyo3(signature = (metric="euclidean", metric_params=None, n_neighbor=1, n_jobs=1))]
        fn new(
            metric: &str,
            metric_params: Option<MetricParams>,
            n_neighbor: usize,
            n_jobs: isize,
        ) -> Self {
            PyConsistentRescaling {
                inner: ConsistentRescaling::new(
                    metric,
                    metric_params.unwrap_or_default(),
                    n_neighbor,
                    n_jobs,
                ),
            }
        }

        #[getter]
        fn is_fitted(&self) -> bool {
            self.inner.is_fitted()
        }

        #[pyo3(signature = (deep=true))]
        fn get_params<'py>(&self, py: Python<'py>, deep: bool) -> PyResult<&'py PyDict> {
            let _ = deep;
            let params = self.inner.get_params();
            let dict = PyDict::new(py);
            dict.set_item("metric", params.metric)?;
            dict.set_item("metric_params", params.metric_params)?;
            dict.set_item("n_neighbor", params.n_neighbor)?;
            dict.set_item("n_jobs", params.n_jobs)?;
            Ok(dict)
        }

        fn validate_params(&self) -> PyResult<()> {
            Ok(self.inner.validate_params()?)
        }

        #[pyo3(signature = (x, y=None))]
        fn fit<'py>(
            mut slf: PyRefMut<'py, Self>,
            x: PyReadonlyArray3<'py, f64>,
            y: Option<&PyAny>,
        ) -> PyResult<PyRefMut<'py, Self>> {
            let _ = y;
            BaseTransformer::fit(&mut slf.inner, x.as_array(), None)?;
            Ok(slf)
        }

        #[pyo3(signature = (x, y=None))]
        fn transform<'py>(
            &self,
            py: Python<'py>,
            x: PyReadonlyArray3<'py, f64>,
            y: Option<&PyAny>,
        ) -> PyResult<&'py PyArray3<f64>> {
            let _ = y;
            let x = x.as_array();
            let inner = &self.inner;
            let out = py.allow_threads(|| BaseTransformer::transform(inner, x))?;
            Ok(out.into_pyarray(py))
        }

        #[pyo3(signature = (x, y=None))]
        fn fit_transform<'py>(
            &mut self,
            py: Python<'py>,
            x: PyReadonlyArray3<'py, f64>,
            y: Option<&PyAny>,
        ) -> PyResult<&'py PyArray3<f64>> {
            let _ = y;
            let x = x.as_array();
            let inner = &mut self.inner;
            let out = py.allow_threads(|| inner.fit_transform(x, None))?;
            Ok(out.into_pyarray(py))
        }
    }
}

#[cfg(feature = "python")]
pub use python::PyConsistentRescaling;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    fn fitted(n_neighbor: usize, n_jobs: isize) -> ConsistentRescaling {
        let mut model = ConsistentRescaling::new("euclidean", MetricParams::new(), n_neighbor, n_jobs);
        model.fit(Array3::<f64>::zeros((0, 0, 0)).view(), None).unwrap();
        model
    }

    #[test]
    fn test_kernel_on_a_line() {
        let dm = array![[0.0, 1.0, 3.0], [1.0, 0.0, 2.0], [3.0, 2.0, 0.0]];
        let out = ConsistentRescaling::consistent_homology_distance(dm.view(), 1).unwrap();

        assert_abs_diff_eq!(out[[0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[[0, 2]], 3.0 / 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(out[[1, 2]], 2.0 / 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(out, out.t());
        assert!(out.diag().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_kernel_higher_rank() {
        // Neighbor 2 of every point on {0, 1, 3} is the farthest one
        let dm = array![[0.0, 1.0, 3.0], [1.0, 0.0, 2.0], [3.0, 2.0, 0.0]];
        let out = ConsistentRescaling::consistent_homology_distance(dm.view(), 2).unwrap();
        assert_abs_diff_eq!(out[[0, 1]], 1.0 / (3.0_f64 * 2.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(out[[0, 2]], 3.0 / (3.0_f64 * 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_kernel_rank_out_of_range() {
        let dm = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(matches!(
            ConsistentRescaling::consistent_homology_distance(dm.view(), 2),
            Err(RescaleError::NeighborRankOutOfRange { n_neighbor: 2, n_points: 2 })
        ));
    }

    #[test]
    fn test_kernel_rejects_non_square() {
        let dm = array![[0.0, 1.0, 2.0], [1.0, 0.0, 1.0]];
        assert!(matches!(
            ConsistentRescaling::consistent_homology_distance(dm.view(), 1),
            Err(RescaleError::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn test_kernel_zero_neighbor_distance() {
        // Points 0 and 1 coincide, point 2 is away from both
        let dm = array![[0.0, 0.0, 5.0], [0.0, 0.0, 5.0], [5.0, 5.0, 0.0]];
        let out = ConsistentRescaling::consistent_homology_distance(dm.view(), 1).unwrap();
        assert!(out[[0, 1]].is_nan());
        assert!(out[[0, 2]].is_infinite());
        assert!(out[[2, 1]].is_infinite());
        assert!(out.diag().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_requires_fit() {
        let model = ConsistentRescaling::default();
        let x = Array3::<f64>::zeros((2, 3, 1));
        assert!(matches!(
            BaseTransformer::transform(&model, x.view()),
            Err(RescaleError::NotFitted)
        ));
    }

    #[test]
    fn test_not_fitted_checked_before_pool() {
        // n_jobs == 0 would fail at pool construction; NotFitted must win
        let model = ConsistentRescaling::new("euclidean", MetricParams::new(), 1, 0);
        let x = Array3::<f64>::zeros((1, 3, 1));
        assert!(matches!(
            BaseTransformer::transform(&model, x.view()),
            Err(RescaleError::NotFitted)
        ));
    }

    #[test]
    fn test_transform_line() {
        let model = fitted(1, 1);
        let x = Array3::from_shape_vec((1, 3, 1), vec![0.0, 1.0, 3.0]).unwrap();
        let out = BaseTransformer::transform(&model, x.view()).unwrap();
        assert_eq!(out.dim(), (1, 3, 3));
        assert_abs_diff_eq!(out[[0, 0, 2]], 2.1213203435596424, epsilon = 1e-12);
        assert_abs_diff_eq!(out[[0, 1, 2]], 1.4142135623730951, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_empty_batch() {
        let model = fitted(1, 2);
        let x = Array3::<f64>::zeros((0, 4, 2));
        let out = BaseTransformer::transform(&model, x.view()).unwrap();
        assert_eq!(out.dim(), (0, 4, 4));
    }

    #[test]
    fn test_transform_ragged() {
        let model = fitted(1, 2);
        let a = array![[0.0], [1.0], [3.0]];
        let b = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [4.0, 4.0]];
        let out = model.transform_ragged(&[a.view(), b.view()]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].dim(), (3, 3));
        assert_eq!(out[1].dim(), (4, 4));
        assert_abs_diff_eq!(out[0][[0, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_propagates_metric_error() {
        let mut model = ConsistentRescaling::new("hamming", MetricParams::new(), 1, 1);
        let x = Array3::<f64>::zeros((1, 3, 2));
        model.fit(x.view(), None).unwrap();
        assert!(matches!(
            BaseTransformer::transform(&model, x.view()),
            Err(RescaleError::MetricComputation(_))
        ));
    }

    #[test]
    fn test_validate_params() {
        assert!(ConsistentRescaling::default().validate_params().is_ok());

        let bad_metric = ConsistentRescaling::new("hamming", MetricParams::new(), 1, 1);
        assert!(matches!(
            bad_metric.validate_params(),
            Err(RescaleError::MetricComputation(_))
        ));

        let bad_rank = ConsistentRescaling::new("euclidean", MetricParams::new(), 0, 1);
        assert!(matches!(bad_rank.validate_params(), Err(RescaleError::InvalidNeighbor(0))));

        let bad_jobs = ConsistentRescaling::new("euclidean", MetricParams::new(), 1, 0);
        assert!(matches!(bad_jobs.validate_params(), Err(RescaleError::InvalidJobs)));
    }

    #[test]
    fn test_fit_does_not_validate() {
        let mut model = ConsistentRescaling::new("hamming", MetricParams::new(), 0, 0);
        assert!(model.fit(Array3::<f64>::zeros((1, 2, 1)).view(), None).is_ok());
        assert!(model.is_fitted());
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let x = Array3::from_shape_fn((9, 6, 2), |(c, p, f)| {
            ((c * 31 + p * 7 + f * 3) % 11) as f64 + 0.25 * p as f64
        });
        let serial = BaseTransformer::transform(&fitted(1, 1), x.view()).unwrap();
        let parallel = BaseTransformer::transform(&fitted(1, 4), x.view()).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_params_are_per_instance() {
        let mut a = ConsistentRescaling::default();
        let b = ConsistentRescaling::default();
        a.params.metric_params.insert("p".to_string(), 3.0);
        assert!(b.get_params().metric_params.is_empty());
        assert_eq!(a.get_params().metric_params.get("p"), Some(&3.0));
    }
}
