//! Pairwise distance computation for a single point cloud.
//!
//! Metric names follow scikit-learn / scipy spelling. The per-pair arithmetic
//! is delegated to `linfa-nn`; this module only resolves names and parameters
//! and fills the matrix.

use std::collections::HashMap;

use linfa_nn::distance::{Distance, L1Dist, L2Dist, LInfDist, LpDist};
use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::MetricError;

/// Keyword parameters forwarded to the distance function.
pub type MetricParams = HashMap<String, f64>;

/// Resolved distance function.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Euclidean,
    SqEuclidean,
    Manhattan,
    Chebyshev,
    Minkowski(f64),
    Cosine,
    /// Input rows are already a distance matrix.
    Precomputed,
}

impl Metric {
    /// Resolve a metric name and its keyword parameters.
    ///
    /// Only `minkowski` takes a parameter (`p`, default 2). Any other key, or
    /// any key at all for the parameterless metrics, is rejected.
    pub fn resolve(name: &str, params: &MetricParams) -> Result<Self, MetricError> {
        let metric = match name {
            "euclidean" | "l2" => Metric::Euclidean,
            "sqeuclidean" => Metric::SqEuclidean,
            "manhattan" | "cityblock" | "l1" => Metric::Manhattan,
            "chebyshev" | "infinity" => Metric::Chebyshev,
            "cosine" => Metric::Cosine,
            "precomputed" => Metric::Precomputed,
            "minkowski" => {
                let p = params.get("p").copied().unwrap_or(2.0);
                if p.is_nan() || p < 1.0 {
                    return Err(MetricError::InvalidParam {
                        param: "p".to_string(),
                        value: p,
                        reason: "minkowski requires p >= 1",
                    });
                }
                Metric::Minkowski(p)
            }
            other => return Err(MetricError::UnknownMetric(other.to_string())),
        };

        let accepted: &[&str] = match metric {
            Metric::Minkowski(_) => &["p"],
            _ => &[],
        };
        // Sorted so the reported key does not depend on hash order
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        if let Some(key) = keys.into_iter().find(|k| !accepted.contains(&k.as_str())) {
            return Err(MetricError::UnexpectedParam {
                metric: name.to_string(),
                param: key.clone(),
            });
        }

        Ok(metric)
    }

    /// Canonical name of the metric.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::SqEuclidean => "sqeuclidean",
            Metric::Manhattan => "manhattan",
            Metric::Chebyshev => "chebyshev",
            Metric::Minkowski(_) => "minkowski",
            Metric::Cosine => "cosine",
            Metric::Precomputed => "precomputed",
        }
    }

    /// Distance between two points.
    ///
    /// `Precomputed` has no point-to-point form and yields NaN.
    pub fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            Metric::Euclidean => L2Dist.distance(a, b),
            Metric::SqEuclidean => L2Dist.rdistance(a, b),
            Metric::Manhattan => L1Dist.distance(a, b),
            Metric::Chebyshev => LInfDist.distance(a, b),
            Metric::Minkowski(p) if p.is_infinite() => LInfDist.distance(a, b),
            Metric::Minkowski(p) => LpDist::new(*p).distance(a, b),
            Metric::Cosine => cosine_distance(a, b),
            Metric::Precomputed => f64::NAN,
        }
    }
}

/// `1 - cos(a, b)`, clipped to `[0, 2]`. A zero vector has similarity 0 to
/// everything.
fn cosine_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    let similarity = if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        a.dot(&b) / (norm_a * norm_b)
    };
    (1.0 - similarity).clamp(0.0, 2.0)
}

/// Compute the full `n x n` distance matrix of a point cloud.
///
/// With `"precomputed"` the input is taken as the distance matrix itself: it
/// must be square and non-negative, and is returned as a copy.
///
/// # Arguments
/// * `points` - Cloud with one point per row
/// * `metric` - Metric name, e.g. `"euclidean"`
/// * `params` - Keyword parameters for the metric
pub fn pairwise_distances(
    points: ArrayView2<f64>,
    metric: &str,
    params: &MetricParams,
) -> Result<Array2<f64>, MetricError> {
    let metric = Metric::resolve(metric, params)?;
    let (n, dim) = points.dim();

    if n > 0 && dim == 0 {
        return Err(MetricError::EmptyFeatures);
    }
    for ((point, feature), value) in points.indexed_iter() {
        if !value.is_finite() {
            return Err(MetricError::NonFiniteInput { point, feature });
        }
    }

    if metric == Metric::Precomputed {
        if n != dim {
            return Err(MetricError::PrecomputedNotSquare { rows: n, cols: dim });
        }
        if let Some(((row, col), _)) = points.indexed_iter().find(|(_, v)| **v < 0.0) {
            return Err(MetricError::NegativePrecomputed { row, col });
        }
        return Ok(points.to_owned());
    }

    let mut dm = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in i + 1..n {
            let dist = metric.distance(points.row(i), points.row(j));
            dm[[i, j]] = dist;
            dm[[j, i]] = dist;
        }
    }

    Ok(dm)
}
