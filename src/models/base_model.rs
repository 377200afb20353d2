use ndarray::{Array3, ArrayView1, ArrayView3};

use crate::error::Result;

/// A common Rust trait for batch transformers over point clouds.
pub trait BaseTransformer {
    /// Prepare the transformer. Labels are accepted for pipeline
    /// compatibility.
    fn fit(&mut self, x: ArrayView3<f64>, y: Option<ArrayView1<f64>>) -> Result<()>;

    /// Transform a batch of point clouds.
    fn transform(&self, x: ArrayView3<f64>) -> Result<Array3<f64>>;

    /// Default: fit then transform.
    fn fit_transform(
        &mut self,
        x: ArrayView3<f64>,
        y: Option<ArrayView1<f64>>,
    ) -> Result<Array3<f64>> {
        self.fit(x, y)?;
        self.transform(x)
    }
}
