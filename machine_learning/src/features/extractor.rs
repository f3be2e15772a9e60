use ndarray::{Array2, ArrayView4};

use crate::Result;

/// A frozen network turning normalized images into feature vectors. Its weights never change,
/// so a single instance is shared by every caller.
pub trait FeatureExtractor: Send + Sync {
    /// Returns the side length of the square images it consumes.
    fn image_size(&self) -> usize;

    /// Returns the width of each output row.
    fn feature_dim(&self) -> usize;

    /// Runs a single forward pass over a batch.
    ///
    /// # Arguments
    /// * `images` - A `(batch, image_size, image_size, 3)` tensor of values in `[-1, 1]`.
    ///
    /// # Returns
    /// A `(batch, feature_dim)` matrix, rows in input order.
    fn extract(&self, images: ArrayView4<f32>) -> Result<Array2<f32>>;
}
