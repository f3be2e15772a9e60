use crate::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates the provided parameters using the gradient.
    ///
    /// # Arguments
    /// * `params` - The parameters to update.
    /// * `grad` - The gradient of the loss with respect to `params`.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `params` and `grad`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;
}
