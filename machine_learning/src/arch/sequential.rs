use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Layer, loss::LossFn};
use crate::{
    MlErr, Result,
    optimization::Optimizer,
    training::{EpochStats, correct_predictions},
};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Makes a forward pass through the network, caching what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_params(params.len())?;

        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let size = layer.size();
            a = layer.forward(&params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    /// Makes a forward pass through the network without mutating it, this is the inference
    /// entry point and can be shared between threads.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_params(params.len())?;

        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter() {
            let size = layer.size();
            a = layer.predict(&params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    fn check_params(&self, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    // NOTE: the epoch loss is the mean of the batch losses, computed with the parameters as
    // they were before each batch's update.
    fn backprop<'a, L, O, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        batches: I,
    ) -> Result<EpochStats>
    where
        L: LossFn,
        O: Optimizer,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        if grad.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient buffer",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let mut total_loss = 0.0;
        let mut num_batches = 0;
        let mut correct = 0;
        let mut seen = 0;

        for (x, y) in batches {
            grad.fill(0.0);

            let y_pred = self.forward(params, x)?;
            total_loss += loss_fn.loss(y_pred.view(), y);
            correct += correct_predictions(y_pred.view(), y);
            seen += x.nrows();
            num_batches += 1;

            let mut d = loss_fn.loss_prime(y_pred.view(), y);
            let mut end = params.len();

            for layer in self.layers.iter_mut().rev() {
                let start = end - layer.size();
                d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
                end = start;
            }

            optimizer.update_params(params, grad)?;
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(EpochStats {
            loss: total_loss / num_batches as f32,
            accuracy: correct as f32 / seen as f32,
        })
    }
}
