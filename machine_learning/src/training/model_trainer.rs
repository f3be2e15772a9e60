use std::num::NonZeroUsize;

use log::info;
use rand::Rng;

use super::EpochStats;
use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// A model trainer. Contains the relevant components needed for training a model,
/// including the model itself.
pub struct ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    grad: Vec<f32>,
    dataset: Dataset,
    optimizer: O,
    loss_fn: L,
    model: M,

    epochs: usize,
    batch_size: NonZeroUsize,
    shuffle: bool,
    rng: R,
}

impl<M, O, L, R> ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer that updates the parameters after each batch.
    /// * `dataset` - The dataset the model will be trained with.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `epochs` - The amount of passes over the dataset per `train` call.
    /// * `batch_size` - The maximum amount of rows per batch.
    /// * `shuffle` - Whether to permute the dataset before every epoch.
    /// * `rng` - A random number generator.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: M,
        optimizer: O,
        dataset: Dataset,
        loss_fn: L,
        epochs: usize,
        batch_size: NonZeroUsize,
        shuffle: bool,
        rng: R,
    ) -> Self {
        Self {
            grad: vec![0.; model.size()],
            model,
            optimizer,
            dataset,
            loss_fn,
            epochs,
            batch_size,
            shuffle,
            rng,
        }
    }

    /// Performs `epochs` epochs of training its model, using its optimizer, dataset, loss
    /// function and batch size.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, updated in place.
    ///
    /// # Returns
    /// The stats of every epoch, in order.
    pub fn train(&mut self, params: &mut [f32]) -> Result<Vec<EpochStats>> {
        if params.len() != self.grad.len() {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: self.grad.len(),
            });
        }

        let mut history = Vec::with_capacity(self.epochs);

        for epoch in 1..=self.epochs {
            if self.shuffle {
                self.dataset.shuffle(&mut self.rng);
            }

            let batches = self.dataset.batches(self.batch_size);
            let stats = self.model.backprop(
                params,
                &mut self.grad,
                &self.loss_fn,
                &mut self.optimizer,
                batches,
            )?;

            info!(
                epoch = epoch,
                loss = stats.loss,
                accuracy = stats.accuracy;
                "epoch {epoch}/{} finished", self.epochs
            );

            history.push(stats);
        }

        Ok(history)
    }

    /// Returns the model being trained.
    pub fn model(&self) -> &M {
        &self.model
    }
}
