use std::num::NonZeroUsize;

use ndarray::prelude::*;
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory dataset of feature rows and one-hot label rows.
#[derive(Clone, Debug)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The samples, one per row.
    /// * `y` - The expected outputs, one per row.
    ///
    /// # Returns
    /// A new `Dataset` or an error if it's empty or the row counts differ.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(MlErr::EmptyDataset);
        }

        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y })
    }

    /// Returns the amount of samples.
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Permutes the rows of the dataset, keeping every sample next to its label.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);

        self.x = self.x.select(Axis(0), &indices);
        self.y = self.y.select(Axis(0), &indices);
    }

    /// Splits the dataset into batches of at most `batch_size` rows, the last one may be
    /// smaller.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let n = batch_size.get();

        self.x
            .axis_chunks_iter(Axis(0), n)
            .zip(self.y.axis_chunks_iter(Axis(0), n))
    }
}

/// Encodes class indices as one-hot rows.
///
/// # Arguments
/// * `labels` - The class index of each sample.
/// * `num_classes` - The width of each row.
///
/// # Returns
/// A `(labels.len(), num_classes)` matrix or an error if a label is out of range.
pub fn one_hot(labels: &[usize], num_classes: usize) -> Result<Array2<f32>> {
    let mut y = Array2::zeros((labels.len(), num_classes));

    for (i, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(MlErr::SizeMismatch {
                what: "class index",
                got: label,
                expected: num_classes,
            });
        }

        y[[i, label]] = 1.;
    }

    Ok(y)
}
