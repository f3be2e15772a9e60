use ndarray::prelude::*;

use crate::{MlErr, Result};

/// Turns each row into a probability distribution.
#[derive(Clone, Debug)]
pub struct Softmax {
    dim: usize,
    a: Array2<f32>,
}

impl Softmax {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            a: Array2::zeros((0, 0)),
        }
    }

    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let a = self.predict(x)?;
        self.a = a.clone();
        Ok(a)
    }

    pub fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim {
            return Err(MlErr::SizeMismatch {
                what: "softmax width",
                got: x.ncols(),
                expected: self.dim,
            });
        }

        let mut a = x.to_owned();

        for mut row in a.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row /= sum;
        }

        Ok(a)
    }

    /// Propagates `d` through the softmax jacobian, row by row:
    /// `dz = a * (d - sum(d * a))`.
    pub fn backward(&mut self, d: Array2<f32>) -> Result<Array2<f32>> {
        if d.dim() != self.a.dim() {
            return Err(MlErr::SizeMismatch {
                what: "softmax delta rows",
                got: d.nrows(),
                expected: self.a.nrows(),
            });
        }

        let dot = (&d * &self.a).sum_axis(Axis(1)).insert_axis(Axis(1));
        Ok(&self.a * &(&d - &dot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_sum_to_one() {
        let softmax = Softmax::new(3);
        let a = softmax
            .predict(array![[1f32, 2., 3.], [1000., 1000., 1000.]].view())
            .unwrap();

        for row in a.rows() {
            assert!((row.sum() - 1.).abs() < 1e-6);
        }

        assert!(a[[0, 2]] > a[[0, 1]] && a[[0, 1]] > a[[0, 0]]);
        assert!((a[[1, 0]] - 1. / 3.).abs() < 1e-6);
    }

    #[test]
    fn backward_of_uniform_delta_is_zero() {
        let mut softmax = Softmax::new(2);
        softmax.forward(array![[0.3f32, -1.2]].view()).unwrap();

        let d = softmax.backward(array![[1f32, 1.]]).unwrap();
        assert!(d.iter().all(|v| v.abs() < 1e-6));
    }
}
