use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer. Its parameters are laid out as the row-major `(in, out)` kernel
/// followed by the `out` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The `(input, output)` widths.
    /// * `act_fn` - The activation applied to the affine output, if any.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Computes the layer's output and keeps what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `x` - The input batch, one row per sample.
    ///
    /// # Returns
    /// The activated output.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.affine(params, x)?;
        let a = self.activate(&z);

        self.x = x.to_owned();
        self.z = z;
        Ok(a)
    }

    /// Computes the layer's output without touching the cached metadata.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.affine(params, x)?;
        Ok(self.activate(&z))
    }

    /// Writes this layer's gradient into `grad` and propagates the delta backwards.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `grad` - This layer's slice of the gradient.
    /// * `d` - The delta with respect to this layer's output.
    ///
    /// # Returns
    /// The delta with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    fn affine(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input width",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = x.dot(&w);
        z += &b;
        Ok(z)
    }

    fn activate(&self, z: &Array2<f32>) -> Array2<f32> {
        match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        }
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // w = [[1, 2], [3, 4], [5, 6]], b = [0.5, -100]
    const PARAMS: [f32; 8] = [1., 2., 3., 4., 5., 6., 0.5, -100.];

    #[test]
    fn forward_is_affine_then_activation() {
        let mut dense = Dense::new((3, 2), Some(ActFn::relu()));
        let x = array![[1., 0., 1.], [0., 1., 0.]];

        let a = dense.forward(&PARAMS, x.view()).unwrap();
        assert_eq!(a, array![[6.5f32, 0.], [3.5, 0.]]);
        assert_eq!(dense.predict(&PARAMS, x.view()).unwrap(), a);
    }

    #[test]
    fn backward_writes_the_gradient() {
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 2., 3.]];
        dense.forward(&PARAMS, x.view()).unwrap();

        let mut grad = [0.; 8];
        let d = dense
            .backward(&PARAMS, &mut grad, array![[1., -1.]])
            .unwrap();

        assert_eq!(grad, [1., -1., 2., -2., 3., -3., 1., -1.]);
        assert_eq!(d, array![[-1f32, -1., -1.]]);
    }

    #[test]
    fn rejects_wrong_widths() {
        let mut dense = Dense::new((3, 2), None);

        assert!(dense.forward(&PARAMS[..7], array![[1., 2., 3.]].view()).is_err());
        assert!(dense.forward(&PARAMS, array![[1., 2.]].view()).is_err());
    }
}
