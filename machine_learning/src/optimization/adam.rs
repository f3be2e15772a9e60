use super::Optimizer;
use crate::{MlErr, Result};

#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    m: Box<[f32]>,
    v: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }

    /// Creates a new `Adam` optimizer with `beta1 = 0.9`, `beta2 = 0.999` and `epsilon = 1e-7`.
    pub fn with_learning_rate(len: usize, learning_rate: f32) -> Self {
        Self::new(len, learning_rate, 0.9, 0.999, 1e-7)
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        if grad.len() != params.len() || params.len() != self.m.len() {
            return Err(MlErr::SizeMismatch {
                what: "adam state",
                got: params.len(),
                expected: self.m.len(),
            });
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .for_each(|(((p, g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g.powi(2);
                *p -= step_size * *m / (v.sqrt() + eps);
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_the_learning_rate() {
        let mut adam = Adam::with_learning_rate(2, 0.1);
        let mut params = [1.0, -1.0];

        adam.update_params(&mut params, &[4.0, -0.5]).unwrap();

        assert!((params[0] - 0.9).abs() < 1e-4);
        assert!((params[1] + 0.9).abs() < 1e-4);
    }

    #[test]
    fn rejects_mismatched_sizes() {
        let mut adam = Adam::with_learning_rate(2, 0.1);
        let mut params = [1.0, -1.0, 0.0];

        assert!(adam.update_params(&mut params, &[0.0; 3]).is_err());
        assert!(adam.update_params(&mut params[..2], &[0.0; 3]).is_err());
    }
}
