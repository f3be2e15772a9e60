use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Categorical cross entropy over probability rows and one-hot targets.
#[derive(Clone, Copy, Debug)]
pub struct CrossEntropy {
    epsilon: f32,
}

impl CrossEntropy {
    /// Returns a new `CrossEntropy` that clamps predictions into `[epsilon, 1 - epsilon]`.
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    fn clamp(&self, p: f32) -> f32 {
        p.clamp(self.epsilon, 1. - self.epsilon)
    }
}

impl Default for CrossEntropy {
    fn default() -> Self {
        Self::new(1e-7)
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let rows = y_pred.nrows().max(1) as f32;
        let mut total = 0.;

        Zip::from(&y_pred).and(&y).for_each(|&p, &t| {
            total -= t * self.clamp(p).ln();
        });

        total / rows
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let rows = y_pred.nrows().max(1) as f32;

        Zip::from(&y_pred)
            .and(&y)
            .map_collect(|&p, &t| -t / (self.clamp(p) * rows))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn perfect_prediction_has_near_zero_loss() {
        let ce = CrossEntropy::default();
        let y = array![[0f32, 1.], [1., 0.]];

        assert!(ce.loss(y.view(), y.view()) < 1e-5);
    }

    #[test]
    fn uniform_prediction_loss_is_ln_of_classes() {
        let ce = CrossEntropy::default();
        let y_pred = array![[0.25f32, 0.25, 0.25, 0.25]];
        let y = array![[0f32, 0., 1., 0.]];

        assert!((ce.loss(y_pred.view(), y.view()) - 4f32.ln()).abs() < 1e-5);

        let d = ce.loss_prime(y_pred.view(), y.view());
        assert_eq!(d, array![[0f32, 0., -4., 0.]]);
    }
}
