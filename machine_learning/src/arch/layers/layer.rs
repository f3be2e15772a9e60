use artifact::specs::LayerSpec;
use ndarray::{Array2, ArrayView2};

use super::{Dense, Softmax};
use crate::{Result, arch::activations::ActFn};

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    Softmax(Softmax),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn softmax(dim: usize) -> Self {
        Self::Softmax(Softmax::new(dim))
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Layer::Dense(l) => l.size(),
            Layer::Softmax(_) => 0,
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.forward(params, x),
            Layer::Softmax(l) => l.forward(x),
        }
    }

    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.predict(params, x),
            Layer::Softmax(l) => l.predict(x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.backward(params, grad, d),
            Layer::Softmax(l) => l.backward(d),
        }
    }
}

impl From<LayerSpec> for Layer {
    fn from(spec: LayerSpec) -> Self {
        match spec {
            LayerSpec::Dense { dim, act_fn } => Layer::dense(dim, act_fn.map(Into::into)),
            LayerSpec::Softmax { dim } => Layer::softmax(dim),
        }
    }
}
