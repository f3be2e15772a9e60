use std::{cell::RefCell, rc::Rc};

use artifact::specs::{LayerSpec, ModelSpec};
use rand::Rng;

use super::{Model, Sequential, layers::Layer};
use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandWeightGen},
};

/// Builds models and their initial parameters given a specification.
#[derive(Default)]
pub struct ModelBuilder;

impl ModelBuilder {
    /// Creates a new `ModelBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new model following a spec.
    ///
    /// # Arguments
    /// * `spec` - The model descriptor.
    ///
    /// # Returns
    /// The model or an error if the layers don't chain.
    pub fn build(&self, spec: &ModelSpec) -> Result<Sequential> {
        spec.check().map_err(MlErr::InvalidModel)?;

        match spec {
            ModelSpec::Sequential { layers } => {
                let layers = layers.iter().map(|&ls| Layer::from(ls));
                Ok(Sequential::new(layers))
            }
        }
    }

    /// Generates the initial parameters for a model: Xavier uniform kernels and zero biases.
    ///
    /// # Arguments
    /// * `spec` - The model descriptor.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// A flat parameter buffer laid out as the built model expects.
    pub fn init_params<R: Rng>(&self, spec: &ModelSpec, rng: R) -> Result<Vec<f32>> {
        let rng = Rc::new(RefCell::new(rng));
        let mut params = Vec::with_capacity(spec.size());

        for layer in spec.layers() {
            let LayerSpec::Dense { dim: (n, m), .. } = *layer else {
                continue;
            };

            let mut kernel = RandWeightGen::xavier_uniform(rng.clone(), n * m, n, m)?;
            params.extend(kernel.sample(n * m).unwrap_or_default());
            params.resize(params.len() + m, 0.);
        }

        let model = self.build(spec)?;
        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "initial parameters",
                got: params.len(),
                expected: model.size(),
            });
        }

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use artifact::specs::ActFnSpec;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn spec() -> ModelSpec {
        ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Dense {
                    dim: (2, 4),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dense {
                    dim: (4, 3),
                    act_fn: None,
                },
                LayerSpec::Softmax { dim: 3 },
            ],
        }
    }

    #[test]
    fn builds_a_model_matching_the_spec() {
        let builder = ModelBuilder::new();
        let spec = spec();

        let model = builder.build(&spec).unwrap();
        assert_eq!(model.size(), spec.size());

        let params = builder
            .init_params(&spec, StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(params.len(), spec.size());

        // biases of the first layer
        assert!(params[8..12].iter().all(|&b| b == 0.));

        let range = (6f32 / 6.).sqrt();
        assert!(params[..8].iter().all(|w| w.abs() <= range));

        let y = model.predict(&params, array![[0.5f32, -0.5]].view()).unwrap();
        assert_eq!(y.dim(), (1, 3));
        assert!((y.sum() - 1.).abs() < 1e-6);
    }

    #[test]
    fn same_seed_same_params() {
        let builder = ModelBuilder::new();
        let a = builder.init_params(&spec(), StdRng::seed_from_u64(1)).unwrap();
        let b = builder.init_params(&spec(), StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn rejects_broken_specs() {
        let spec = ModelSpec::Sequential {
            layers: vec![LayerSpec::Softmax { dim: 3 }, LayerSpec::Softmax { dim: 2 }],
        };

        assert!(ModelBuilder::new().build(&spec).is_err());
    }
}
