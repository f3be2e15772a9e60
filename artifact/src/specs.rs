use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Serializable descriptor of an activation function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Relu,
}

/// Serializable descriptor of a single layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
    Softmax {
        dim: usize,
    },
}

impl LayerSpec {
    /// Returns the `(input, output)` widths of the layer.
    pub fn dims(&self) -> (usize, usize) {
        match *self {
            LayerSpec::Dense { dim, .. } => dim,
            LayerSpec::Softmax { dim } => (dim, dim),
        }
    }
}

/// Serializable descriptor of a whole model, it doubles as the topology
/// persisted in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential { layers: Vec<LayerSpec> },
}

impl ModelSpec {
    /// Returns the layer list of the model.
    pub fn layers(&self) -> &[LayerSpec] {
        match self {
            ModelSpec::Sequential { layers } => layers,
        }
    }

    /// Returns the width of the model's input, `None` when it has no layers.
    pub fn input_dim(&self) -> Option<usize> {
        self.layers().first().map(|l| l.dims().0)
    }

    /// Returns the width of the model's output, `None` when it has no layers.
    pub fn output_dim(&self) -> Option<usize> {
        self.layers().last().map(|l| l.dims().1)
    }

    /// Checks that the model has layers and that every layer's input width matches the
    /// previous layer's output width.
    ///
    /// # Returns
    /// A description of the first inconsistency found.
    pub fn check(&self) -> Result<(), String> {
        let layers = self.layers();

        if layers.is_empty() {
            return Err("model must have at least one layer".into());
        }

        for (i, pair) in layers.windows(2).enumerate() {
            let prev = pair[0].dims().1;
            let curr = pair[1].dims().0;

            if prev != curr {
                return Err(format!(
                    "layer {}: input size ({curr}) does not match previous layer output size ({prev})",
                    i + 1
                ));
            }
        }

        Ok(())
    }

    /// Lists the named weight tensors of the model in the order their values are laid out
    /// in the flat parameter buffer.
    ///
    /// # Returns
    /// A list of `(name, shape)` pairs.
    pub fn weight_shapes(&self) -> Vec<(String, Vec<usize>)> {
        let mut shapes = Vec::new();
        let mut dense = 0;

        for layer in self.layers() {
            if let LayerSpec::Dense { dim: (n, m), .. } = *layer {
                dense += 1;
                shapes.push((format!("dense_{dense}/kernel"), vec![n, m]));
                shapes.push((format!("dense_{dense}/bias"), vec![m]));
            }
        }

        shapes
    }

    /// Returns the amount of parameters of the model.
    pub fn size(&self) -> usize {
        self.weight_shapes()
            .iter()
            .map(|(_, shape)| shape.iter().product::<usize>())
            .sum()
    }
}

/// Describes the frozen feature extractor that feeds the head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackboneSpec {
    /// Patch-embedding projection generated from a seed.
    Seeded {
        image_size: usize,
        patch: usize,
        channels: usize,
        grid: usize,
        seed: u64,
    },
    /// Patch-embedding projection read from a safetensors file.
    Safetensors {
        path: PathBuf,
        image_size: usize,
        patch: usize,
        grid: usize,
    },
}

impl BackboneSpec {
    /// Returns the side length of the square images the backbone consumes.
    pub fn image_size(&self) -> usize {
        match *self {
            BackboneSpec::Seeded { image_size, .. } | BackboneSpec::Safetensors { image_size, .. } => {
                image_size
            }
        }
    }
}

impl Default for BackboneSpec {
    fn default() -> Self {
        BackboneSpec::Seeded {
            image_size: 224,
            patch: 16,
            channels: 64,
            grid: 2,
            seed: 0x5eed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(features: usize, hidden: usize, classes: usize) -> ModelSpec {
        ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Dense {
                    dim: (features, hidden),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dense {
                    dim: (hidden, classes),
                    act_fn: None,
                },
                LayerSpec::Softmax { dim: classes },
            ],
        }
    }

    #[test]
    fn weight_shapes_follow_layer_order() {
        let spec = head(4, 3, 2);

        let shapes = spec.weight_shapes();
        assert_eq!(
            shapes,
            vec![
                ("dense_1/kernel".to_string(), vec![4, 3]),
                ("dense_1/bias".to_string(), vec![3]),
                ("dense_2/kernel".to_string(), vec![3, 2]),
                ("dense_2/bias".to_string(), vec![2]),
            ]
        );
        assert_eq!(spec.size(), 4 * 3 + 3 + 3 * 2 + 2);
        assert_eq!(spec.input_dim(), Some(4));
        assert_eq!(spec.output_dim(), Some(2));
    }

    #[test]
    fn check_rejects_mismatched_layers() {
        let spec = ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Dense {
                    dim: (4, 3),
                    act_fn: None,
                },
                LayerSpec::Softmax { dim: 2 },
            ],
        };

        assert!(spec.check().is_err());
        assert!(head(4, 3, 2).check().is_ok());
        assert!(ModelSpec::Sequential { layers: vec![] }.check().is_err());
    }

    #[test]
    fn backbone_spec_is_tagged() {
        let json = serde_json::to_value(BackboneSpec::default()).unwrap();
        assert_eq!(json["kind"], "seeded");
        assert_eq!(json["image_size"], 224);
    }
}
