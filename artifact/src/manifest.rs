use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::{
    ArtifactErr, FORMAT, FORMAT_VERSION, Result,
    specs::{BackboneSpec, ModelSpec},
};

const LITTLE_ENDIAN: &str = "little";

/// The element type of a persisted weight tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    Float32,
}

impl Dtype {
    /// Returns the amount of bytes a single element takes in the blob.
    pub fn size(self) -> usize {
        match self {
            Dtype::Float32 => size_of::<f32>(),
        }
    }
}

/// Locates a single weight tensor inside the weight blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: Dtype,
    /// Byte offset of the first element within the blob.
    pub offset: usize,
}

impl WeightSpec {
    /// Returns the amount of bytes the tensor takes in the blob.
    pub fn byte_len(&self) -> usize {
        self.shape.iter().product::<usize>() * self.dtype.size()
    }
}

/// A weight blob file and the tensors it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightGroup {
    pub paths: Vec<String>,
    pub weights: Vec<WeightSpec>,
}

/// The document linking a model's topology to its binary weight blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: String,
    pub format_version: u32,
    pub generated_by: String,
    pub byte_order: String,
    pub topology: ModelSpec,
    pub backbone: BackboneSpec,
    pub weights_manifest: Vec<WeightGroup>,
}

impl Manifest {
    /// Creates a new `Manifest` whose weight specs pack the topology's tensors back to back
    /// in a single blob.
    ///
    /// # Arguments
    /// * `topology` - The head's topology.
    /// * `backbone` - The feature extractor the head was trained on.
    /// * `weights_file` - The blob's file name, relative to the manifest.
    ///
    /// # Returns
    /// A new `Manifest` instance.
    pub fn new(topology: ModelSpec, backbone: BackboneSpec, weights_file: &str) -> Self {
        let mut offset = 0;
        let weights = topology
            .weight_shapes()
            .into_iter()
            .map(|(name, shape)| {
                let spec = WeightSpec {
                    name,
                    shape,
                    dtype: Dtype::Float32,
                    offset,
                };
                offset += spec.byte_len();
                spec
            })
            .collect();

        Self {
            format: FORMAT.to_string(),
            format_version: FORMAT_VERSION,
            generated_by: concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).into(),
            byte_order: LITTLE_ENDIAN.to_string(),
            topology,
            backbone,
            weights_manifest: vec![WeightGroup {
                paths: vec![format!("./{weights_file}")],
                weights,
            }],
        }
    }

    /// Returns the blob path relative to the model directory.
    ///
    /// # Returns
    /// The relative path or an error if there isn't exactly one blob or its path escapes the
    /// model directory.
    pub fn weights_path(&self) -> Result<&Path> {
        let group = self.single_group()?;

        let [path] = group.paths.as_slice() else {
            return Err(ArtifactErr::InvalidWeightPath(group.paths.join(",")));
        };

        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if escapes || rel.file_name().is_none() {
            return Err(ArtifactErr::InvalidWeightPath(path.clone()));
        }

        Ok(rel)
    }

    /// Returns the weight specs in blob order.
    pub fn weight_specs(&self) -> Result<&[WeightSpec]> {
        Ok(&self.single_group()?.weights)
    }

    /// Validates that this manifest can be read by this crate and that it totally describes
    /// a blob of `blob_len` bytes.
    ///
    /// # Arguments
    /// * `blob_len` - The length in bytes of the weight blob.
    ///
    /// # Returns
    /// An error describing the first violation found.
    pub fn validate(&self, blob_len: usize) -> Result<()> {
        if self.format != FORMAT || self.format_version != FORMAT_VERSION {
            return Err(ArtifactErr::UnsupportedFormat {
                format: self.format.clone(),
                version: self.format_version,
            });
        }

        if self.byte_order != LITTLE_ENDIAN || cfg!(target_endian = "big") {
            return Err(ArtifactErr::UnsupportedByteOrder(self.byte_order.clone()));
        }

        self.topology.check().map_err(ArtifactErr::InvalidTopology)?;

        let specs = self.weight_specs()?;
        let expected_shapes = self.topology.weight_shapes();

        if specs.len() != expected_shapes.len() {
            return Err(ArtifactErr::InvalidTopology(format!(
                "manifest lists {} weights, topology has {}",
                specs.len(),
                expected_shapes.len()
            )));
        }

        let mut cursor = 0;

        for (spec, (name, shape)) in specs.iter().zip(expected_shapes) {
            if spec.name != name || spec.shape != shape {
                return Err(ArtifactErr::WeightShape {
                    name: spec.name.clone(),
                    got: spec.shape.clone(),
                    expected: shape,
                });
            }

            if spec.offset != cursor {
                return Err(ArtifactErr::WeightLayout {
                    name: spec.name.clone(),
                    offset: spec.offset,
                    expected: cursor,
                });
            }

            cursor += spec.byte_len();
        }

        if cursor != blob_len {
            return Err(ArtifactErr::BlobLength {
                got: blob_len,
                expected: cursor,
            });
        }

        Ok(())
    }

    fn single_group(&self) -> Result<&WeightGroup> {
        match self.weights_manifest.as_slice() {
            [group] => Ok(group),
            groups => Err(ArtifactErr::InvalidWeightPath(format!(
                "expected a single weight group, found {}",
                groups.len()
            ))),
        }
    }
}
