use std::{cell::RefCell, fs, path::Path, rc::Rc};

use artifact::specs::BackboneSpec;
use log::debug;
use ndarray::prelude::*;
use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use safetensors::{Dtype, SafeTensors};

use super::FeatureExtractor;
use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandWeightGen},
};

const WEIGHT_TENSOR: &str = "patch_embed.weight";
const BIAS_TENSOR: &str = "patch_embed.bias";
const RGB: usize = 3;

/// A patch-embedding backbone: the image is cut into non-overlapping `patch x patch` tiles,
/// each tile is projected by a frozen matrix and rectified, and the resulting map is average
/// pooled down to `grid x grid` cells. Features are laid out cell by cell, row-major, with
/// the channels of each cell contiguous.
#[derive(Debug, Clone)]
pub struct PatchEmbed {
    image_size: usize,
    patch: usize,
    grid: usize,
    /// `(patch * patch * 3, channels)`, tile values ordered `(dy, dx, rgb)`.
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl PatchEmbed {
    /// Creates a new `PatchEmbed`.
    ///
    /// # Arguments
    /// * `image_size` - The side of the square input images.
    /// * `patch` - The side of each tile, must divide `image_size`.
    /// * `grid` - The side of the pooled map, at most `image_size / patch`.
    /// * `weight` - The projection matrix.
    /// * `bias` - The projection bias.
    ///
    /// # Returns
    /// A new `PatchEmbed` or an error if the geometry or the weight shapes are inconsistent.
    pub fn new(
        image_size: usize,
        patch: usize,
        grid: usize,
        weight: Array2<f32>,
        bias: Array1<f32>,
    ) -> Result<Self> {
        if patch == 0 || image_size == 0 || image_size % patch != 0 {
            return Err(MlErr::InvalidBackbone(format!(
                "patch size {patch} must divide the image size {image_size}"
            )));
        }

        let side = image_size / patch;
        if grid == 0 || grid > side {
            return Err(MlErr::InvalidBackbone(format!(
                "grid {grid} must be within 1..={side}"
            )));
        }

        if weight.nrows() != patch * patch * RGB || weight.ncols() == 0 {
            return Err(MlErr::InvalidBackbone(format!(
                "projection must be ({}, channels), got {:?}",
                patch * patch * RGB,
                weight.dim()
            )));
        }

        if bias.len() != weight.ncols() {
            return Err(MlErr::SizeMismatch {
                what: "backbone bias",
                got: bias.len(),
                expected: weight.ncols(),
            });
        }

        Ok(Self {
            image_size,
            patch,
            grid,
            weight,
            bias,
        })
    }

    /// Creates a `PatchEmbed` whose projection is drawn from a Kaiming normal distribution
    /// seeded with `seed`. The same arguments always yield the same backbone.
    pub fn seeded(
        image_size: usize,
        patch: usize,
        channels: usize,
        grid: usize,
        seed: u64,
    ) -> Result<Self> {
        let fan_in = patch * patch * RGB;
        let len = fan_in * channels;

        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
        let mut param_gen = RandWeightGen::kaiming(rng, len, fan_in.max(1))?;
        let values = param_gen.sample(len).unwrap_or_default();

        let weight = Array2::from_shape_vec((fan_in, channels), values)?;
        Self::new(image_size, patch, grid, weight, Array1::zeros(channels))
    }

    /// Creates a `PatchEmbed` reading the `patch_embed.weight` and `patch_embed.bias` f32
    /// tensors from a safetensors file.
    pub fn from_safetensors<P: AsRef<Path>>(
        path: P,
        image_size: usize,
        patch: usize,
        grid: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| MlErr::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let tensors = SafeTensors::deserialize(&bytes)?;

        let (shape, values) = read_f32(&tensors, WEIGHT_TENSOR)?;
        let [rows, cols] = shape[..] else {
            return Err(MlErr::InvalidBackbone(format!(
                "{WEIGHT_TENSOR} must be 2-dimensional, got {shape:?}"
            )));
        };
        let weight = Array2::from_shape_vec((rows, cols), values)?;

        let (shape, values) = read_f32(&tensors, BIAS_TENSOR)?;
        if shape.len() != 1 {
            return Err(MlErr::InvalidBackbone(format!(
                "{BIAS_TENSOR} must be 1-dimensional, got {shape:?}"
            )));
        }
        let bias = Array1::from_vec(values);

        debug!("loaded backbone projection {rows}x{cols} from {}", path.display());
        Self::new(image_size, patch, grid, weight, bias)
    }

    /// Creates the backbone a `BackboneSpec` describes.
    pub fn from_spec(spec: &BackboneSpec) -> Result<Self> {
        match spec {
            &BackboneSpec::Seeded {
                image_size,
                patch,
                channels,
                grid,
                seed,
            } => Self::seeded(image_size, patch, channels, grid, seed),
            BackboneSpec::Safetensors {
                path,
                image_size,
                patch,
                grid,
            } => Self::from_safetensors(path, *image_size, *patch, *grid),
        }
    }

    fn channels(&self) -> usize {
        self.weight.ncols()
    }

    fn side(&self) -> usize {
        self.image_size / self.patch
    }

    /// Embeds a single `(image_size, image_size, 3)` image.
    fn embed(&self, image: ArrayView3<f32>) -> Vec<f32> {
        let p = self.patch;
        let side = self.side();

        let tiles = Array2::from_shape_fn((side * side, p * p * RGB), |(k, j)| {
            let (ty, tx) = (k / side, k % side);
            let (dy, rest) = (j / (p * RGB), j % (p * RGB));
            let (dx, c) = (rest / RGB, rest % RGB);
            image[[ty * p + dy, tx * p + dx, c]]
        });

        let mut map = tiles.dot(&self.weight);
        map += &self.bias;
        map.mapv_inplace(|v| v.max(0.));

        let mut features = Vec::with_capacity(self.feature_dim());

        for gy in 0..self.grid {
            let (y0, y1) = pool_bin(gy, side, self.grid);

            for gx in 0..self.grid {
                let (x0, x1) = pool_bin(gx, side, self.grid);
                let mut cell = Array1::<f32>::zeros(self.channels());

                for y in y0..y1 {
                    for x in x0..x1 {
                        cell += &map.row(y * side + x);
                    }
                }

                cell /= ((y1 - y0) * (x1 - x0)) as f32;
                features.extend(cell.iter());
            }
        }

        features
    }
}

impl FeatureExtractor for PatchEmbed {
    fn image_size(&self) -> usize {
        self.image_size
    }

    fn feature_dim(&self) -> usize {
        self.grid * self.grid * self.channels()
    }

    fn extract(&self, images: ArrayView4<f32>) -> Result<Array2<f32>> {
        let (batch, h, w, c) = images.dim();

        if h != self.image_size || w != self.image_size || c != RGB {
            return Err(MlErr::InvalidBackbone(format!(
                "expected ({}, {}, {RGB}) images, got ({h}, {w}, {c})",
                self.image_size, self.image_size
            )));
        }

        let rows: Vec<Vec<f32>> = (0..batch)
            .into_par_iter()
            .map(|i| self.embed(images.index_axis(Axis(0), i)))
            .collect();

        let flat = rows.concat();
        Ok(Array2::from_shape_vec((batch, self.feature_dim()), flat)?)
    }
}

/// Returns the `[start, end)` range of cells pooled into output bin `i` when `n` cells are
/// reduced to `bins`.
fn pool_bin(i: usize, n: usize, bins: usize) -> (usize, usize) {
    (i * n / bins, ((i + 1) * n).div_ceil(bins))
}

fn read_f32(tensors: &SafeTensors<'_>, name: &str) -> Result<(Vec<usize>, Vec<f32>)> {
    let view = tensors.tensor(name)?;

    if view.dtype() != Dtype::F32 {
        return Err(MlErr::InvalidBackbone(format!(
            "{name} must be f32, found {:?}",
            view.dtype()
        )));
    }

    Ok((view.shape().to_vec(), bytemuck::pod_collect_to_vec(view.data())))
}
