mod error;
mod manifest;
mod model;
pub mod specs;

pub use error::{ArtifactErr, Result};
pub use manifest::{Dtype, Manifest, WeightGroup, WeightSpec};
pub use model::ModelArtifact;

/// The manifest document's file name inside a model directory.
pub const MANIFEST_FILE: &str = "model.json";

/// The weight blob's file name inside a model directory.
pub const WEIGHTS_FILE: &str = "weights.bin";

/// The class-name list's file name inside a model directory.
pub const LABELS_FILE: &str = "labels.json";

/// The value of the manifest's `format` field.
pub const FORMAT: &str = "transfer-head";

/// The manifest layout version this crate reads and writes.
pub const FORMAT_VERSION: u32 = 1;
