use std::{path::Path, sync::Arc};

use artifact::ModelArtifact;
use log::info;
use machine_learning::{
    arch::{ModelBuilder, Sequential},
    features::{FeatureExtractor, PatchEmbed},
    memory::TensorLedger,
};
use worker::{CoverDecoder, ImageDecoder};

use crate::{InferenceErr, Result};

/// Everything a request needs, built once at startup and never mutated afterwards.
pub struct InferenceContext {
    pub(crate) decoder: Arc<dyn ImageDecoder>,
    pub(crate) extractor: Arc<dyn FeatureExtractor>,
    pub(crate) head: Sequential,
    pub(crate) params: Vec<f32>,
    pub(crate) num_classes: usize,
    pub(crate) class_names: Option<Vec<String>>,
    pub(crate) ledger: TensorLedger,
}

impl InferenceContext {
    /// Loads the artifact in `dir` and rebuilds the backbone it was trained on.
    ///
    /// # Arguments
    /// * `dir` - The model directory written by a training run.
    ///
    /// # Returns
    /// The ready context or an error if any piece is missing or inconsistent.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let artifact = ModelArtifact::load(dir)?;

        let extractor = PatchEmbed::from_spec(&artifact.backbone)?;
        let size = u32::try_from(artifact.backbone.image_size())
            .map_err(|e| InferenceErr::Incompatible(e.to_string()))?;

        let context = Self::from_parts(
            artifact,
            Arc::new(extractor),
            Arc::new(CoverDecoder::new(size)),
        )?;

        info!(
            classes = context.num_classes(),
            labelled = context.class_names.is_some();
            "model loaded from {}",
            dir.display()
        );

        Ok(context)
    }

    /// Assembles a context from an already loaded artifact.
    ///
    /// # Arguments
    /// * `artifact` - The trained head.
    /// * `extractor` - The backbone the head was trained on.
    /// * `decoder` - Produces `image_size x image_size` frames for the backbone.
    ///
    /// # Returns
    /// The context or `Incompatible` if the backbone's output doesn't fit the head's input.
    pub fn from_parts(
        artifact: ModelArtifact,
        extractor: Arc<dyn FeatureExtractor>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Result<Self> {
        let input_dim = artifact.topology.input_dim().unwrap_or_default();

        if extractor.feature_dim() != input_dim {
            return Err(InferenceErr::Incompatible(format!(
                "backbone emits {} features, head expects {input_dim}",
                extractor.feature_dim()
            )));
        }

        let head = ModelBuilder::new().build(&artifact.topology)?;
        let num_classes = artifact.topology.output_dim().unwrap_or_default();

        Ok(Self {
            decoder,
            extractor,
            head,
            params: artifact.params,
            num_classes,
            class_names: artifact.class_names,
            ledger: TensorLedger::new(),
        })
    }

    /// Returns the amount of classes the head scores.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn class_names(&self) -> Option<&[String]> {
        self.class_names.as_deref()
    }

    /// Returns the ledger every request's tensors are registered in.
    pub fn ledger(&self) -> &TensorLedger {
        &self.ledger
    }
}
