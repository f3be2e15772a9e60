use std::path::Path;

use log::debug;
use machine_learning::{features::normalize_rgba, training::argmax};
use ndarray::Axis;
use serde::Serialize;
use worker::RawImage;

use crate::{InferenceContext, InferenceErr, Result};

/// The head's verdict on a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The index of the top class.
    pub index: usize,
    pub label: String,
    /// The top class's score, in `[0, 1]`.
    pub confidence: f32,
    /// Every class's score, in class order.
    pub scores: Vec<ClassScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScore {
    pub label: String,
    pub score: f32,
}

impl InferenceContext {
    /// Decodes and classifies the image at `path`.
    ///
    /// # Arguments
    /// * `path` - The image file.
    ///
    /// # Returns
    /// The prediction or an error if the image can't be decoded or scored. Every tensor
    /// created along the way is released before this returns.
    pub fn classify(&self, path: &Path) -> Result<Prediction> {
        let raw = self.ledger.track(self.decoder.decode(path)?);
        debug!("decoded {} ({}x{})", path.display(), raw.width, raw.height);
        self.classify_pixels(&raw)
    }

    /// Classifies an already decoded frame. It must have the backbone's dimensions.
    pub fn classify_pixels(&self, raw: &RawImage) -> Result<Prediction> {
        let (width, height) = (raw.width as usize, raw.height as usize);
        let size = self.extractor.image_size();

        if width != size || height != size {
            return Err(InferenceErr::Incompatible(format!(
                "expected a {size}x{size} frame, got {width}x{height}"
            )));
        }

        let image = self.ledger.track(normalize_rgba(&raw.pixels, height, width)?);
        let batch = image.view().insert_axis(Axis(0));

        let features = self.ledger.track(self.extractor.extract(batch)?);
        let probs = self
            .ledger
            .track(self.head.predict(&self.params, features.view())?);

        let scores = probs.outer_iter().next().ok_or(InferenceErr::NoScores)?;
        let index = argmax(scores).ok_or(InferenceErr::NoScores)?;

        Ok(Prediction {
            index,
            label: self.label(index),
            confidence: scores[index],
            scores: scores
                .iter()
                .enumerate()
                .map(|(i, &score)| ClassScore {
                    label: self.label(i),
                    score,
                })
                .collect(),
        })
    }

    /// Returns the name of class `index`, or a placeholder when the artifact had no names.
    pub fn label(&self, index: usize) -> String {
        self.class_names
            .as_ref()
            .and_then(|names| names.get(index))
            .cloned()
            .unwrap_or_else(|| format!("Class {index}"))
    }
}
