use std::{mem, num::NonZeroUsize, sync::Arc};

use log::{debug, info};
use machine_learning::{
    MlErr,
    dataset::one_hot,
    features::{FeatureExtractor, normalize_rgba},
    memory::{TensorLedger, Tracked},
};
use ndarray::{Array1, Array2, Array3, Axis, concatenate, stack};
use worker::DecodedImage;

use crate::{OrchestratorError, Result};

/// The extracted features of a single flush and their one-hot labels, row for row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBatch {
    /// `(rows, feature_dim)`.
    pub features: Array2<f32>,
    /// `(rows, num_classes)`.
    pub labels: Array2<f32>,
}

impl FeatureBatch {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn widths(&self) -> (usize, usize) {
        (self.features.ncols(), self.labels.ncols())
    }
}

/// The completed batches waiting for the final merge.
#[derive(Debug, Default)]
pub struct BatchStore {
    batches: Vec<Tracked<FeatureBatch>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: Tracked<FeatureBatch>) {
        self.batches.push(batch);
    }

    /// Returns the amount of stored batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Returns the total amount of rows across every stored batch.
    pub fn rows(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }

    /// Concatenates every stored batch along the batch axis. The stored batches are released
    /// before this returns, on success and on failure.
    ///
    /// # Returns
    /// The merged `(features, labels)` pair, or `EmptyTrainingSet` if there are no rows and
    /// `BatchShapeMismatch` if a batch disagrees with the first one on a non-batch width.
    pub fn merge(self) -> Result<(Array2<f32>, Array2<f32>)> {
        let batches = self.batches;

        let Some(first) = batches.first() else {
            return Err(OrchestratorError::EmptyTrainingSet);
        };

        let expected = first.widths();

        for (batch, stored) in batches.iter().enumerate() {
            let got = stored.widths();
            if got != expected {
                return Err(OrchestratorError::BatchShapeMismatch {
                    batch,
                    expected,
                    got,
                });
            }
        }

        let rows: usize = batches.iter().map(|b| b.len()).sum();
        if rows == 0 {
            return Err(OrchestratorError::EmptyTrainingSet);
        }

        let feature_views: Vec<_> = batches.iter().map(|b| b.features.view()).collect();
        let label_views: Vec<_> = batches.iter().map(|b| b.labels.view()).collect();

        let features = concatenate(Axis(0), &feature_views).map_err(MlErr::from)?;
        let labels = concatenate(Axis(0), &label_views).map_err(MlErr::from)?;

        drop(feature_views);
        drop(label_views);
        drop(batches);

        info!(rows = rows, features = expected.0, classes = expected.1; "batches merged");

        Ok((features, labels))
    }
}

/// Everything the assembler produced once the decode stream ends.
#[derive(Debug)]
pub struct Assembled {
    pub store: BatchStore,
    /// The size of every flush, in flush order.
    pub flushes: Vec<usize>,
    pub processed: usize,
}

/// Turns the stream of decoded images into feature batches. Normalized images and their
/// labels accumulate until `batch_size` of them are pending, then the whole group goes
/// through the extractor in a single pass and only the resulting features are kept.
pub struct BatchAssembler {
    extractor: Arc<dyn FeatureExtractor>,
    ledger: TensorLedger,
    num_classes: usize,
    batch_size: usize,

    images: Vec<Tracked<Array3<f32>>>,
    labels: Vec<Tracked<Array1<f32>>>,
    processed: usize,
    flushes: Vec<usize>,
    store: BatchStore,
}

impl BatchAssembler {
    /// Creates a new `BatchAssembler`.
    ///
    /// # Arguments
    /// * `extractor` - The frozen backbone.
    /// * `ledger` - Where every pending and stored tensor is registered.
    /// * `num_classes` - The width of the one-hot labels.
    /// * `batch_size` - The amount of pending images that triggers a flush.
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        ledger: TensorLedger,
        num_classes: usize,
        batch_size: NonZeroUsize,
    ) -> Self {
        let batch_size = batch_size.get();

        Self {
            extractor,
            ledger,
            num_classes,
            batch_size,
            images: Vec::with_capacity(batch_size),
            labels: Vec::with_capacity(batch_size),
            processed: 0,
            flushes: Vec::new(),
            store: BatchStore::new(),
        }
    }

    /// Normalizes a decoded image and queues it with its one-hot label, flushing when the
    /// batch is full.
    ///
    /// # Arguments
    /// * `image` - The decoded image, consumed.
    ///
    /// # Returns
    /// `InvalidImage` if this image alone is unusable, any other error is fatal.
    pub fn push(&mut self, image: DecodedImage) -> Result<()> {
        let size = self.extractor.image_size();
        let (width, height) = (image.width as usize, image.height as usize);

        if width != size || height != size {
            return Err(OrchestratorError::InvalidImage {
                path: image.path,
                detail: format!("expected {size}x{size} pixels, got {width}x{height}"),
            });
        }

        let tensor = normalize_rgba(&image.pixels, height, width).map_err(|e| {
            OrchestratorError::InvalidImage {
                path: image.path.clone(),
                detail: e.to_string(),
            }
        })?;

        let label = one_hot(&[image.label], self.num_classes)
            .map_err(|e| OrchestratorError::InvalidImage {
                path: image.path.clone(),
                detail: e.to_string(),
            })?
            .index_axis_move(Axis(0), 0);

        self.images.push(self.ledger.track(tensor));
        self.labels.push(self.ledger.track(label));

        if self.images.len() >= self.batch_size {
            self.flush()?;
        }

        Ok(())
    }

    /// Stacks the pending images, extracts their features in one pass and stores the result.
    /// Does nothing when nothing is pending. Every pending tensor is released before this
    /// returns, whatever the outcome.
    pub fn flush(&mut self) -> Result<()> {
        if self.images.is_empty() {
            return Ok(());
        }

        let images = mem::take(&mut self.images);
        let pending_labels = mem::take(&mut self.labels);
        let rows = images.len();

        let image_views: Vec<_> = images.iter().map(|t| t.view()).collect();
        let stacked = self
            .ledger
            .track(stack(Axis(0), &image_views).map_err(MlErr::from)?);
        drop(image_views);
        drop(images);

        let label_views: Vec<_> = pending_labels.iter().map(|t| t.view()).collect();
        let labels = stack(Axis(0), &label_views).map_err(MlErr::from)?;
        drop(label_views);
        drop(pending_labels);

        let features = self.extractor.extract(stacked.view())?;
        drop(stacked);

        self.store
            .push(self.ledger.track(FeatureBatch { features, labels }));
        self.processed += rows;
        self.flushes.push(rows);

        info!(
            batch = self.flushes.len(),
            rows = rows,
            processed = self.processed;
            "batch flushed"
        );
        debug!(live_tensors = self.ledger.live(); "after flush");

        Ok(())
    }

    /// Returns the amount of images waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.images.len()
    }

    /// Returns the amount of images already turned into features.
    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn flushes(&self) -> &[usize] {
        &self.flushes
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    /// Flushes whatever is still pending and hands over the stored batches.
    pub fn finish(mut self) -> Result<Assembled> {
        self.flush()?;

        Ok(Assembled {
            store: self.store,
            flushes: self.flushes,
            processed: self.processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use machine_learning::Result as MlResult;
    use ndarray::{ArrayView4, array};

    use super::*;

    const SIZE: usize = 2;

    /// Emits the mean of every image's red channel and a constant.
    struct MeanRed;

    impl FeatureExtractor for MeanRed {
        fn image_size(&self) -> usize {
            SIZE
        }

        fn feature_dim(&self) -> usize {
            2
        }

        fn extract(&self, images: ArrayView4<f32>) -> MlResult<Array2<f32>> {
            let mut out = Array2::zeros((images.len_of(Axis(0)), 2));
            for (i, image) in images.outer_iter().enumerate() {
                out[[i, 0]] = image.index_axis(Axis(2), 0).mean().unwrap_or_default();
                out[[i, 1]] = 1.;
            }
            Ok(out)
        }
    }

    struct Broken;

    impl FeatureExtractor for Broken {
        fn image_size(&self) -> usize {
            SIZE
        }

        fn feature_dim(&self) -> usize {
            2
        }

        fn extract(&self, _: ArrayView4<f32>) -> MlResult<Array2<f32>> {
            Err(MlErr::InvalidBackbone("broken".into()))
        }
    }

    fn image(value: u8, label: usize) -> DecodedImage {
        DecodedImage {
            pixels: vec![value; SIZE * SIZE * 4],
            width: SIZE as u32,
            height: SIZE as u32,
            label,
            path: PathBuf::from(format!("{value}.png")),
        }
    }

    fn assembler(
        extractor: Arc<dyn FeatureExtractor>,
        ledger: &TensorLedger,
        cap: usize,
    ) -> BatchAssembler {
        BatchAssembler::new(extractor, ledger.clone(), 3, NonZeroUsize::new(cap).unwrap())
    }

    #[test]
    fn flush_count_is_ceil_of_images_over_cap() {
        for (n, cap) in [(8, 5), (10, 5), (1, 5), (7, 1), (0, 3)] {
            let ledger = TensorLedger::new();
            let mut asm = assembler(Arc::new(MeanRed), &ledger, cap);

            for i in 0..n {
                asm.push(image(i as u8, i % 3)).unwrap();
            }

            let done = asm.finish().unwrap();

            assert_eq!(done.flushes.len(), n.div_ceil(cap));
            assert!(done.flushes.iter().rev().skip(1).all(|&s| s == cap));
            assert_eq!(done.flushes.iter().sum::<usize>(), n);
            assert_eq!(done.processed, n);
            assert_eq!(done.store.rows(), n);
        }
    }

    #[test]
    fn only_stored_batches_stay_alive_after_a_flush() {
        let ledger = TensorLedger::new();
        let mut asm = assembler(Arc::new(MeanRed), &ledger, 2);

        asm.push(image(0, 0)).unwrap();
        assert_eq!(asm.pending(), 1);
        assert_eq!(ledger.live(), 2);

        asm.push(image(255, 1)).unwrap();
        assert_eq!(asm.pending(), 0);
        assert_eq!(asm.flushes(), [2]);
        assert_eq!(ledger.live(), asm.store().len());

        let done = asm.finish().unwrap();
        let (x, y) = done.store.merge().unwrap();

        assert_eq!(ledger.live(), 0);
        assert_eq!(x, array![[-1f32, 1.], [1., 1.]]);
        assert_eq!(y, array![[1f32, 0., 0.], [0., 1., 0.]]);
    }

    #[test]
    fn failed_extraction_releases_pending_tensors() {
        let ledger = TensorLedger::new();
        let mut asm = assembler(Arc::new(Broken), &ledger, 2);

        asm.push(image(3, 0)).unwrap();
        let err = asm.push(image(4, 1)).unwrap_err();

        assert!(matches!(err, OrchestratorError::Ml(_)));
        assert_eq!(asm.pending(), 0);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn unusable_images_are_isolated() {
        let ledger = TensorLedger::new();
        let mut asm = assembler(Arc::new(MeanRed), &ledger, 4);

        let mut wrong_size = image(1, 0);
        wrong_size.width = 3;
        let mut short = image(2, 0);
        short.pixels.pop();

        for bad in [wrong_size, short, image(5, 7)] {
            assert!(matches!(
                asm.push(bad),
                Err(OrchestratorError::InvalidImage { .. })
            ));
        }

        assert_eq!(asm.pending(), 0);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn merge_rejects_mismatched_batches() {
        let ledger = TensorLedger::new();
        let mut store = BatchStore::new();

        store.push(ledger.track(FeatureBatch {
            features: Array2::zeros((2, 4)),
            labels: Array2::zeros((2, 3)),
        }));
        store.push(ledger.track(FeatureBatch {
            features: Array2::zeros((1, 5)),
            labels: Array2::zeros((1, 3)),
        }));

        let err = store.merge().unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::BatchShapeMismatch {
                batch: 1,
                expected: (4, 3),
                got: (5, 3),
            }
        ));
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn merge_of_nothing_is_an_empty_training_set() {
        assert!(matches!(
            BatchStore::new().merge(),
            Err(OrchestratorError::EmptyTrainingSet)
        ));
    }
}
