mod assembler;
pub mod configs;
pub mod error;
pub mod scanner;
mod training;

use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use artifact::ModelArtifact;
use log::{error, info, warn};
use machine_learning::{
    features::{FeatureExtractor, PatchEmbed},
    memory::TensorLedger,
    training::EpochStats,
};
use worker::{CoverDecoder, ImageDecoder, Outcome, PoolConfig, WorkerPool};

pub use assembler::{Assembled, BatchAssembler, BatchStore, FeatureBatch};
pub use configs::{BackboneConfig, TrainingConfig};
pub use error::{OrchestratorError, Result};
pub use scanner::{ScannedDataset, scan};
pub use training::{TrainedHead, head_topology, train_head};

/// What a training run did, from the scan to the saved artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub class_names: Vec<String>,
    /// The amount of images the scanner found.
    pub tasks: usize,
    pub decoded: usize,
    pub failed: usize,
    /// Tasks never reported because their worker crashed.
    pub lost: usize,
    pub crashed_workers: usize,
    /// The size of every batch flush, in order.
    pub flushes: Vec<usize>,
    /// The amount of rows of the merged training set.
    pub training_rows: usize,
    pub history: Vec<EpochStats>,
    pub model_path: PathBuf,
}

/// Runs a whole training session: scans the dataset, decodes it in parallel, extracts the
/// features batch by batch, trains the head and writes the artifact to `config.model_path`.
///
/// # Errors
/// Returns an `OrchestratorError` on any setup, shape or persistence failure. Images that fail
/// to decode are logged and left out.
pub async fn train(config: TrainingConfig) -> Result<TrainingReport> {
    config.validate()?;

    let backbone = config.backbone.to_spec(config.image_size);
    let extractor: Arc<dyn FeatureExtractor> = Arc::new(PatchEmbed::from_spec(&backbone)?);
    let decoder: Arc<dyn ImageDecoder> = Arc::new(CoverDecoder::new(config.image_size as u32));

    let dataset = scan(&config.dataset_path)?;
    let class_names = dataset.class_names.clone();

    info!(
        "training on {} image(s) across {} class(es): {:?}",
        dataset.tasks.len(),
        class_names.len(),
        class_names
    );

    let ledger = TensorLedger::new();
    let collected = collect_features(&config, dataset, extractor, decoder, &ledger).await?;
    let (features, labels) = collected.assembled.store.merge()?;
    let training_rows = features.nrows();

    let head = train_head(features, labels, &config)?;

    ModelArtifact {
        topology: head.topology,
        backbone,
        params: head.params,
        class_names: Some(class_names.clone()),
    }
    .save(&config.model_path)?;

    Ok(TrainingReport {
        class_names,
        tasks: collected.tasks,
        decoded: collected.decoded,
        failed: collected.failed,
        lost: collected.lost,
        crashed_workers: collected.crashed_workers,
        flushes: collected.assembled.flushes,
        training_rows,
        history: head.history,
        model_path: config.model_path,
    })
}

/// The output of the decode and extraction stage.
#[derive(Debug)]
pub struct Collected {
    pub assembled: Assembled,
    pub tasks: usize,
    pub decoded: usize,
    pub failed: usize,
    pub lost: usize,
    pub crashed_workers: usize,
}

/// Decodes every scanned image on the worker pool and feeds the successes to a batch
/// assembler as they arrive. Returns once every worker is accounted for.
///
/// # Arguments
/// * `config` - The run's configuration.
/// * `dataset` - The scanned dataset, its tasks are handed to the pool.
/// * `extractor` - The frozen backbone.
/// * `decoder` - The decoder every worker uses.
/// * `ledger` - Where the assembler registers its tensors.
pub async fn collect_features(
    config: &TrainingConfig,
    dataset: ScannedDataset,
    extractor: Arc<dyn FeatureExtractor>,
    decoder: Arc<dyn ImageDecoder>,
    ledger: &TensorLedger,
) -> Result<Collected> {
    let batch_size = NonZeroUsize::new(config.batch_size).ok_or_else(|| {
        OrchestratorError::InvalidConfig("batch_size must be greater than zero".into())
    })?;

    let pool_config = match config.workers {
        Some(workers) => PoolConfig::new(workers, config.channel_capacity)?,
        None => PoolConfig::available(config.channel_capacity)?,
    };

    let tasks = dataset.tasks.len();
    let mut assembler = BatchAssembler::new(
        extractor,
        ledger.clone(),
        dataset.class_names.len(),
        batch_size,
    );

    let mut pool = WorkerPool::spawn(dataset.tasks, decoder, &pool_config);
    let (mut decoded, mut failed) = (0, 0);

    while let Some(report) = pool.next().await {
        match report.outcome {
            Outcome::Decoded(image) => match assembler.push(image) {
                Ok(()) => decoded += 1,
                Err(OrchestratorError::InvalidImage { path, detail }) => {
                    warn!("skipping {}: {detail}", path.display());
                    failed += 1;
                }
                Err(e) => return Err(e),
            },
            Outcome::Failed { path, detail } => {
                warn!(worker_id = report.worker_id; "cannot decode {}: {detail}", path.display());
                failed += 1;
            }
        }
    }

    let summary = pool.join().await;
    let lost = summary.lost();
    let crashed_workers = summary.crashed();

    if lost > 0 {
        error!(
            lost = lost,
            crashed_workers = crashed_workers;
            "images lost to crashed workers, training without them"
        );
    }

    let assembled = assembler.finish()?;

    info!(
        decoded = decoded,
        failed = failed,
        lost = lost,
        batches = assembled.flushes.len();
        "feature extraction finished"
    );

    Ok(Collected {
        assembled,
        tasks,
        decoded,
        failed,
        lost,
        crashed_workers,
    })
}
