use std::num::NonZeroUsize;

use artifact::specs::{ActFnSpec, LayerSpec, ModelSpec};
use log::info;
use machine_learning::{
    arch::{ModelBuilder, loss::CrossEntropy},
    dataset::Dataset,
    optimization::Adam,
    training::{EpochStats, ModelTrainer},
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

use crate::{OrchestratorError, Result, configs::TrainingConfig};

/// A trained classifier head.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedHead {
    pub topology: ModelSpec,
    pub params: Vec<f32>,
    /// One entry per epoch, in order.
    pub history: Vec<EpochStats>,
}

/// Returns the head's topology: a rectified hidden layer, a linear projection onto the
/// classes and a softmax.
pub fn head_topology(feature_dim: usize, hidden_units: usize, num_classes: usize) -> ModelSpec {
    ModelSpec::Sequential {
        layers: vec![
            LayerSpec::Dense {
                dim: (feature_dim, hidden_units),
                act_fn: Some(ActFnSpec::Relu),
            },
            LayerSpec::Dense {
                dim: (hidden_units, num_classes),
                act_fn: None,
            },
            LayerSpec::Softmax { dim: num_classes },
        ],
    }
}

/// Trains a freshly initialized head on the merged training set.
///
/// # Arguments
/// * `features` - `(rows, feature_dim)` backbone features.
/// * `labels` - `(rows, num_classes)` one-hot labels.
/// * `config` - The hyperparameters.
///
/// # Returns
/// The trained head or an error if the set is empty or the shapes disagree.
pub fn train_head(
    features: Array2<f32>,
    labels: Array2<f32>,
    config: &TrainingConfig,
) -> Result<TrainedHead> {
    let batch_size = NonZeroUsize::new(config.batch_size).ok_or_else(|| {
        OrchestratorError::InvalidConfig("batch_size must be greater than zero".into())
    })?;

    let dataset = Dataset::new(features, labels)?;
    let topology = head_topology(dataset.x_size(), config.hidden_units, dataset.y_size());

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let builder = ModelBuilder::new();
    let model = builder.build(&topology)?;
    let mut params = builder.init_params(&topology, &mut rng)?;
    let optimizer = Adam::with_learning_rate(params.len(), config.learning_rate);

    info!(
        rows = dataset.len(),
        params = params.len(),
        epochs = config.epochs;
        "training head"
    );

    let mut trainer = ModelTrainer::new(
        model,
        optimizer,
        dataset,
        CrossEntropy::default(),
        config.epochs,
        batch_size,
        config.shuffle,
        rng,
    );

    let history = trainer.train(&mut params)?;

    Ok(TrainedHead {
        topology,
        params,
        history,
    })
}
