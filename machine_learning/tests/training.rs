use std::num::NonZeroUsize;

use artifact::specs::{ActFnSpec, LayerSpec, ModelSpec};
use machine_learning::{
    arch::{ModelBuilder, loss::CrossEntropy},
    dataset::{Dataset, one_hot},
    optimization::Adam,
    training::{ModelTrainer, correct_predictions},
};
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};

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

/// Three well separated gaussian-ish blobs in 4 dimensions.
fn blobs(per_class: usize, rng: &mut StdRng) -> (Array2<f32>, Vec<usize>) {
    let centers = [[2., 0., 0., 0.], [0., 2., 0., 0.], [0., 0., 2., 2.]];
    let mut x = Array2::zeros((per_class * 3, 4));
    let mut labels = Vec::new();

    for (class, center) in centers.iter().enumerate() {
        for i in 0..per_class {
            let row = class * per_class + i;
            for (j, c) in center.iter().enumerate() {
                x[[row, j]] = c + rng.random_range(-0.3..0.3);
            }
            labels.push(class);
        }
    }

    (x, labels)
}

#[test]
fn head_learns_separable_classes() {
    let mut rng = StdRng::seed_from_u64(5);
    let (x, labels) = blobs(30, &mut rng);
    let y = one_hot(&labels, 3).unwrap();
    let dataset = Dataset::new(x.clone(), y.clone()).unwrap();

    let spec = head(4, 16, 3);
    let builder = ModelBuilder::new();
    let model = builder.build(&spec).unwrap();
    let mut params = builder.init_params(&spec, StdRng::seed_from_u64(1)).unwrap();

    let optimizer = Adam::with_learning_rate(params.len(), 1e-2);
    let mut trainer = ModelTrainer::new(
        model,
        optimizer,
        dataset,
        CrossEntropy::default(),
        30,
        NonZeroUsize::new(16).unwrap(),
        true,
        StdRng::seed_from_u64(2),
    );

    let history = trainer.train(&mut params).unwrap();
    assert_eq!(history.len(), 30);

    let first = history.first().unwrap();
    let last = history.last().unwrap();
    assert!(last.loss < first.loss);
    assert!(last.accuracy > 0.95, "accuracy {}", last.accuracy);

    let y_pred = trainer.model().predict(&params, x.view()).unwrap();
    assert!(correct_predictions(y_pred.view(), y.view()) >= 86);
}

#[test]
fn training_is_reproducible_with_a_seed() {
    let run = || {
        let mut rng = StdRng::seed_from_u64(9);
        let (x, labels) = blobs(5, &mut rng);
        let dataset = Dataset::new(x, one_hot(&labels, 3).unwrap()).unwrap();

        let spec = head(4, 8, 3);
        let builder = ModelBuilder::new();
        let model = builder.build(&spec).unwrap();
        let mut params = builder.init_params(&spec, StdRng::seed_from_u64(1)).unwrap();

        let optimizer = Adam::with_learning_rate(params.len(), 1e-3);
        let mut trainer = ModelTrainer::new(
            model,
            optimizer,
            dataset,
            CrossEntropy::default(),
            3,
            NonZeroUsize::new(4).unwrap(),
            true,
            StdRng::seed_from_u64(3),
        );

        let history = trainer.train(&mut params).unwrap();
        (params, history)
    };

    assert_eq!(run(), run());
}

#[test]
fn wrong_parameter_buffer_is_rejected() {
    let spec = head(4, 8, 3);
    let builder = ModelBuilder::new();
    let model = builder.build(&spec).unwrap();
    let dataset = Dataset::new(Array2::zeros((2, 4)), one_hot(&[0, 1], 3).unwrap()).unwrap();

    let mut trainer = ModelTrainer::new(
        model,
        Adam::with_learning_rate(spec.size(), 1e-3),
        dataset,
        CrossEntropy::default(),
        1,
        NonZeroUsize::new(4).unwrap(),
        false,
        StdRng::seed_from_u64(0),
    );

    let mut params = vec![0.; spec.size() - 1];
    assert!(trainer.train(&mut params).is_err());
}
