use std::fs;

use artifact::{
    ArtifactErr, LABELS_FILE, MANIFEST_FILE, Manifest, ModelArtifact, WEIGHTS_FILE,
    specs::{ActFnSpec, BackboneSpec, LayerSpec, ModelSpec},
};

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

fn artifact() -> ModelArtifact {
    let topology = head(6, 4, 3);
    let params = (0..topology.size()).map(|i| i as f32 * 0.25 - 3.0).collect();

    ModelArtifact {
        topology,
        backbone: BackboneSpec::default(),
        params,
        class_names: Some(vec!["beagle".into(), "pug".into(), "shiba".into()]),
    }
}

#[test]
fn save_then_load_returns_the_same_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let model = artifact();

    model.save(dir.path()).unwrap();

    assert!(dir.path().join(MANIFEST_FILE).is_file());
    assert!(dir.path().join(WEIGHTS_FILE).is_file());
    assert!(dir.path().join(LABELS_FILE).is_file());

    let blob = fs::read(dir.path().join(WEIGHTS_FILE)).unwrap();
    assert_eq!(blob.len(), model.params.len() * 4);

    let loaded = ModelArtifact::load(dir.path()).unwrap();
    assert_eq!(loaded, model);
}

#[test]
fn manifest_describes_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    artifact().save(dir.path()).unwrap();

    let raw = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
    let manifest: Manifest = serde_json::from_str(&raw).unwrap();

    let names: Vec<_> = manifest
        .weight_specs()
        .unwrap()
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    assert_eq!(
        names,
        ["dense_1/kernel", "dense_1/bias", "dense_2/kernel", "dense_2/bias"]
    );
    assert_eq!(manifest.weights_manifest[0].paths, ["./weights.bin"]);
    assert_eq!(manifest.byte_order, "little");
}

#[test]
fn missing_labels_are_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    artifact().save(dir.path()).unwrap();
    fs::remove_file(dir.path().join(LABELS_FILE)).unwrap();

    let loaded = ModelArtifact::load(dir.path()).unwrap();
    assert_eq!(loaded.class_names, None);
    assert_eq!(loaded.params, artifact().params);
}

#[test]
fn class_count_must_match_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = artifact();
    model.class_names = Some(vec!["beagle".into(), "pug".into()]);

    let err = model.save(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        ArtifactErr::ClassCount {
            got: 2,
            expected: 3
        }
    ));
    assert!(!dir.path().join(MANIFEST_FILE).exists());
}

#[test]
fn truncated_blob_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    artifact().save(dir.path()).unwrap();

    let path = dir.path().join(WEIGHTS_FILE);
    let mut blob = fs::read(&path).unwrap();
    blob.truncate(blob.len() - 4);
    fs::write(&path, blob).unwrap();

    let err = ModelArtifact::load(dir.path()).unwrap_err();
    assert!(matches!(err, ArtifactErr::BlobLength { .. }));
}

#[test]
fn missing_manifest_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = ModelArtifact::load(dir.path()).unwrap_err();
    assert!(matches!(err, ArtifactErr::Io { .. }));
}

#[test]
fn saving_without_names_drops_a_previous_label_list() {
    let dir = tempfile::tempdir().unwrap();
    artifact().save(dir.path()).unwrap();
    assert!(dir.path().join(LABELS_FILE).is_file());

    let mut unlabelled = artifact();
    unlabelled.class_names = None;
    unlabelled.save(dir.path()).unwrap();

    assert!(!dir.path().join(LABELS_FILE).exists());
    assert_eq!(ModelArtifact::load(dir.path()).unwrap().class_names, None);

    unlabelled.save(dir.path()).unwrap();
}
