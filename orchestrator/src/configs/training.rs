use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use artifact::specs::BackboneSpec;
use serde::{Deserialize, Serialize};

use crate::{OrchestratorError, Result};

/// The frozen backbone the head is trained on top of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackboneConfig {
    Seeded {
        patch: usize,
        channels: usize,
        grid: usize,
        seed: u64,
    },
    Safetensors {
        path: PathBuf,
        patch: usize,
        grid: usize,
    },
}

impl BackboneConfig {
    /// Converts this config into the descriptor persisted next to the head.
    ///
    /// # Arguments
    /// * `image_size` - The side of the square images fed to the backbone.
    pub fn to_spec(&self, image_size: usize) -> BackboneSpec {
        match self.clone() {
            BackboneConfig::Seeded {
                patch,
                channels,
                grid,
                seed,
            } => BackboneSpec::Seeded {
                image_size,
                patch,
                channels,
                grid,
                seed,
            },
            BackboneConfig::Safetensors { path, patch, grid } => BackboneSpec::Safetensors {
                path,
                image_size,
                patch,
                grid,
            },
        }
    }
}

impl Default for BackboneConfig {
    fn default() -> Self {
        BackboneConfig::Seeded {
            patch: 16,
            channels: 64,
            grid: 2,
            seed: 0x5eed,
        }
    }
}

/// Everything a training run needs. Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// The dataset root, one subdirectory per class.
    pub dataset_path: PathBuf,
    /// The directory the trained artifact is written to.
    pub model_path: PathBuf,
    /// Both the flush cap of the batch assembler and the training mini-batch size.
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub shuffle: bool,
    pub hidden_units: usize,
    /// The amount of decode workers, `None` for one per available core.
    pub workers: Option<usize>,
    pub channel_capacity: usize,
    pub seed: Option<u64>,
    pub image_size: usize,
    pub backbone: BackboneConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("dataset"),
            model_path: PathBuf::from("model"),
            batch_size: 64,
            epochs: 20,
            learning_rate: 1e-4,
            shuffle: true,
            hidden_units: 100,
            workers: None,
            channel_capacity: 256,
            seed: None,
            image_size: 224,
            backbone: BackboneConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Reads and validates a config from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The path to the JSON document.
    ///
    /// # Returns
    /// The config or an error if the file can't be read, parsed or validated.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                OrchestratorError::Json {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the config before any work starts.
    ///
    /// # Returns
    /// An `InvalidConfig` error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(OrchestratorError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be greater than zero".into());
        }

        if self.epochs == 0 {
            return invalid("epochs must be greater than zero".into());
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0. {
            return invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }

        if self.hidden_units == 0 {
            return invalid("hidden_units must be greater than zero".into());
        }

        if self.workers == Some(0) {
            return invalid("workers must be greater than zero".into());
        }

        if self.channel_capacity == 0 {
            return invalid("channel_capacity must be greater than zero".into());
        }

        if self.image_size == 0 || u32::try_from(self.image_size).is_err() {
            return invalid(format!("image_size {} is out of range", self.image_size));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_defaults() {
        let config: TrainingConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, TrainingConfig::default());
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.epochs, 20);
        assert!(config.shuffle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let json = r#"{
            "dataset_path": "/data/dogs",
            "epochs": 3,
            "workers": 2,
            "backbone": { "kind": "safetensors", "path": "embed.safetensors", "patch": 8, "grid": 1 }
        }"#;

        let config: TrainingConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.dataset_path, PathBuf::from("/data/dogs"));
        assert_eq!(config.epochs, 3);
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.learning_rate, 1e-4);
        assert_eq!(
            config.backbone.to_spec(config.image_size),
            BackboneSpec::Safetensors {
                path: "embed.safetensors".into(),
                image_size: 224,
                patch: 8,
                grid: 1,
            }
        );
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let cases = [
            TrainingConfig {
                batch_size: 0,
                ..Default::default()
            },
            TrainingConfig {
                epochs: 0,
                ..Default::default()
            },
            TrainingConfig {
                learning_rate: 0.,
                ..Default::default()
            },
            TrainingConfig {
                learning_rate: f32::NAN,
                ..Default::default()
            },
            TrainingConfig {
                hidden_units: 0,
                ..Default::default()
            },
            TrainingConfig {
                workers: Some(0),
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(OrchestratorError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn from_json_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(&path, r#"{ "batch_size": 0 }"#).unwrap();

        let err = TrainingConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConfig(_)));

        std::fs::write(&path, "not json").unwrap();
        let err = TrainingConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, OrchestratorError::Json { .. }));
    }
}
