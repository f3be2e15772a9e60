use std::{
    fs,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    ArtifactErr, LABELS_FILE, MANIFEST_FILE, Manifest, Result, WEIGHTS_FILE,
    specs::{BackboneSpec, ModelSpec},
};

/// A trained classifier head together with everything needed to serve it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub topology: ModelSpec,
    pub backbone: BackboneSpec,
    /// The head's flat parameter buffer, laid out as `topology.weight_shapes()` lists it.
    pub params: Vec<f32>,
    /// The class names, index = output channel. Optional on load only.
    pub class_names: Option<Vec<String>>,
}

impl ModelArtifact {
    /// Writes the artifact into `dir` as a manifest, a weight blob and a class-name list.
    /// The directory is created if absent.
    ///
    /// # Arguments
    /// * `dir` - The model directory.
    ///
    /// # Returns
    /// An error if the artifact is inconsistent or on I/O failure.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.check()?;

        let manifest = Manifest::new(self.topology.clone(), self.backbone.clone(), WEIGHTS_FILE);
        let blob: &[u8] = bytemuck::cast_slice(&self.params);
        manifest.validate(blob.len())?;

        fs::create_dir_all(dir).map_err(io_err(dir))?;

        let weights_path = dir.join(manifest.weights_path()?);
        fs::write(&weights_path, blob).map_err(io_err(&weights_path))?;
        write_json(&dir.join(MANIFEST_FILE), &manifest)?;

        let labels_path = dir.join(LABELS_FILE);
        match &self.class_names {
            Some(class_names) => write_json(&labels_path, class_names)?,
            None => match fs::remove_file(&labels_path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => {
                    return Err(ArtifactErr::Io {
                        path: labels_path,
                        source: e,
                    });
                }
                _ => {}
            },
        }

        info!(
            "model artifact saved to {} ({} weight bytes)",
            dir.display(),
            blob.len()
        );

        Ok(())
    }

    /// Reads an artifact previously written by `save`.
    ///
    /// A missing class-name list is tolerated and yields `class_names == None`, every other
    /// missing or inconsistent piece is an error.
    ///
    /// # Arguments
    /// * `dir` - The model directory.
    ///
    /// # Returns
    /// The loaded artifact.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE))?;
        let weights_path = dir.join(manifest.weights_path()?);
        let blob = fs::read(&weights_path).map_err(io_err(&weights_path))?;
        manifest.validate(blob.len())?;

        let params: Vec<f32> = bytemuck::pod_collect_to_vec(&blob);

        let labels_path = dir.join(LABELS_FILE);
        let class_names = if labels_path.exists() {
            Some(read_json::<Vec<String>>(&labels_path)?)
        } else {
            warn!(
                "no class-name list at {}, labels fall back to class indices",
                labels_path.display()
            );
            None
        };

        let artifact = Self {
            topology: manifest.topology,
            backbone: manifest.backbone,
            params,
            class_names,
        };

        artifact.check()?;
        Ok(artifact)
    }

    /// Checks the invariants linking the parameters and class names to the topology.
    fn check(&self) -> Result<()> {
        self.topology.check().map_err(ArtifactErr::InvalidTopology)?;

        let expected = self.topology.size();
        if self.params.len() != expected {
            return Err(ArtifactErr::BlobLength {
                got: self.params.len() * size_of::<f32>(),
                expected: expected * size_of::<f32>(),
            });
        }

        let outputs = self.topology.output_dim().unwrap_or_default();

        if let Some(class_names) = &self.class_names {
            if class_names.len() != outputs {
                return Err(ArtifactErr::ClassCount {
                    got: class_names.len(),
                    expected: outputs,
                });
            }
        }

        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ArtifactErr {
    let path = path.to_path_buf();
    move |source| ArtifactErr::Io { path, source }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = fs::File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ArtifactErr::Json {
        path: PathBuf::from(path),
        source,
    })?;

    writer.flush().map_err(io_err(path))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path).map_err(io_err(path))?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactErr::Json {
        path: PathBuf::from(path),
        source,
    })
}
