use std::{fmt, io, path::PathBuf};

use artifact::ArtifactErr;
use machine_learning::MlErr;
use worker::PoolErr;

/// The orchestrator's result type.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before any work starts.
    InvalidConfig(String),
    /// The dataset root does not exist or is not a directory.
    DatasetNotFound(PathBuf),
    /// Not a single image made it into the training set.
    EmptyTrainingSet,
    /// A stored batch disagrees with the first one on the `(features, classes)` widths.
    BatchShapeMismatch {
        batch: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// A decoded image that can't be normalized, it is skipped like a decode failure.
    InvalidImage { path: PathBuf, detail: String },
    /// Failed to read a configuration file.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Ml(MlErr),
    Artifact(ArtifactErr),
    Pool(PoolErr),
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::DatasetNotFound(path) => write!(f, "dataset not found at {}", path.display()),
            Self::EmptyTrainingSet => write!(f, "no image was decoded, the training set is empty"),
            Self::BatchShapeMismatch {
                batch,
                expected,
                got,
            } => write!(
                f,
                "batch {batch} has (features, classes) widths {got:?}, expected {expected:?}"
            ),
            Self::InvalidImage { path, detail } => {
                write!(f, "invalid image {}: {detail}", path.display())
            }
            Self::Json { path, source } => write!(f, "cannot parse {}: {source}", path.display()),
            Self::Ml(e) => write!(f, "model error: {e}"),
            Self::Artifact(e) => write!(f, "artifact error: {e}"),
            Self::Pool(e) => write!(f, "pool error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json { source, .. } => Some(source),
            Self::Ml(e) => Some(e),
            Self::Artifact(e) => Some(e),
            Self::Pool(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<ArtifactErr> for OrchestratorError {
    fn from(e: ArtifactErr) -> Self {
        Self::Artifact(e)
    }
}

impl From<PoolErr> for OrchestratorError {
    fn from(e: PoolErr) -> Self {
        Self::Pool(e)
    }
}

/// Boundary conversion for binaries.
impl From<OrchestratorError> for io::Error {
    fn from(value: OrchestratorError) -> Self {
        match value {
            OrchestratorError::Io(e) => e,
            OrchestratorError::DatasetNotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
