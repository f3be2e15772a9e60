use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use rand_distr::{NormalError, uniform::Error as UniformError};
use safetensors::SafeTensorError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    EmptyDataset,
    InvalidModel(String),
    InvalidDistribution(String),
    InvalidBackbone(String),
    Io {
        path: PathBuf,
        source: io::Error,
    },
    SafeTensors(SafeTensorError),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::EmptyDataset => write!(f, "The dataset has no samples"),
            MlErr::InvalidModel(detail) => write!(f, "Invalid model: {detail}"),
            MlErr::InvalidDistribution(detail) => {
                write!(f, "Invalid weight distribution: {detail}")
            }
            MlErr::InvalidBackbone(detail) => write!(f, "Invalid backbone: {detail}"),
            MlErr::Io { path, source } => {
                write!(f, "Failed to read {}: {source}", path.display())
            }
            MlErr::SafeTensors(e) => write!(f, "Failed to parse safetensors: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io { source, .. } => Some(source),
            MlErr::SafeTensors(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::InvalidDistribution(value.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::InvalidDistribution(value.to_string())
    }
}

impl From<SafeTensorError> for MlErr {
    fn from(value: SafeTensorError) -> Self {
        Self::SafeTensors(value)
    }
}

impl From<ndarray::ShapeError> for MlErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::InvalidModel(value.to_string())
    }
}
