use std::{fmt, io};

use artifact::ArtifactErr;
use machine_learning::MlErr;
use worker::DecodeErr;

pub type Result<T> = std::result::Result<T, InferenceErr>;

/// The errors raised while loading or running the inference context.
#[derive(Debug)]
pub enum InferenceErr {
    /// The artifact could not be read.
    Artifact(ArtifactErr),
    /// The artifact and the backbone it names don't fit together.
    Incompatible(String),
    Decode(DecodeErr),
    Ml(MlErr),
    /// The head produced no scores.
    NoScores,
}

impl fmt::Display for InferenceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact(e) => write!(f, "cannot load model: {e}"),
            Self::Incompatible(msg) => write!(f, "incompatible model: {msg}"),
            Self::Decode(e) => write!(f, "cannot decode image: {e}"),
            Self::Ml(e) => write!(f, "inference failed: {e}"),
            Self::NoScores => write!(f, "inference failed: the head produced no scores"),
        }
    }
}

impl std::error::Error for InferenceErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Artifact(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArtifactErr> for InferenceErr {
    fn from(e: ArtifactErr) -> Self {
        Self::Artifact(e)
    }
}

impl From<DecodeErr> for InferenceErr {
    fn from(e: DecodeErr) -> Self {
        Self::Decode(e)
    }
}

impl From<MlErr> for InferenceErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

/// Boundary conversion for binaries.
impl From<InferenceErr> for io::Error {
    fn from(value: InferenceErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}
