use std::{error::Error, fmt, io, path::PathBuf};

/// The artifact module's result type.
pub type Result<T> = std::result::Result<T, ArtifactErr>;

/// Failures while persisting or reloading a model artifact.
#[derive(Debug)]
pub enum ArtifactErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    UnsupportedFormat {
        format: String,
        version: u32,
    },
    UnsupportedByteOrder(String),
    InvalidWeightPath(String),
    /// The weight specs leave a hole or overlap in the blob.
    WeightLayout {
        name: String,
        offset: usize,
        expected: usize,
    },
    WeightShape {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    BlobLength {
        got: usize,
        expected: usize,
    },
    ClassCount {
        got: usize,
        expected: usize,
    },
    InvalidTopology(String),
}

impl fmt::Display for ArtifactErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactErr::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
            ArtifactErr::Json { path, source } => {
                write!(f, "invalid json in {}: {source}", path.display())
            }
            ArtifactErr::UnsupportedFormat { format, version } => {
                write!(f, "unsupported artifact format {format:?} version {version}")
            }
            ArtifactErr::UnsupportedByteOrder(order) => {
                write!(f, "unsupported weight byte order {order:?}")
            }
            ArtifactErr::InvalidWeightPath(path) => {
                write!(f, "weight path {path:?} must name a file inside the model directory")
            }
            ArtifactErr::WeightLayout {
                name,
                offset,
                expected,
            } => write!(
                f,
                "weight {name} starts at byte {offset}, expected {expected} (gap or overlap in the blob)"
            ),
            ArtifactErr::WeightShape {
                name,
                got,
                expected,
            } => write!(f, "weight {name} has shape {got:?}, topology expects {expected:?}"),
            ArtifactErr::BlobLength { got, expected } => {
                write!(f, "weight blob has {got} bytes, the manifest describes {expected}")
            }
            ArtifactErr::ClassCount { got, expected } => {
                write!(f, "{got} class names for an output layer of width {expected}")
            }
            ArtifactErr::InvalidTopology(msg) => write!(f, "invalid topology: {msg}"),
        }
    }
}

impl Error for ArtifactErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArtifactErr::Io { source, .. } => Some(source),
            ArtifactErr::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ArtifactErr> for io::Error {
    fn from(value: ArtifactErr) -> Self {
        match value {
            ArtifactErr::Io { source, .. } => source,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
