use std::{error::Error, fmt, io};

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, PoolErr>;

/// Pool setup failures.
#[derive(Debug)]
pub enum PoolErr {
    NoWorkers,
    ZeroChannelCapacity,
}

impl fmt::Display for PoolErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolErr::NoWorkers => write!(f, "the pool needs at least one worker"),
            PoolErr::ZeroChannelCapacity => {
                write!(f, "the result channel needs a capacity of at least one")
            }
        }
    }
}

impl Error for PoolErr {}

/// Boundary conversion for binaries / I/O APIs.
impl From<PoolErr> for io::Error {
    fn from(value: PoolErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}

/// A per-image decode failure. Never fatal for the pool.
#[derive(Debug)]
pub enum DecodeErr {
    Image(image::ImageError),
    Other(String),
}

impl fmt::Display for DecodeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErr::Image(e) => write!(f, "{e}"),
            DecodeErr::Other(detail) => write!(f, "{detail}"),
        }
    }
}

impl Error for DecodeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DecodeErr::Image(e) => Some(e),
            DecodeErr::Other(_) => None,
        }
    }
}

impl From<image::ImageError> for DecodeErr {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}
