use std::path::PathBuf;

/// A single unit of decode work: one file and the class it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub path: PathBuf,
    pub label: usize,
}

impl Task {
    pub fn new(path: impl Into<PathBuf>, label: usize) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}

/// A successfully decoded image handed from a worker to the coordinator. The pixel buffer is
/// owned, nothing is shared with the worker that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Row-major RGBA bytes, `width * height * 4` long.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub label: usize,
    pub path: PathBuf,
}
