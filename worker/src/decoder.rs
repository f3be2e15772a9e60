use std::path::Path;

use image::imageops::FilterType;

use crate::DecodeErr;

/// A fixed-size RGBA pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Turns an image file into a fixed-size RGBA buffer. Implementations are shared by every
/// worker of a pool.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RawImage, DecodeErr>;
}

/// Decodes any format the `image` crate understands and scales it to cover a `size x size`
/// square, cropping the overflow around the center.
#[derive(Debug, Clone, Copy)]
pub struct CoverDecoder {
    size: u32,
}

impl CoverDecoder {
    /// Creates a new `CoverDecoder`.
    ///
    /// # Arguments
    /// * `size` - The side of the output square.
    ///
    /// # Returns
    /// A new `CoverDecoder` instance.
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl ImageDecoder for CoverDecoder {
    fn decode(&self, path: &Path) -> Result<RawImage, DecodeErr> {
        let rgba = image::open(path)?
            .resize_to_fill(self.size, self.size, FilterType::Triangle)
            .to_rgba8();

        let (width, height) = rgba.dimensions();

        Ok(RawImage {
            pixels: rgba.into_raw(),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn covers_the_target_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbImage::from_pixel(20, 10, Rgb([255, 0, 0])).save(&path).unwrap();

        let raw = CoverDecoder::new(8).decode(&path).unwrap();

        assert_eq!((raw.width, raw.height), (8, 8));
        assert_eq!(raw.pixels.len(), 8 * 8 * 4);
        assert_eq!(&raw.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(CoverDecoder::new(8).decode(&path).is_err());
        assert!(CoverDecoder::new(8).decode(&dir.path().join("missing.png")).is_err());
    }
}
