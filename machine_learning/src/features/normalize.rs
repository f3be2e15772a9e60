use ndarray::Array3;

use crate::{MlErr, Result};

/// Converts an RGBA8 buffer into an `(height, width, 3)` RGB tensor with every value mapped
/// from `[0, 255]` to `[-1, 1]` (`v / 127.5 - 1`). The alpha channel is dropped.
///
/// # Arguments
/// * `pixels` - Row-major RGBA bytes.
/// * `height` - The image height.
/// * `width` - The image width.
///
/// # Returns
/// The normalized tensor or an error if the buffer length doesn't match the dimensions.
pub fn normalize_rgba(pixels: &[u8], height: usize, width: usize) -> Result<Array3<f32>> {
    let expected = height * width * 4;

    if pixels.len() != expected {
        return Err(MlErr::SizeMismatch {
            what: "rgba buffer",
            got: pixels.len(),
            expected,
        });
    }

    Ok(Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
        pixels[(y * width + x) * 4 + c] as f32 / 127.5 - 1.
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_bytes_into_unit_range_and_drops_alpha() {
        let pixels = [0, 255, 51, 7, 255, 0, 0, 255];
        let t = normalize_rgba(&pixels, 1, 2).unwrap();

        assert_eq!(t.dim(), (1, 2, 3));
        assert_eq!(t[[0, 0, 0]], -1.);
        assert_eq!(t[[0, 0, 1]], 1.);
        assert!((t[[0, 0, 2]] - (51. / 127.5 - 1.)).abs() < 1e-6);
        assert_eq!(t[[0, 1, 0]], 1.);
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(normalize_rgba(&[0; 15], 2, 2).is_err());
    }
}
