//! Image file reading and PNG encoding.

use std::path::Path;

use cutline_pipeline::types::{GrayImage, RgbaImage};
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::IoError;

/// Read and decode an image file (PNG, JPEG, BMP or WebP).
///
/// # Errors
///
/// Returns [`IoError::Io`] if the file cannot be read and
/// [`IoError::Pipeline`] if it is empty or not a supported image.
pub fn read_image(path: &Path) -> Result<DynamicImage, IoError> {
    let bytes = std::fs::read(path)?;
    Ok(cutline_pipeline::decode::decode(&bytes)?)
}

/// Encode an RGBA raster as PNG bytes.
///
/// # Errors
///
/// Returns [`IoError::Image`] if encoding fails.
pub fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, IoError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        raster.as_raw(),
        raster.width(),
        raster.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(png)
}

/// Encode a grayscale raster as PNG bytes.
pub(crate) fn encode_gray_png(raster: &GrayImage) -> Result<Vec<u8>, IoError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        raster.as_raw(),
        raster.width(),
        raster.height(),
        ExtendedColorType::L8,
    )?;
    Ok(png)
}

/// Encode `raster` as PNG and write it to `path`.
///
/// # Errors
///
/// Returns [`IoError::Image`] if encoding fails and [`IoError::Io`] if
/// the file cannot be written.
pub fn write_png(path: &Path, raster: &RgbaImage) -> Result<(), IoError> {
    std::fs::write(path, encode_png(raster)?)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn encoded_png_has_signature() {
        let png = encode_png(&RgbaImage::new(3, 2)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let gray = encode_gray_png(&GrayImage::new(3, 2)).unwrap();
        assert_eq!(&gray[..4], b"\x89PNG");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("cutline-io-definitely-missing.png");
        assert!(matches!(read_image(&path), Err(IoError::Io(_))));
    }
}
