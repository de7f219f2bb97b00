//! Image decoding.
//!
//! Raw bytes in, [`DynamicImage`] out. The decoded image keeps its
//! alpha channel (if any) so the alpha segmentation strategy can use it;
//! [`grayscale`] derives the single-channel view used by Otsu and
//! rasterized shape work.

use image::{DynamicImage, GrayImage};

use crate::types::PipelineError;

/// Decode raw image bytes.
///
/// Supports PNG, JPEG, BMP, and WebP formats (whatever the `image` crate
/// was built with).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Luminance view of a decoded image (`0.299*R + 0.587*G + 0.114*B`).
#[must_use]
pub fn grayscale(source: &DynamicImage) -> GrayImage {
    source.to_luma8()
}

/// Returns `true` if the decoded color type carries an alpha channel.
#[must_use]
pub fn has_alpha(source: &DynamicImage) -> bool {
    source.color().has_alpha()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn rgba_png_keeps_alpha_and_dimensions() {
        let img = image::RgbaImage::from_fn(17, 31, |x, _| {
            image::Rgba([128, 64, 32, u8::from(x > 3) * 255])
        });
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (17, 31));
        assert!(has_alpha(&decoded));
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn grayscale_weights_green_highest() {
        let img = image::RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgba([255, 0, 0, 255]),
            1 => image::Rgba([0, 255, 0, 255]),
            _ => image::Rgba([0, 0, 255, 255]),
        });
        let gray = grayscale(&decode(&encode_png(&img)).unwrap());
        let (r, g, b) = (
            gray.get_pixel(0, 0).0[0],
            gray.get_pixel(1, 0).0[0],
            gray.get_pixel(2, 0).0[0],
        );
        assert!(g > r && r > b, "expected green > red > blue, got R={r} G={g} B={b}");
    }
}
