//! Alpha-channel segmentation for images with real transparency.

use image::DynamicImage;

use super::SegmentError;
use crate::types::Mask;

/// Alpha values strictly above this are foreground.
pub const ALPHA_THRESHOLD: u8 = 10;

/// Alpha masks covering at least this fraction of the image are treated
/// as opaque (the image has an alpha channel but no cut-out background).
pub const OPAQUE_RATIO: f64 = 0.95;

pub(super) fn segment(source: &DynamicImage) -> Result<Mask, SegmentError> {
    if !source.color().has_alpha() {
        return Err(SegmentError::NoAlpha);
    }
    let rgba = source.to_rgba8();
    let mask = Mask::from_fn(rgba.width(), rgba.height(), |x, y| {
        rgba.get_pixel(x, y).0[3] > ALPHA_THRESHOLD
    });
    let ratio = mask.foreground_ratio();
    if ratio >= OPAQUE_RATIO || mask.foreground_count() == 0 {
        return Err(SegmentError::AlphaCoverage { ratio });
    }
    Ok(mask)
}
