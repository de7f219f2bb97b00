//! Global Otsu threshold, the last resort of the chain.
//!
//! Assumes a dark subject on a light background: pixels at or below the
//! Otsu level are foreground. When that marks more than half the image,
//! the assumption was wrong and the mask is inverted.

use image::GrayImage;

use crate::types::Mask;

/// Foreground share above which the mask is inverted.
const MAX_FOREGROUND_SHARE: f64 = 0.5;

pub(super) fn segment(gray: &GrayImage) -> Mask {
    let level = imageproc::contrast::otsu_level(gray);
    let mask = Mask::from_fn(gray.width(), gray.height(), |x, y| {
        gray.get_pixel(x, y).0[0] <= level
    });
    if mask.foreground_ratio() > MAX_FOREGROUND_SHARE {
        mask.inverted()
    } else {
        mask
    }
}
