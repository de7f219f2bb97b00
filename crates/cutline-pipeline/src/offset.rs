//! Outward offset of a mask by a fixed pixel distance.
//!
//! The offset region is built morphologically: smooth the input, dilate
//! it with a disk, soften the new edge, then keep the dominant outer
//! contour as a hole-free region. Smaller components that stay separate
//! after growing are kept in the region but have no contour of their own,
//! so the result always contains the whole input.

use tracing::{debug, instrument};

use crate::blur::{odd_kernel, smooth_mask};
use crate::contour::{largest_outer_contour, rasterize};
use crate::morphology::dilate_disk;
use crate::types::{Contour, Mask, PipelineError};

/// Smallest pre-blur kernel, in pixels.
const MIN_PRE_BLUR: u32 = 7;

/// Smallest edge-blur kernel, in pixels.
const MIN_EDGE_BLUR: u32 = 3;

/// Edge-blur kernel size per pixel of offset per unit of smoothing.
/// The default smoothing of 0.02 yields half the offset.
const EDGE_BLUR_PER_SMOOTHING: f64 = 25.0;

/// A boundary line together with the filled region it encloses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetLine {
    /// Outer contour of the region.
    pub contour: Contour,
    /// The region, rasterized with holes filled, plus every input pixel.
    pub mask: Mask,
}

/// Grow `mask` outward by `offset_px` pixels.
///
/// A non-positive (or non-finite) offset returns the largest contour of
/// the mask unchanged, together with a copy of the mask.
///
/// # Errors
///
/// Returns [`PipelineError::NoContour`] if the mask, after offsetting,
/// has no foreground.
#[instrument(skip(mask), fields(width = mask.width(), height = mask.height()))]
pub fn offset(mask: &Mask, offset_px: f64, smoothing: f64) -> Result<OffsetLine, PipelineError> {
    if !offset_px.is_finite() || offset_px <= 0.0 {
        let contour = largest_outer_contour(mask).ok_or(PipelineError::NoContour)?;
        return Ok(OffsetLine {
            contour,
            mask: mask.clone(),
        });
    }

    let (w, h) = (mask.width(), mask.height());

    let pre_blur = odd_kernel((w.min(h) / 60).max(MIN_PRE_BLUR));
    let pre_smoothed = smooth_mask(mask, pre_blur);

    let expanded = dilate_disk(&pre_smoothed, offset_px);

    let edge_blur = edge_blur_kernel(offset_px, smoothing);
    let softened = smooth_mask(&expanded, edge_blur).union(mask);

    let contour = largest_outer_contour(&softened).ok_or(PipelineError::NoContour)?;
    let region = rasterize(&contour, w, h).union(mask);
    debug!(
        offset_px,
        pre_blur,
        edge_blur,
        input_px = mask.foreground_count(),
        output_px = region.foreground_count(),
        "offset region built"
    );

    Ok(OffsetLine {
        contour,
        mask: region,
    })
}

/// Odd edge-blur kernel for an offset, with its radius never exceeding
/// the offset itself.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn edge_blur_kernel(offset_px: f64, smoothing: f64) -> u32 {
    let requested = (offset_px * smoothing.max(0.0) * EDGE_BLUR_PER_SMOOTHING) as u32;
    let kernel = odd_kernel(requested.max(MIN_EDGE_BLUR));
    let max_radius = offset_px.floor() as u32;
    kernel.min(2 * max_radius + 1)
}
