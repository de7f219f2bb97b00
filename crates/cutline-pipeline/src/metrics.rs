//! Physical measurements of the cutting line, used for quoting.

use serde::{Deserialize, Serialize};

use crate::analyze::PERIMETER_TOLERANCE_PX;
use crate::cutting::CuttingLineResult;
use crate::simplify::simplify_closed;
use crate::types::Dimensions;
use crate::units::{PhysicalSize, mm_per_px, round2};

/// Size and length of the cutting line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuttingMetrics {
    /// Area enclosed by the cutting line, in square millimetres.
    pub area_mm2: f64,
    /// Length of the cutting line, in millimetres.
    pub perimeter_mm: f64,
    /// Cutting line extent in pixels: `(width, height)`.
    pub cutting_bbox_px: (u32, u32),
    /// Cutting line extent in millimetres: `(width, height)`.
    pub cutting_bbox_mm: (f64, f64),
    /// Millimetres per pixel.
    pub scale: f64,
}

/// Measure the cutting contour of `result` for an image of `size_px`
/// printed at `size_mm`.
#[must_use]
pub fn cutting_metrics(
    result: &CuttingLineResult,
    size_mm: PhysicalSize,
    size_px: Dimensions,
) -> CuttingMetrics {
    let scale = mm_per_px(size_px, size_mm);
    let contour = &result.cutting.contour;
    let area_px = contour.area();
    let perimeter_px = simplify_closed(contour, PERIMETER_TOLERANCE_PX).arc_length();
    let (w, h) = contour.bounding_box().map_or((0, 0), |b| {
        (
            u32::try_from(b.width).unwrap_or(0),
            u32::try_from(b.height).unwrap_or(0),
        )
    });

    CuttingMetrics {
        area_mm2: round2(area_px * scale * scale),
        perimeter_mm: round2(perimeter_px * scale),
        cutting_bbox_px: (w, h),
        cutting_bbox_mm: (round2(f64::from(w) * scale), round2(f64::from(h) * scale)),
        scale,
    }
}
