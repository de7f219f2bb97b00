//! Pixel to millimetre conversion.

use serde::{Deserialize, Serialize};

use crate::analyze::ShapeMetrics;
use crate::types::Dimensions;

/// Requested physical size of the finished piece.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalSize {
    /// Width in millimetres.
    pub width_mm: f64,
    /// Height in millimetres.
    pub height_mm: f64,
}

impl PhysicalSize {
    /// Create a new size.
    #[must_use]
    pub const fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }
}

/// [`ShapeMetrics`] plus their physical equivalents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledMetrics {
    /// The pixel-space metrics this was derived from.
    #[serde(flatten)]
    pub metrics: ShapeMetrics,
    /// Enclosed area in square millimetres.
    pub area_mm2: f64,
    /// Perimeter in millimetres.
    pub perimeter_mm: f64,
    /// Bounding box width in millimetres.
    pub bbox_width_mm: f64,
    /// Bounding box height in millimetres.
    pub bbox_height_mm: f64,
    /// Millimetres per pixel used for the conversion.
    pub scale: f64,
}

/// Convert pixel metrics to millimetres for a target physical size.
///
/// The scale is the mean of the two axis ratios `target / bbox`; an axis
/// whose bounding box side is zero contributes a ratio of 1. The reported
/// bounding box is the requested size itself.
#[must_use]
pub fn to_millimetres(metrics: &ShapeMetrics, target: PhysicalSize) -> ScaledMetrics {
    let scale = mean_ratio(
        target.width_mm,
        f64::from(metrics.bbox_width_px),
        target.height_mm,
        f64::from(metrics.bbox_height_px),
    );
    ScaledMetrics {
        metrics: metrics.clone(),
        area_mm2: round2(metrics.area_px * scale * scale),
        perimeter_mm: round2(metrics.perimeter_px * scale),
        bbox_width_mm: round2(target.width_mm),
        bbox_height_mm: round2(target.height_mm),
        scale,
    }
}

/// Pixels per millimetre for an image of `size_px` printed at `size_mm`.
///
/// Mean of the two axis ratios; an axis with a non-positive millimetre
/// size contributes a ratio of 1.
#[must_use]
pub fn px_per_mm(size_px: Dimensions, size_mm: PhysicalSize) -> f64 {
    mean_ratio(
        f64::from(size_px.width),
        size_mm.width_mm,
        f64::from(size_px.height),
        size_mm.height_mm,
    )
}

/// Millimetres per pixel, the inverse direction of [`px_per_mm`] with the
/// same per-axis fallback.
#[must_use]
pub fn mm_per_px(size_px: Dimensions, size_mm: PhysicalSize) -> f64 {
    mean_ratio(
        size_mm.width_mm,
        f64::from(size_px.width),
        size_mm.height_mm,
        f64::from(size_px.height),
    )
}

fn mean_ratio(num_x: f64, den_x: f64, num_y: f64, den_y: f64) -> f64 {
    let rx = if den_x > 0.0 { num_x / den_x } else { 1.0 };
    let ry = if den_y > 0.0 { num_y / den_y } else { 1.0 };
    (rx + ry) / 2.0
}

/// Round to two decimals, the precision of every millimetre figure.
#[must_use]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
