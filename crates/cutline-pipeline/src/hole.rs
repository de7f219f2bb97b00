//! Keyring attachment hardware.
//!
//! A ring-type hole sits on a tab outside the cutting line; an internal
//! hole is cut through the piece just inside the cutting line. Positions
//! are derived from the cutting contour's bounding box.

use image::Luma;
use serde::{Deserialize, Serialize};

use crate::config::CuttingConfig;
use crate::types::{
    AttachmentPosition, BACKGROUND, BoundingBox, Dimensions, Mask, PipelineError, PixelPoint,
    ProductType,
};
use crate::units::PhysicalSize;

/// Margin of tab material around a ring hole, in millimetres.
pub const TAB_MARGIN_MM: f64 = 1.0;

/// Clearance kept between an internal hole and the image border, in
/// pixels.
const BORDER_CLEARANCE_PX: i32 = 2;

/// A placed keyring hole, in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Hole {
    /// Round hole on a tab outside the cutting line.
    Ring {
        /// Hole center.
        center: PixelPoint,
        /// Hole radius in pixels.
        radius_px: u32,
    },
    /// Elliptical hole inside the cutting line.
    Internal {
        /// Hole center.
        center: PixelPoint,
        /// Hole width in pixels.
        width_px: u32,
        /// Hole height in pixels.
        height_px: u32,
    },
}

impl Hole {
    /// Hole center.
    #[must_use]
    pub const fn center(&self) -> PixelPoint {
        match *self {
            Self::Ring { center, .. } | Self::Internal { center, .. } => center,
        }
    }

    /// Radius of the hole; the mean semi-axis for an internal hole.
    #[must_use]
    pub const fn radius_px(&self) -> u32 {
        match *self {
            Self::Ring { radius_px, .. } => radius_px,
            Self::Internal {
                width_px,
                height_px,
                ..
            } => (width_px + height_px) / 4,
        }
    }
}

/// Place a ring hole `edge_distance_px + radius` outside the attachment
/// edge of `bbox`, centred along the other axis.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateGeometry`] for a zero-area box.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn place_ring(
    bbox: &BoundingBox,
    position: AttachmentPosition,
    diameter_px: f64,
    edge_distance_px: f64,
) -> Result<Hole, PipelineError> {
    if bbox.is_degenerate() {
        return Err(PipelineError::DegenerateGeometry);
    }
    let r = (diameter_px.max(0.0) / 2.0).floor() as i32;
    let dist = edge_distance_px.max(0.0).floor() as i32;
    let center = match position {
        AttachmentPosition::Top => PixelPoint::new(bbox.center_x(), bbox.y - dist - r),
        AttachmentPosition::Bottom => PixelPoint::new(bbox.center_x(), bbox.bottom() + dist + r),
        AttachmentPosition::Left => PixelPoint::new(bbox.x - dist - r, bbox.center_y()),
        AttachmentPosition::Right => PixelPoint::new(bbox.right() + dist + r, bbox.center_y()),
    };
    Ok(Hole::Ring {
        center,
        radius_px: r.unsigned_abs(),
    })
}

/// Place an internal hole `edge_distance_px` inside the attachment edge
/// of `bbox`, clamped so the hole keeps 2 px of clearance from the image
/// border.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateGeometry`] for a zero-area box.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn place_internal(
    bbox: &BoundingBox,
    image: Dimensions,
    position: AttachmentPosition,
    hole_px: (f64, f64),
    edge_distance_px: f64,
) -> Result<Hole, PipelineError> {
    if bbox.is_degenerate() {
        return Err(PipelineError::DegenerateGeometry);
    }
    let width_px = hole_px.0.max(0.0).floor() as u32;
    let height_px = hole_px.1.max(0.0).floor() as u32;
    let hw = (hole_px.0.max(0.0) / 2.0).floor() as i32;
    let hh = (hole_px.1.max(0.0) / 2.0).floor() as i32;
    let dist = edge_distance_px.max(0.0).floor() as i32;

    let (cx, cy) = match position {
        AttachmentPosition::Top => (bbox.center_x(), bbox.y + dist),
        AttachmentPosition::Bottom => (bbox.center_x(), bbox.bottom() - dist),
        AttachmentPosition::Left => (bbox.x + dist, bbox.center_y()),
        AttachmentPosition::Right => (bbox.right() - dist, bbox.center_y()),
    };

    let w = i32::try_from(image.width).unwrap_or(i32::MAX);
    let h = i32::try_from(image.height).unwrap_or(i32::MAX);
    let center = PixelPoint::new(
        clamp_low_wins(cx, hw + BORDER_CLEARANCE_PX, w - hw - BORDER_CLEARANCE_PX),
        clamp_low_wins(cy, hh + BORDER_CLEARANCE_PX, h - hh - BORDER_CLEARANCE_PX),
    );

    Ok(Hole::Internal {
        center,
        width_px,
        height_px,
    })
}

/// `max(lo, min(hi, v))`: unlike [`i32::clamp`] this tolerates `lo > hi`
/// (an image narrower than the hole), letting the lower bound win.
fn clamp_low_wins(v: i32, lo: i32, hi: i32) -> i32 {
    v.min(hi).max(lo)
}

/// Subtract an internal hole from a mask, returning the new mask.
///
/// Ring holes lie outside the cutting line, so the mask is returned
/// unchanged for them.
#[must_use]
pub fn apply_cutout(mask: &Mask, hole: &Hole) -> Mask {
    match *hole {
        Hole::Ring { .. } => mask.clone(),
        Hole::Internal {
            center,
            width_px,
            height_px,
        } => {
            let mut raster = mask.as_image().clone();
            imageproc::drawing::draw_filled_ellipse_mut(
                &mut raster,
                (center.x, center.y),
                i32::try_from(width_px / 2).unwrap_or(i32::MAX),
                i32::try_from(height_px / 2).unwrap_or(i32::MAX),
                Luma([BACKGROUND]),
            );
            Mask::from_binary(raster)
        }
    }
}

/// Growth of the finished piece caused by a ring tab, in millimetres:
/// `(width, height)`.
#[must_use]
pub fn keyring_size_addition_mm(
    config: &CuttingConfig,
    position: AttachmentPosition,
) -> (f64, f64) {
    let protrusion = config.keyring_hole.edge_distance_mm
        + config.keyring_hole.diameter_mm
        + TAB_MARGIN_MM;
    if position.is_vertical() {
        (0.0, protrusion)
    } else {
        (protrusion, 0.0)
    }
}

/// Drilling fee for a product: the configured fee for keyrings, zero
/// otherwise.
#[must_use]
pub const fn drilling_fee(config: &CuttingConfig, product: ProductType) -> u32 {
    match product {
        ProductType::Keyring => config.drilling_fee,
        ProductType::Objet => 0,
    }
}

/// Configured internal hole size.
#[must_use]
pub const fn internal_hole_size_mm(config: &CuttingConfig) -> PhysicalSize {
    PhysicalSize::new(config.internal_hole.width_mm, config.internal_hole.height_mm)
}
