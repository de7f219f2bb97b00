//! Print and cutting line generation.
//!
//! The print line is the shape grown by the print offset; the cutting
//! line is the print region grown by the cutting offset. Keyrings then
//! receive a ring tab or an internal hole.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::CuttingConfig;
use crate::hole::{Hole, apply_cutout, place_internal, place_ring};
use crate::offset::{OffsetLine, offset};
use crate::types::{AttachmentPosition, HoleType, Mask, PipelineError, ProductType};
use crate::units::{PhysicalSize, px_per_mm};

/// What to build around the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CuttingOptions {
    /// Product being manufactured.
    pub product_type: ProductType,
    /// Attachment style for keyrings.
    pub hole_type: HoleType,
    /// Side carrying the attachment.
    pub attachment_position: AttachmentPosition,
}

/// Manufacturing lines for one shape.
///
/// `mask ⊆ print.mask ⊆ cutting.mask` holds for every foreground pixel,
/// except inside an internal hole, which is cut out of `cutting.mask`.
/// The contours follow the dominant region only.
#[derive(Debug, Clone, PartialEq)]
pub struct CuttingLineResult {
    /// Print line and region.
    pub print: OffsetLine,
    /// Cutting line and region (with any internal hole removed).
    pub cutting: OffsetLine,
    /// Keyring hole, if any.
    pub hole: Option<Hole>,
    /// Options the result was generated for.
    pub options: CuttingOptions,
    /// Print offset in pixels.
    pub print_offset_px: f64,
    /// Cutting offset in pixels.
    pub cutting_offset_px: f64,
    /// Pixels per millimetre used for every conversion.
    pub px_per_mm: f64,
}

impl CuttingLineResult {
    /// Returns `true` if the result carries a ring tab.
    #[must_use]
    pub const fn has_ring(&self) -> bool {
        matches!(self.hole, Some(Hole::Ring { .. }))
    }
}

/// Generate print and cutting lines for `mask` printed at `size_mm`.
///
/// Offsets and hole dimensions are converted with [`px_per_mm`] of the
/// mask dimensions against `size_mm`.
///
/// # Errors
///
/// Returns [`PipelineError::NoContour`] if either offset finds no region
/// and [`PipelineError::DegenerateGeometry`] if hole placement meets a
/// zero-area cutting line.
#[instrument(skip(mask, config), fields(width = mask.width(), height = mask.height()))]
pub fn generate_cutting_lines(
    mask: &Mask,
    size_mm: PhysicalSize,
    options: CuttingOptions,
    config: &CuttingConfig,
) -> Result<CuttingLineResult, PipelineError> {
    let scale = px_per_mm(mask.dimensions(), size_mm);
    let print_offset_px = config.print_offset_mm * scale;
    let cutting_offset_px = config.cutting_offset_mm * scale;

    let print = offset(mask, print_offset_px, config.smoothing_factor)?;
    let mut cutting = offset(&print.mask, cutting_offset_px, config.smoothing_factor)?;

    let hole = match options.product_type {
        ProductType::Objet => None,
        ProductType::Keyring => {
            let bbox = cutting
                .contour
                .bounding_box()
                .ok_or(PipelineError::NoContour)?;
            let hole = match options.hole_type {
                HoleType::Ring => place_ring(
                    &bbox,
                    options.attachment_position,
                    config.keyring_hole.diameter_mm * scale,
                    config.keyring_hole.edge_distance_mm * scale,
                )?,
                HoleType::Internal => place_internal(
                    &bbox,
                    mask.dimensions(),
                    options.attachment_position,
                    (
                        config.internal_hole.width_mm * scale,
                        config.internal_hole.height_mm * scale,
                    ),
                    config.internal_hole.edge_distance_mm * scale,
                )?,
            };
            cutting.mask = apply_cutout(&cutting.mask, &hole);
            Some(hole)
        }
    };

    info!(
        px_per_mm = scale,
        print_offset_px,
        cutting_offset_px,
        hole = ?hole,
        "cutting lines generated"
    );

    Ok(CuttingLineResult {
        print,
        cutting,
        hole,
        options,
        print_offset_px,
        cutting_offset_px,
        px_per_mm: scale,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn disc(size: u32, r: f64) -> Mask {
        let c = f64::from(size) / 2.0;
        Mask::from_fn(size, size, |x, y| (f64::from(x) - c).hypot(f64::from(y) - c) <= r)
    }

    #[test]
    fn objet_has_nested_lines_and_no_hole() {
        let mask = disc(200, 50.0);
        let result = generate_cutting_lines(
            &mask,
            PhysicalSize::new(100.0, 100.0),
            CuttingOptions::default(),
            &CuttingConfig::default(),
        )
        .unwrap();
        assert!((result.px_per_mm - 2.0).abs() < 1e-12);
        assert!((result.print_offset_px - 4.0).abs() < 1e-12);
        assert!(result.hole.is_none());
        assert!(result.print.mask.contains(&mask));
        assert!(result.cutting.mask.contains(&result.print.mask));
        assert!(result.cutting.mask.foreground_count() > result.print.mask.foreground_count());
    }

    #[test]
    fn ring_keyring_places_hole_above() {
        let mask = disc(200, 50.0);
        let options = CuttingOptions {
            product_type: ProductType::Keyring,
            ..CuttingOptions::default()
        };
        let result = generate_cutting_lines(
            &mask,
            PhysicalSize::new(100.0, 100.0),
            options,
            &CuttingConfig::default(),
        )
        .unwrap();
        let top = result.cutting.contour.bounding_box().unwrap().y;
        let hole = result.hole.unwrap();
        assert!(result.has_ring());
        assert!(hole.center().y < top);
        assert_eq!(hole.radius_px(), 4);
    }

    #[test]
    fn internal_keyring_cuts_into_the_cutting_mask() {
        let mask = disc(200, 60.0);
        let options = CuttingOptions {
            product_type: ProductType::Keyring,
            hole_type: HoleType::Internal,
            attachment_position: AttachmentPosition::Bottom,
        };
        let result = generate_cutting_lines(
            &mask,
            PhysicalSize::new(100.0, 100.0),
            options,
            &CuttingConfig::default(),
        )
        .unwrap();
        let hole = result.hole.unwrap();
        let c = hole.center();
        let (x, y) = (u32::try_from(c.x).unwrap(), u32::try_from(c.y).unwrap());
        assert!(!result.cutting.mask.is_foreground(x, y));
        assert!(result.print.mask.is_foreground(x, y));
        assert!(!result.has_ring());
    }

    #[test]
    fn empty_mask_fails_with_no_contour() {
        let err = generate_cutting_lines(
            &Mask::empty(50, 50),
            PhysicalSize::new(10.0, 10.0),
            CuttingOptions::default(),
            &CuttingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::NoContour));
    }
}
