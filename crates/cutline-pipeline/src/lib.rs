//! cutline-pipeline: shape analysis and cutting-line geometry (sans-IO).
//!
//! Turns an uploaded image into the measurements and manufacturing lines
//! needed to quote a laser-cut acrylic piece:
//! decode -> segment -> analyze -> convert to mm -> offset print and
//! cutting lines -> place keyring hole -> (optionally) render a preview.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory byte
//! slices and rasters; config files, the on-disk mask cache and image
//! files live in `cutline-io`.

pub mod analyze;
pub mod blur;
pub mod cache;
pub mod config;
pub mod contour;
pub mod cutting;
pub mod decode;
pub mod hole;
pub mod metrics;
pub mod morphology;
pub mod offset;
pub mod preview;
pub mod segment;
pub mod simplify;
pub mod types;
pub mod units;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

pub use analyze::{ShapeMetrics, analyze};
pub use cache::{CACHED_STRATEGY, MaskCache, MemoryMaskCache, extract_cached};
pub use config::CuttingConfig;
pub use cutting::{CuttingLineResult, CuttingOptions, generate_cutting_lines};
pub use hole::Hole;
pub use metrics::{CuttingMetrics, cutting_metrics};
pub use preview::{PreviewStyle, render};
pub use segment::{
    BackgroundRemover, Extraction, MaskExtractor, Segmentation, Segmenter, SegmenterKind,
};
pub use types::{
    AttachmentPosition, BoundingBox, Contour, Dimensions, HoleType, Mask, PipelineError,
    PixelPoint, ProductType,
};
pub use units::{PhysicalSize, ScaledMetrics, to_millimetres};

/// What to quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Requested size of the printed artwork.
    pub size_mm: PhysicalSize,
    /// Product and attachment options.
    #[serde(default)]
    pub options: CuttingOptions,
    /// User-drawn outline of the subject. When present it replaces the
    /// automatic segmentation chain.
    #[serde(default)]
    pub polygon: Option<Vec<PixelPoint>>,
}

/// Everything the pricing layer needs for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Foreground mask the quote was computed from.
    pub mask: Mask,
    /// Name of the strategy that produced the mask.
    pub mask_strategy: String,
    /// Shape metrics in pixels and millimetres.
    pub metrics: ScaledMetrics,
    /// `true` if analysis failed and `metrics` describe the full image
    /// as a plain rectangle.
    pub rectangle_fallback: bool,
    /// Print and cutting lines, or `None` if they could not be generated.
    pub cutting: Option<CuttingLineResult>,
    /// Measurements of the cutting line.
    pub cutting_metrics: Option<CuttingMetrics>,
    /// Finished piece size, including any ring tab protrusion, rounded
    /// to whole millimetres.
    pub physical_size_mm: PhysicalSize,
    /// Drilling surcharge for the product.
    pub drilling_fee: u32,
}

/// Serializable view of a [`Quote`], without rasters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Name of the strategy that produced the mask.
    pub mask_strategy: String,
    /// Shape metrics in pixels and millimetres.
    pub metrics: ScaledMetrics,
    /// `true` if the metrics are the rectangle fallback.
    pub rectangle_fallback: bool,
    /// Measurements of the cutting line.
    pub cutting_metrics: Option<CuttingMetrics>,
    /// Keyring hole, if any.
    pub hole: Option<Hole>,
    /// Finished piece size in millimetres.
    pub physical_size_mm: PhysicalSize,
    /// Drilling surcharge for the product.
    pub drilling_fee: u32,
}

impl Quote {
    /// The serializable parts of this quote.
    #[must_use]
    pub fn summary(&self) -> QuoteSummary {
        QuoteSummary {
            dimensions: self.dimensions,
            mask_strategy: self.mask_strategy.clone(),
            metrics: self.metrics.clone(),
            rectangle_fallback: self.rectangle_fallback,
            cutting_metrics: self.cutting_metrics.clone(),
            hole: self.cutting.as_ref().and_then(|c| c.hole),
            physical_size_mm: self.physical_size_mm,
            drilling_fee: self.drilling_fee,
        }
    }
}

/// Quote an encoded image.
///
/// # Pipeline steps
///
/// 1. Decode the image
/// 2. Extract the foreground mask (polygon refinement or strategy chain)
/// 3. Analyze the dominant shape, falling back to a plain rectangle
/// 4. Convert the metrics to millimetres
/// 5. Generate print and cutting lines with any keyring hole
/// 6. Measure the cutting line and the finished size
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] or [`PipelineError::ImageDecode`]
/// for unusable bytes, [`PipelineError::InvalidPolygon`] for a polygon
/// with fewer than 3 points, and [`PipelineError::NoForeground`] when no
/// mask can be extracted. Failures after extraction never fail the quote.
pub fn quote(
    image_bytes: &[u8],
    request: &QuoteRequest,
    extractor: &MaskExtractor,
    config: &CuttingConfig,
) -> Result<Quote, PipelineError> {
    let source = decode::decode(image_bytes)?;
    quote_image(&source, request, extractor, config)
}

/// Quote an already decoded image. See [`quote`].
///
/// # Errors
///
/// As [`quote`], minus the decoding errors.
#[instrument(
    skip(source, request, extractor, config),
    fields(width = source.width(), height = source.height())
)]
pub fn quote_image(
    source: &DynamicImage,
    request: &QuoteRequest,
    extractor: &MaskExtractor,
    config: &CuttingConfig,
) -> Result<Quote, PipelineError> {
    let (mask, strategy) = match &request.polygon {
        Some(polygon) => (segment::refine_with_polygon(source, polygon)?, "polygon"),
        None => {
            let extraction = extractor.extract_detailed(source)?;
            (extraction.mask, extraction.strategy)
        }
    };
    Ok(quote_mask(mask, strategy, request, config))
}

/// Quote a foreground mask that has already been extracted, for example
/// one loaded from a [`MaskCache`].
#[must_use]
pub fn quote_mask(
    mask: Mask,
    strategy: &str,
    request: &QuoteRequest,
    config: &CuttingConfig,
) -> Quote {
    let dimensions = mask.dimensions();
    let (shape, rectangle_fallback) = match analyze(&mask) {
        Ok(shape) => (shape, false),
        Err(e) => {
            warn!(error = %e, "shape analysis failed, quoting as a rectangle");
            (
                ShapeMetrics::rectangle(dimensions.width, dimensions.height),
                true,
            )
        }
    };
    let metrics = to_millimetres(&shape, request.size_mm);

    let cutting = match generate_cutting_lines(&mask, request.size_mm, request.options, config) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(error = %e, "cutting line generation failed");
            None
        }
    };
    let cutting_metrics = cutting
        .as_ref()
        .map(|c| metrics::cutting_metrics(c, request.size_mm, dimensions));

    let (add_w, add_h) = if cutting.as_ref().is_some_and(CuttingLineResult::has_ring) {
        hole::keyring_size_addition_mm(config, request.options.attachment_position)
    } else {
        (0.0, 0.0)
    };
    let physical_size_mm = PhysicalSize::new(
        (request.size_mm.width_mm + add_w).round(),
        (request.size_mm.height_mm + add_h).round(),
    );
    let drilling_fee = hole::drilling_fee(config, request.options.product_type);

    info!(
        strategy,
        rectangle_fallback,
        complexity = metrics.metrics.complexity_score,
        has_cutting = cutting.is_some(),
        "quote computed"
    );

    Quote {
        dimensions,
        mask,
        mask_strategy: strategy.to_owned(),
        metrics,
        rectangle_fallback,
        cutting,
        cutting_metrics,
        physical_size_mm,
        drilling_fee,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ImageEncoder, Rgba, RgbaImage};

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
            .unwrap();
        buf
    }

    fn transparent_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let inside = (x0..x1).contains(&x) && (y0..y1).contains(&y);
            Rgba([200, 40, 40, if inside { 255 } else { 0 }])
        })
    }

    fn request(w: f64, h: f64) -> QuoteRequest {
        QuoteRequest {
            size_mm: PhysicalSize::new(w, h),
            options: CuttingOptions::default(),
            polygon: None,
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = quote(
            &[],
            &request(10.0, 10.0),
            &MaskExtractor::default(),
            &CuttingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn transparent_rectangle_quotes_as_rectangle() {
        let bytes = png_bytes(&transparent_rect(120, 80, 20, 20, 100, 60));
        let q = quote(
            &bytes,
            &request(80.0, 40.0),
            &MaskExtractor::default(),
            &CuttingConfig::default(),
        )
        .unwrap();
        assert_eq!(q.mask_strategy, "alpha");
        assert!(!q.rectangle_fallback);
        assert_eq!(q.metrics.metrics.vertex_count, 4);
        assert!(q.metrics.metrics.complexity_score.abs() < f64::EPSILON);
        assert!(q.cutting.is_some());
        assert_eq!(q.drilling_fee, 0);
        assert_eq!(q.physical_size_mm, PhysicalSize::new(80.0, 40.0));
    }

    #[test]
    fn tiny_shape_falls_back_but_still_quotes() {
        let mask = Mask::from_fn(50, 40, |x, y| (10..15).contains(&x) && (10..15).contains(&y));
        let q = quote_mask(mask, "test", &request(50.0, 40.0), &CuttingConfig::default());
        assert!(q.rectangle_fallback);
        assert_eq!(q.metrics.metrics.bbox_width_px, 50);
        assert!((q.metrics.metrics.fill_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ring_keyring_grows_the_physical_size() {
        let mask = Mask::from_fn(100, 100, |x, y| (20..80).contains(&x) && (30..80).contains(&y));
        let mut req = request(50.0, 50.0);
        req.options = CuttingOptions {
            product_type: ProductType::Keyring,
            hole_type: HoleType::Ring,
            attachment_position: AttachmentPosition::Top,
        };
        let config = CuttingConfig::default();
        let q = quote_mask(mask, "test", &req, &config);
        assert!(q.cutting.as_ref().unwrap().has_ring());
        // 3 mm edge distance + 4 mm hole + 1 mm margin on the vertical axis.
        assert_eq!(q.physical_size_mm, PhysicalSize::new(50.0, 58.0));
        assert_eq!(q.drilling_fee, config.drilling_fee);
        assert!(matches!(q.summary().hole, Some(Hole::Ring { .. })));
    }

    #[test]
    fn short_polygon_is_rejected() {
        let bytes = png_bytes(&transparent_rect(40, 40, 5, 5, 35, 35));
        let mut req = request(20.0, 20.0);
        req.polygon = Some(vec![PixelPoint::new(1, 1), PixelPoint::new(5, 5)]);
        let err =
            quote(&bytes, &req, &MaskExtractor::default(), &CuttingConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPolygon(2)));
    }

    #[test]
    fn summary_serializes_to_json() {
        let mask = Mask::from_fn(60, 60, |x, y| (10..50).contains(&x) && (10..50).contains(&y));
        let q = quote_mask(mask, "test", &request(30.0, 30.0), &CuttingConfig::default());
        let json = serde_json::to_value(q.summary()).unwrap();
        assert_eq!(json["mask_strategy"], "test");
        assert!(json["metrics"]["area_mm2"].is_number());
        assert!(json["metrics"]["complexity_score"].is_number());
    }
}
