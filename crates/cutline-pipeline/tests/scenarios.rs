//! End-to-end scenarios through the public pipeline API.

#![allow(clippy::unwrap_used)]

use cutline_pipeline::{
    AttachmentPosition, CuttingConfig, CuttingOptions, HoleType, Mask, MaskExtractor, PhysicalSize,
    ProductType, QuoteRequest, analyze, generate_cutting_lines, quote, to_millimetres,
};
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgba, RgbaImage};

fn circle_mask() -> Mask {
    Mask::from_fn(500, 500, |x, y| {
        (f64::from(x) - 250.0).hypot(f64::from(y) - 250.0) <= 200.0
    })
}

fn keyring(position: AttachmentPosition, hole_type: HoleType) -> CuttingOptions {
    CuttingOptions {
        product_type: ProductType::Keyring,
        hole_type,
        attachment_position: position,
    }
}

#[test]
fn circle_is_round_and_simple() {
    let metrics = analyze(&circle_mask()).unwrap();
    assert!(metrics.circularity >= 0.9, "circularity {}", metrics.circularity);
    assert!((metrics.fill_ratio - 0.785).abs() < 0.02, "fill {}", metrics.fill_ratio);
    assert!(metrics.complexity_score < 0.2, "complexity {}", metrics.complexity_score);

    let scaled = to_millimetres(&metrics, PhysicalSize::new(100.0, 100.0));
    // 400 px across printed at 100 mm.
    assert!((scaled.scale - 0.25).abs() < 0.01);
    assert!((scaled.bbox_width_mm - 100.0).abs() < 1.0);
}

#[test]
fn cutting_lines_nest_around_the_shape() {
    let mask = circle_mask();
    let result = generate_cutting_lines(
        &mask,
        PhysicalSize::new(100.0, 100.0),
        CuttingOptions::default(),
        &CuttingConfig::default(),
    )
    .unwrap();
    assert!(result.print.mask.contains(&mask));
    assert!(result.cutting.mask.contains(&result.print.mask));
    assert!(result.cutting.mask.foreground_count() > result.print.mask.foreground_count());
    assert!(result.print.mask.foreground_count() > mask.foreground_count());
    assert!(result.hole.is_none());
}

#[test]
fn ring_hole_sits_above_the_cutting_line() {
    let result = generate_cutting_lines(
        &circle_mask(),
        PhysicalSize::new(100.0, 100.0),
        keyring(AttachmentPosition::Top, HoleType::Ring),
        &CuttingConfig::default(),
    )
    .unwrap();
    let top = result.cutting.contour.bounding_box().unwrap().y;
    let hole = result.hole.unwrap();
    assert!(hole.center().y < top, "hole {} vs top {top}", hole.center().y);
    assert!(result.has_ring());
}

#[test]
fn internal_hole_is_cut_out_of_the_cutting_region() {
    let result = generate_cutting_lines(
        &circle_mask(),
        PhysicalSize::new(100.0, 100.0),
        keyring(AttachmentPosition::Left, HoleType::Internal),
        &CuttingConfig::default(),
    )
    .unwrap();
    let center = result.hole.unwrap().center();
    let (cx, cy) = (u32::try_from(center.x).unwrap(), u32::try_from(center.y).unwrap());
    assert!(!result.cutting.mask.is_foreground(cx, cy));
    assert!(result.print.mask.is_foreground(cx, cy));
    assert!(center.x < 250);
}

#[test]
fn quote_from_png_bytes() {
    let img = RgbaImage::from_fn(200, 160, |x, y| {
        let inside = (f64::from(x) - 100.0).hypot(f64::from(y) - 80.0) <= 60.0;
        Rgba([30, 90, 200, if inside { 255 } else { 0 }])
    });
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), 200, 160, image::ExtendedColorType::Rgba8)
        .unwrap();

    let request = QuoteRequest {
        size_mm: PhysicalSize::new(60.0, 60.0),
        options: keyring(AttachmentPosition::Right, HoleType::Ring),
        polygon: None,
    };
    let config = CuttingConfig::default();
    let q = quote(&bytes, &request, &MaskExtractor::default(), &config).unwrap();
    assert_eq!(q.mask_strategy, "alpha");
    assert!(!q.rectangle_fallback);
    let cutting = q.cutting_metrics.unwrap();
    assert!(cutting.area_mm2 > 0.0);
    // The cutting line encloses the 120 px disc plus both offsets.
    assert!(cutting.cutting_bbox_px.0 > 120);
    assert_eq!(q.physical_size_mm, PhysicalSize::new(68.0, 60.0));
    assert_eq!(q.drilling_fee, config.drilling_fee);
}

#[test]
fn shape_touching_the_left_edge_gets_cutting_lines() {
    let mask = Mask::from_fn(200, 120, |x, y| x < 150 && (20..100).contains(&y));
    let metrics = analyze(&mask).unwrap();
    assert_eq!((metrics.bbox_width_px, metrics.bbox_height_px), (149, 79));

    let result = generate_cutting_lines(
        &mask,
        PhysicalSize::new(50.0, 30.0),
        CuttingOptions::default(),
        &CuttingConfig::default(),
    )
    .unwrap();
    assert!(result.cutting.mask.contains(&result.print.mask));
    assert!(result.print.mask.contains(&mask));
}

#[test]
fn every_component_is_nested() {
    let mask = Mask::from_fn(240, 120, |x, y| {
        (30..70).contains(&y) && ((20..60).contains(&x) || (180..220).contains(&x))
    });
    let result = generate_cutting_lines(
        &mask,
        PhysicalSize::new(80.0, 40.0),
        CuttingOptions::default(),
        &CuttingConfig::default(),
    )
    .unwrap();
    assert!(result.print.mask.contains(&mask));
    assert!(result.cutting.mask.contains(&result.print.mask));
}
