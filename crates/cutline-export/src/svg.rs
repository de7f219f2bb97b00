//! SVG export serializer.
//!
//! Converts a [`CuttingLineResult`] into an SVG document in millimetres
//! using the [`svg`] crate for document construction, XML escaping, and
//! path data formatting.
//!
//! The print line and cutting line each become a closed `<path>`; a
//! keyring hole becomes a `<circle>` (ring) or `<ellipse>` (internal).
//! The `viewBox` spans the geometry plus a small margin, so ring holes
//! outside the source image stay visible.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Ellipse, Path, Title};
use svg::node::{Node, Text, Value};

use cutline_pipeline::units::mm_per_px;
use cutline_pipeline::{Contour, CuttingLineResult, Hole, PhysicalSize};

/// Blank border around the geometry, in millimetres.
const MARGIN_MM: f64 = 2.0;
/// Stroke width of every line, in millimetres.
const STROKE_MM: f64 = 0.1;
/// Colour of the print line.
const PRINT_COLOR: &str = "blue";
/// Colour of the cutting line and holes.
const CUT_COLOR: &str = "red";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically by
/// the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized cutting configuration, emitted inside `<metadata>` in a
    /// namespaced `<cutline:config>` element.
    pub config_json: Option<&'a str>,
}

/// Build a closed SVG path `d` attribute from a contour, scaling pixel
/// coordinates by `scale`.
///
/// Returns an empty string for contours with fewer than 3 points.
///
/// # Examples
///
/// ```
/// use cutline_pipeline::{Contour, PixelPoint};
/// use cutline_export::build_path_data;
///
/// let triangle = Contour::new(vec![
///     PixelPoint::new(0, 0),
///     PixelPoint::new(10, 0),
///     PixelPoint::new(10, 10),
/// ]);
/// let d = build_path_data(&triangle, 0.5);
/// assert!(d.starts_with("M0,0 L5,0 L5,5"));
/// ```
#[must_use]
pub fn build_path_data(contour: &Contour, scale: f64) -> String {
    build_path_data_transformed(contour, scale, 0.0, 0.0)
}

/// Like [`build_path_data`] but also shifts every coordinate by
/// `(-offset_x, -offset_y)` millimetres after scaling.
fn build_path_data_transformed(
    contour: &Contour,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
) -> String {
    let points = contour.points();
    if points.len() < 3 {
        return String::new();
    }
    let tx = |x: i32, y: i32| {
        (
            f64::from(x).mul_add(scale, -offset_x),
            f64::from(y).mul_add(scale, -offset_y),
        )
    };

    let mut data = Data::new().move_to(tx(points[0].x, points[0].y));
    for p in &points[1..] {
        data = data.line_to(tx(p.x, p.y));
    }
    String::from(Value::from(data.close()))
}

/// Pixel-space extent of everything that will be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn of(result: &CuttingLineResult) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        let mut include = |x: f64, y: f64| {
            let b = bounds.get_or_insert(Self {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
            b.min_x = b.min_x.min(x);
            b.min_y = b.min_y.min(y);
            b.max_x = b.max_x.max(x);
            b.max_y = b.max_y.max(y);
        };
        for p in result
            .print
            .contour
            .points()
            .iter()
            .chain(result.cutting.contour.points())
        {
            include(f64::from(p.x), f64::from(p.y));
        }
        if let Some(hole) = result.hole {
            let (rx, ry) = hole_radii(&hole);
            let c = hole.center();
            include(f64::from(c.x) - rx, f64::from(c.y) - ry);
            include(f64::from(c.x) + rx, f64::from(c.y) + ry);
        }
        bounds
    }
}

fn hole_radii(hole: &Hole) -> (f64, f64) {
    match *hole {
        Hole::Ring { radius_px, .. } => (f64::from(radius_px), f64::from(radius_px)),
        Hole::Internal {
            width_px,
            height_px,
            ..
        } => (f64::from(width_px) / 2.0, f64::from(height_px) / 2.0),
    }
}

/// Format a millimetre value with at most three decimals.
fn mm(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_owned()
    } else {
        s.to_owned()
    }
}

/// Convert a cutting-line result to an SVG document string in millimetres.
///
/// Pixel coordinates are scaled by [`mm_per_px`] of the source image
/// against `size_mm`, the same scale used for the cutting metrics.
///
/// The returned string is a complete SVG document: an XML declaration,
/// the `<svg>` element with `width`/`height` in `mm`, optional metadata,
/// the print path, the cutting path and any hole.
#[must_use]
pub fn to_svg(
    result: &CuttingLineResult,
    size_mm: PhysicalSize,
    metadata: &SvgMetadata<'_>,
) -> String {
    let dimensions = result.cutting.mask.dimensions();
    let scale = mm_per_px(dimensions, size_mm);

    let bounds = Bounds::of(result).unwrap_or(Bounds {
        min_x: 0.0,
        min_y: 0.0,
        max_x: f64::from(dimensions.width),
        max_y: f64::from(dimensions.height),
    });
    let offset_x = bounds.min_x.mul_add(scale, -MARGIN_MM);
    let offset_y = bounds.min_y.mul_add(scale, -MARGIN_MM);
    let width_mm = (bounds.max_x - bounds.min_x).mul_add(scale, 2.0 * MARGIN_MM);
    let height_mm = (bounds.max_y - bounds.min_y).mul_add(scale, 2.0 * MARGIN_MM);

    let mut doc = Document::new()
        .set("width", format!("{}mm", mm(width_mm)))
        .set("height", format!("{}mm", mm(height_mm)))
        .set("viewBox", format!("0 0 {} {}", mm(width_mm), mm(height_mm)));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("cutline:config");
        config_el.assign("xmlns:cutline", "https://cutline.dev/ns/1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    for (id, line, color) in [
        ("print-line", &result.print.contour, PRINT_COLOR),
        ("cutting-line", &result.cutting.contour, CUT_COLOR),
    ] {
        let d = build_path_data_transformed(line, scale, offset_x, offset_y);
        if d.is_empty() {
            continue;
        }
        doc = doc.add(
            Path::new()
                .set("id", id)
                .set("d", d)
                .set("fill", "none")
                .set("stroke", color)
                .set("stroke-width", mm(STROKE_MM)),
        );
    }

    if let Some(hole) = result.hole {
        let c = hole.center();
        let cx = mm(f64::from(c.x).mul_add(scale, -offset_x));
        let cy = mm(f64::from(c.y).mul_add(scale, -offset_y));
        let (rx, ry) = hole_radii(&hole);
        match hole {
            Hole::Ring { .. } => {
                doc = doc.add(
                    Circle::new()
                        .set("id", "hole")
                        .set("cx", cx)
                        .set("cy", cy)
                        .set("r", mm(rx * scale))
                        .set("fill", "none")
                        .set("stroke", CUT_COLOR)
                        .set("stroke-width", mm(STROKE_MM)),
                );
            }
            Hole::Internal { .. } => {
                doc = doc.add(
                    Ellipse::new()
                        .set("id", "hole")
                        .set("cx", cx)
                        .set("cy", cy)
                        .set("rx", mm(rx * scale))
                        .set("ry", mm(ry * scale))
                        .set("fill", "none")
                        .set("stroke", CUT_COLOR)
                        .set("stroke-width", mm(STROKE_MM)),
                );
            }
        }
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
