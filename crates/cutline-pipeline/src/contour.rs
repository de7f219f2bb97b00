//! Contour tracing and rasterization.
//!
//! Outer borders come from `imageproc::contours::find_contours`
//! (Suzuki-Abe border following); hole borders are discarded, so a traced
//! contour always describes a region with its holes filled.
//!
//! The tracer misclassifies a border that starts in column 0, so masks are
//! traced inside a one-pixel background frame and shifted back.

use image::{GrayImage, Luma};
use imageproc::contours::BorderType;
use imageproc::point::Point;

use crate::types::{Contour, FOREGROUND, Mask, PixelPoint};

/// Outer borders of every connected foreground region.
#[must_use]
pub fn outer_contours(mask: &Mask) -> Vec<Contour> {
    let framed = framed(mask);
    imageproc::contours::find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| {
            Contour::new(
                c.points
                    .into_iter()
                    .map(|p| PixelPoint::new(p.x - 1, p.y - 1))
                    .collect(),
            )
        })
        .collect()
}

/// Copy of `mask` surrounded by one pixel of background on every side.
fn framed(mask: &Mask) -> GrayImage {
    let mut canvas = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut canvas, mask.as_image(), 1, 1);
    canvas
}

/// The outer contour with the largest enclosed area, or `None` if the
/// mask has no foreground.
///
/// Ties resolve to the contour traced first.
#[must_use]
pub fn largest_outer_contour(mask: &Mask) -> Option<Contour> {
    outer_contours(mask)
        .into_iter()
        .rev()
        .max_by(|a, b| a.area().total_cmp(&b.area()))
}

/// Fill a contour into a fresh `width` x `height` mask.
///
/// The boundary pixels are themselves foreground, so a contour traced
/// from a mask rasterizes back to a superset of that region with its
/// holes filled. Points outside the canvas are clipped.
#[must_use]
pub fn rasterize(contour: &Contour, width: u32, height: u32) -> Mask {
    let mut canvas = GrayImage::new(width, height);

    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(contour.len());
    for &p in contour.points() {
        let p = Point::from(p);
        if polygon.last() != Some(&p) {
            polygon.push(p);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    // draw_polygon_mut panics on an empty polygon or one that repeats its
    // first point at the end; both are excluded above.
    if polygon.len() >= 3 {
        imageproc::drawing::draw_polygon_mut(&mut canvas, &polygon, Luma([FOREGROUND]));
    }

    for p in contour.points() {
        if let (Ok(x), Ok(y)) = (u32::try_from(p.x), u32::try_from(p.y)) {
            if x < width && y < height {
                canvas.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    Mask::from_binary(canvas)
}
