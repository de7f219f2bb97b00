//! Closed-polygon simplification using the Ramer-Douglas-Peucker
//! algorithm.
//!
//! Contours are closed, so the open-polyline recursion is anchored at the
//! first point and at the point farthest from it, and each half is
//! simplified independently. A final cyclic pass drops vertices that sit
//! within tolerance of the line through their neighbours, which removes
//! an anchor that happened to land mid-edge.

use crate::types::{Contour, PixelPoint};

/// Simplify a closed contour.
///
/// Points within `tolerance` pixels of the chord between retained
/// neighbours are removed. Contours with fewer than 3 points are returned
/// unchanged, and the result never drops below 3 vertices.
#[must_use = "returns the simplified contour"]
pub fn simplify_closed(contour: &Contour, tolerance: f64) -> Contour {
    let points = contour.points();
    let n = points.len();
    if n < 3 {
        return contour.clone();
    }

    let first = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| first.distance(**a).total_cmp(&first.distance(**b)))
        .map_or(0, |(i, _)| i);
    if far == 0 {
        // Every point coincides with the first.
        return contour.clone();
    }

    // Index `n` stands for the first point again, closing the ring.
    let ring: Vec<PixelPoint> = points.iter().copied().chain(std::iter::once(first)).collect();
    let mut kept = vec![false; n + 1];
    kept[0] = true;
    kept[far] = true;
    kept[n] = true;
    rdp_recurse(&ring, 0, far, tolerance, &mut kept);
    rdp_recurse(&ring, far, n, tolerance, &mut kept);

    if kept[..n].iter().filter(|&&k| k).count() < 3 {
        // Keep the apex farthest from the anchor chord so a triangle remains.
        let apex = (1..n)
            .filter(|&i| i != far)
            .map(|i| (i, perpendicular_distance(points[i], first, points[far])))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match apex {
            Some((i, d)) if d > 0.0 => kept[i] = true,
            _ => return contour.clone(),
        }
    }

    let mut simplified: Vec<PixelPoint> = ring[..n]
        .iter()
        .zip(&kept[..n])
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    drop_collinear(&mut simplified, tolerance);
    Contour::new(simplified)
}

/// Remove vertices within `tolerance` of the line through their cyclic
/// neighbours until none remain or only a triangle is left.
fn drop_collinear(vertices: &mut Vec<PixelPoint>, tolerance: f64) {
    let mut changed = true;
    while changed && vertices.len() > 3 {
        changed = false;
        let mut i = 0;
        while i < vertices.len() && vertices.len() > 3 {
            let len = vertices.len();
            let prev = vertices[(i + len - 1) % len];
            let next = vertices[(i + 1) % len];
            if perpendicular_distance(vertices[i], prev, next) <= tolerance {
                vertices.remove(i);
                changed = true;
            } else {
                i += 1;
            }
        }
    }
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(
    points: &[PixelPoint],
    start: usize,
    end: usize,
    tolerance: f64,
    kept: &mut [bool],
) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: PixelPoint, a: PixelPoint, b: PixelPoint) -> f64 {
    let dx = f64::from(b.x - a.x);
    let dy = f64::from(b.y - a.y);
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(f64::from(a.y - p.y), -(dy * f64::from(a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn contour(points: &[(i32, i32)]) -> Contour {
        Contour::new(points.iter().map(|&(x, y)| PixelPoint::new(x, y)).collect())
    }

    /// Boundary of an axis-aligned rectangle walked pixel by pixel.
    fn pixel_rectangle(w: i32, h: i32) -> Contour {
        let mut pts = Vec::new();
        pts.extend((0..w).map(|x| (x, 0)));
        pts.extend((0..h).map(|y| (w, y)));
        pts.extend((1..=w).rev().map(|x| (x, h)));
        pts.extend((1..=h).rev().map(|y| (0, y)));
        contour(&pts)
    }

    #[test]
    fn short_contours_unchanged() {
        let c = contour(&[(0, 0), (5, 5)]);
        assert_eq!(simplify_closed(&c, 1.0), c);
        assert!(simplify_closed(&Contour::new(Vec::new()), 1.0).is_empty());
    }

    #[test]
    fn pixel_rectangle_collapses_to_four_corners() {
        let simplified = simplify_closed(&pixel_rectangle(40, 25), 1.0);
        let mut corners: Vec<PixelPoint> = simplified.points().to_vec();
        corners.sort_by_key(|p| (p.x, p.y));
        assert_eq!(
            corners,
            vec![
                PixelPoint::new(0, 0),
                PixelPoint::new(0, 25),
                PixelPoint::new(40, 0),
                PixelPoint::new(40, 25),
            ]
        );
    }

    #[test]
    fn mid_edge_anchor_is_dropped() {
        // Start halfway along the top edge.
        let mut pts: Vec<PixelPoint> = pixel_rectangle(20, 20).into_points();
        pts.rotate_left(10);
        let simplified = simplify_closed(&Contour::new(pts), 1.0);
        assert_eq!(simplified.len(), 4);
        assert!(!simplified.points().contains(&PixelPoint::new(10, 0)));
    }

    #[test]
    fn staircase_is_smoothed_at_one_pixel() {
        // A right triangle whose hypotenuse is a 1-pixel staircase.
        let mut pts = vec![(0, 0), (10, 0)];
        for i in 0..10 {
            pts.push((10 - i, i + 1));
            pts.push((9 - i, i + 1));
        }
        let simplified = simplify_closed(&contour(&pts), 1.0);
        assert_eq!(simplified.len(), 3, "{:?}", simplified.points());
    }

    #[test]
    fn large_tolerance_keeps_a_triangle() {
        let c = pixel_rectangle(10, 10);
        assert_eq!(simplify_closed(&c, 100.0).len(), 3);
    }

    #[test]
    fn coincident_points_unchanged() {
        let c = contour(&[(3, 3), (3, 3), (3, 3)]);
        assert_eq!(simplify_closed(&c, 1.0), c);
    }

    #[test]
    fn perpendicular_distance_basic() {
        let d = perpendicular_distance(
            PixelPoint::new(5, 3),
            PixelPoint::new(0, 0),
            PixelPoint::new(10, 0),
        );
        assert!((d - 3.0).abs() < 1e-12);
    }
}
