//! Binary morphology on [`Mask`]s.
//!
//! Opening, closing and erosion delegate to [`imageproc::morphology`].
//! Disk dilation is implemented here: `imageproc` only offers L1/L∞
//! structuring elements, and an offset contour needs a round one so
//! corners grow into arcs.

use imageproc::distance_transform::Norm;

use crate::types::Mask;

/// Largest disk radius applied in one dilation pass. Larger offsets are
/// reached by repeated passes, since Minkowski sums of disks are disks.
pub const MAX_PASS_RADIUS: u32 = 64;

/// Morphological open (erode then dilate) with a diamond element of
/// radius `k`. Removes specks smaller than the element.
#[must_use]
pub fn open(mask: &Mask, k: u8) -> Mask {
    Mask::from_binary(imageproc::morphology::open(mask.as_image(), Norm::L1, k))
}

/// Morphological close (dilate then erode) with a diamond element of
/// radius `k`. Fills pinholes and narrow gaps.
#[must_use]
pub fn close(mask: &Mask, k: u8) -> Mask {
    Mask::from_binary(imageproc::morphology::close(mask.as_image(), Norm::L1, k))
}

/// Erode with a square element of radius `k`.
#[must_use]
pub fn erode(mask: &Mask, k: u8) -> Mask {
    Mask::from_binary(imageproc::morphology::erode(mask.as_image(), Norm::LInf, k))
}

/// Inner boundary band of width `thickness`: the mask minus its erosion.
#[must_use]
pub fn outline(mask: &Mask, thickness: u8) -> Mask {
    mask.difference(&erode(mask, thickness))
}

/// Dilate by a Euclidean disk of radius `radius` pixels.
///
/// The radius is split into passes of at most [`MAX_PASS_RADIUS`]
/// pixels. A radius below one pixel returns a copy.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn dilate_disk(mask: &Mask, radius: f64) -> Mask {
    if !radius.is_finite() || radius < 1.0 {
        return mask.clone();
    }
    let total = radius.round() as u32;
    let passes = total.div_ceil(MAX_PASS_RADIUS);
    let mut remaining = total;
    let mut current = mask.clone();
    for pass in 0..passes {
        let left = passes - pass;
        let step = remaining.div_ceil(left);
        current = dilate_disk_once(&current, step);
        remaining -= step;
    }
    current
}

/// Close with a Euclidean disk of radius `radius`: dilate, then erode
/// by dilating the complement.
#[must_use]
pub fn close_disk(mask: &Mask, radius: f64) -> Mask {
    let dilated = dilate_disk(mask, radius);
    dilate_disk(&dilated.inverted(), radius).inverted()
}

/// Single-pass disk dilation, `O(w * h * (2r + 1))`.
///
/// Per-row prefix counts answer "is any foreground pixel within this
/// horizontal span" in constant time; the disk is the union of one span
/// per row offset.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn dilate_disk_once(mask: &Mask, r: u32) -> Mask {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    let mut prefix = vec![0u32; (w + 1) * h];
    for y in 0..h {
        let row = &mut prefix[y * (w + 1)..(y + 1) * (w + 1)];
        for x in 0..w {
            let fg = u32::from(mask.is_foreground(x as u32, y as u32));
            row[x + 1] = row[x] + fg;
        }
    }

    let r = r as usize;
    let half_widths: Vec<usize> = (0..=r)
        .map(|dy| ((r * r - dy * dy) as f64).sqrt().floor() as usize)
        .collect();

    Mask::from_fn(mask.width(), mask.height(), |x, y| {
        let (x, y) = (x as usize, y as usize);
        let y_lo = y.saturating_sub(r);
        let y_hi = (y + r).min(h - 1);
        (y_lo..=y_hi).any(|yy| {
            let hw = half_widths[yy.abs_diff(y)];
            let x_lo = x.saturating_sub(hw);
            let x_hi = (x + hw).min(w - 1);
            let row = &prefix[yy * (w + 1)..(yy + 1) * (w + 1)];
            row[x_hi + 1] > row[x_lo]
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dot(size: u32, cx: u32, cy: u32) -> Mask {
        Mask::from_fn(size, size, |x, y| x == cx && y == cy)
    }

    #[test]
    fn zero_radius_is_identity() {
        let mask = dot(9, 4, 4);
        assert_eq!(dilate_disk(&mask, 0.0), mask);
        assert_eq!(dilate_disk(&mask, f64::NAN), mask);
    }

    #[test]
    fn disk_dilation_of_a_point_is_round() {
        let out = dilate_disk(&dot(41, 20, 20), 10.0);
        // On-axis extremes are inside; the bounding corner is not.
        assert!(out.is_foreground(30, 20));
        assert!(out.is_foreground(20, 10));
        assert!(!out.is_foreground(31, 20));
        assert!(!out.is_foreground(28, 28));
        assert!(out.is_foreground(27, 27));
        let area = out.foreground_count();
        // π·10² ≈ 314, lattice count for r = 10 is 317.
        assert!((300..=330).contains(&area), "area {area}");
    }

    #[test]
    fn multi_pass_matches_requested_radius() {
        let out = dilate_disk(&dot(301, 150, 150), 140.0);
        assert!(out.is_foreground(290, 150));
        assert!(!out.is_foreground(292, 150));
        assert!(out.is_foreground(150, 10));
    }

    #[test]
    fn dilation_is_a_superset() {
        let mask = Mask::from_fn(30, 30, |x, y| (10..20).contains(&x) && (12..18).contains(&y));
        let out = dilate_disk(&mask, 3.0);
        assert!(out.contains(&mask));
        assert!(out.foreground_count() > mask.foreground_count());
    }

    #[test]
    fn open_removes_specks_and_close_fills_pinholes() {
        let speck = dot(20, 10, 10);
        assert_eq!(open(&speck, 1).foreground_count(), 0);

        let holed = Mask::from_fn(20, 20, |x, y| {
            (4..16).contains(&x) && (4..16).contains(&y) && !(x == 10 && y == 10)
        });
        assert!(close(&holed, 1).is_foreground(10, 10));
    }

    #[test]
    fn disk_close_bridges_a_gap_and_keeps_the_outside() {
        let two_blocks = Mask::from_fn(40, 20, |x, y| {
            (5..10).contains(&y) && ((5..18).contains(&x) || (21..35).contains(&x))
        });
        let closed = close_disk(&two_blocks, 3.0);
        assert!(closed.is_foreground(19, 7));
        assert!(closed.contains(&two_blocks));
        assert!(!closed.is_foreground(2, 7));
        assert!(!closed.is_foreground(19, 15));
    }

    #[test]
    fn outline_is_a_thin_band() {
        let mask = Mask::from_fn(20, 20, |x, y| (4..16).contains(&x) && (4..16).contains(&y));
        let band = outline(&mask, 1);
        assert!(band.is_foreground(4, 10));
        assert!(!band.is_foreground(10, 10));
        assert!(mask.contains(&band));
    }
}
