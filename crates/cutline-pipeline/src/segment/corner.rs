//! Background colour estimation from the image corners.
//!
//! Product photos are usually shot on a plain backdrop that reaches all
//! four corners. Corner patches are quantized into coarse colour buckets;
//! if one bucket dominates, its mean colour is the background and every
//! pixel far enough from it is foreground.

use std::collections::HashMap;

use image::RgbImage;

use super::SegmentError;
use crate::morphology::{close, open};
use crate::types::Mask;

/// Side of the square patch sampled at each corner.
pub const PATCH_SIZE: u32 = 10;

/// Quantization step per channel (8 levels).
const BUCKET_WIDTH: u8 = 32;

/// Share of samples the dominant bucket must hold.
pub const MIN_BACKGROUND_SHARE: f64 = 0.5;

/// Euclidean RGB distance beyond which a pixel is foreground.
pub const COLOR_DISTANCE: f64 = 35.0;

/// Plausible foreground ratio range.
pub const MIN_FOREGROUND_RATIO: f64 = 0.01;
/// Upper end of the plausible foreground ratio range.
pub const MAX_FOREGROUND_RATIO: f64 = 0.95;

/// Radius of the open/close noise cleanup.
const CLEANUP_RADIUS: u8 = 2;

type Bucket = (u8, u8, u8);

pub(super) fn segment(rgb: &RgbImage) -> Result<Mask, SegmentError> {
    let samples = corner_samples(rgb);
    let background = dominant_color(&samples)?;

    let raw = Mask::from_fn(rgb.width(), rgb.height(), |x, y| {
        color_distance(rgb.get_pixel(x, y).0, background) > COLOR_DISTANCE
    });
    let mask = close(&open(&raw, CLEANUP_RADIUS), CLEANUP_RADIUS);

    let ratio = mask.foreground_ratio();
    if !(MIN_FOREGROUND_RATIO..=MAX_FOREGROUND_RATIO).contains(&ratio) {
        return Err(SegmentError::ImplausibleForeground { ratio });
    }
    Ok(mask)
}

/// Pixels of the four `PATCH_SIZE` corner patches, clipped to the image.
/// Patches overlap on images smaller than two patches.
fn corner_samples(rgb: &RgbImage) -> Vec<[u8; 3]> {
    let (w, h) = rgb.dimensions();
    let pw = PATCH_SIZE.min(w);
    let ph = PATCH_SIZE.min(h);
    let origins = [(0, 0), (w - pw, 0), (0, h - ph), (w - pw, h - ph)];
    let mut samples = Vec::with_capacity((pw * ph * 4) as usize);
    for (ox, oy) in origins {
        for y in oy..oy + ph {
            for x in ox..ox + pw {
                samples.push(rgb.get_pixel(x, y).0);
            }
        }
    }
    samples
}

/// Mean colour of the most frequent bucket, if it holds a majority.
fn dominant_color(samples: &[[u8; 3]]) -> Result<[f64; 3], SegmentError> {
    let mut counts: HashMap<Bucket, usize> = HashMap::new();
    for s in samples {
        *counts.entry(bucket(*s)).or_default() += 1;
    }
    // Break count ties on the bucket itself so the choice is deterministic.
    let (top, count) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .ok_or(SegmentError::NoDominantBackground { share: 0.0 })?;

    #[allow(clippy::cast_precision_loss)]
    let share = count as f64 / samples.len() as f64;
    if share < MIN_BACKGROUND_SHARE {
        return Err(SegmentError::NoDominantBackground { share });
    }

    let mut sum = [0.0f64; 3];
    for s in samples.iter().filter(|s| bucket(**s) == top) {
        for (acc, v) in sum.iter_mut().zip(s) {
            *acc += f64::from(*v);
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    Ok(sum.map(|v| v / n))
}

const fn bucket(c: [u8; 3]) -> Bucket {
    (c[0] / BUCKET_WIDTH, c[1] / BUCKET_WIDTH, c[2] / BUCKET_WIDTH)
}

fn color_distance(c: [u8; 3], background: [f64; 3]) -> f64 {
    let dr = f64::from(c[0]) - background[0];
    let dg = f64::from(c[1]) - background[1];
    let db = f64::from(c[2]) - background[2];
    dr.mul_add(dr, dg.mul_add(dg, db * db)).sqrt()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgb;

    fn subject_on(background: [u8; 3], subject: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(100, 80, |x, y| {
            if (30..70).contains(&x) && (20..60).contains(&y) {
                Rgb(subject)
            } else {
                Rgb(background)
            }
        })
    }

    #[test]
    fn uniform_backdrop_isolates_subject() {
        let mask = segment(&subject_on([240, 240, 235], [40, 90, 200])).unwrap();
        assert!(mask.is_foreground(50, 40));
        assert!(!mask.is_foreground(5, 5));
        assert!(!mask.is_foreground(95, 75));
    }

    #[test]
    fn dark_backdrop_also_works() {
        let mask = segment(&subject_on([10, 10, 10], [250, 200, 0])).unwrap();
        assert!(mask.is_foreground(50, 40));
        assert!(!mask.is_foreground(0, 0));
    }

    #[test]
    fn similar_colours_yield_implausible_ratio() {
        // Subject within the 35 distance of the backdrop.
        let err = segment(&subject_on([200, 200, 200], [210, 210, 210])).unwrap_err();
        assert!(matches!(
            err,
            SegmentError::ImplausibleForeground { ratio } if ratio < MIN_FOREGROUND_RATIO
        ));
    }

    #[test]
    fn busy_corners_have_no_dominant_bucket() {
        let noisy = RgbImage::from_fn(40, 40, |x, y| {
            let v = u8::try_from((x * 37 + y * 91) % 256).unwrap();
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(128)])
        });
        assert!(matches!(
            segment(&noisy),
            Err(SegmentError::NoDominantBackground { .. })
        ));
    }

    #[test]
    fn subject_filling_frame_is_rejected() {
        // Only the sampled corner patches show the backdrop.
        let img = RgbImage::from_fn(200, 200, |x, y| {
            if (x < 10 || x >= 190) && (y < 10 || y >= 190) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let err = segment(&img).unwrap_err();
        assert!(
            matches!(
                err,
                SegmentError::ImplausibleForeground { ratio } if ratio > MAX_FOREGROUND_RATIO
            ),
            "{err:?}"
        );
    }

    #[test]
    fn mean_colour_of_dominant_bucket() {
        let samples = vec![[200, 200, 200], [202, 202, 202], [10, 10, 10]];
        let c = dominant_color(&samples).unwrap();
        assert!((c[0] - 201.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_images_are_sampled_without_panicking() {
        let img = RgbImage::from_pixel(3, 2, Rgb([255, 255, 255]));
        assert_eq!(corner_samples(&img).len(), 24);
    }
}
