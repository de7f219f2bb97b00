//! Gaussian smoothing of binary masks.
//!
//! The offset generator and preview tab builder describe blurs by an odd
//! kernel size rather than a sigma. [`sigma_for_kernel`] maps one to the
//! other, and [`smooth_mask`] blurs then re-binarizes at 127 so the
//! result is again a [`Mask`].

use image::GrayImage;

use crate::types::Mask;

/// Re-binarization level applied after blurring a mask.
pub const MASK_THRESHOLD: u8 = 127;

/// Round `size` up to the next odd number (`size | 1`).
#[must_use]
pub const fn odd_kernel(size: u32) -> u32 {
    size | 1
}

/// Gaussian sigma matching an odd kernel size.
///
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8`, the conventional rule used when
/// only the kernel extent is specified.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    let k = kernel.max(1) as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(raster: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || !sigma.is_finite() {
        return raster.clone();
    }

    imageproc::filter::gaussian_blur_f32(raster, sigma)
}

/// Blur a mask with a kernel of `kernel` pixels and re-binarize it at
/// [`MASK_THRESHOLD`].
#[must_use = "returns the smoothed mask"]
pub fn smooth_mask(mask: &Mask, kernel: u32) -> Mask {
    let blurred = gaussian_blur(mask.as_image(), sigma_for_kernel(odd_kernel(kernel)));
    Mask::from_threshold(&blurred, MASK_THRESHOLD)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square_mask(size: u32, lo: u32, hi: u32) -> Mask {
        Mask::from_fn(size, size, |x, y| (lo..hi).contains(&x) && (lo..hi).contains(&y))
    }

    #[test]
    fn odd_kernel_rounds_even_sizes_up() {
        assert_eq!(odd_kernel(6), 7);
        assert_eq!(odd_kernel(7), 7);
        assert_eq!(odd_kernel(0), 1);
    }

    #[test]
    fn sigma_grows_with_kernel() {
        assert!((sigma_for_kernel(3) - 0.8).abs() < 1e-6);
        assert!(sigma_for_kernel(7) > sigma_for_kernel(3));
        assert!(sigma_for_kernel(1) > 0.0);
    }

    #[test]
    fn zero_sigma_returns_clone() {
        let img = GrayImage::from_fn(4, 4, |x, _| image::Luma([u8::try_from(x * 60).unwrap()]));
        assert_eq!(gaussian_blur(&img, 0.0), img);
        assert_eq!(gaussian_blur(&img, -1.0), img);
    }

    #[test]
    fn smoothing_a_large_square_preserves_its_interior() {
        let mask = square_mask(60, 15, 45);
        let smoothed = smooth_mask(&mask, 7);
        assert!(smoothed.is_foreground(30, 30));
        assert!(!smoothed.is_foreground(2, 2));
        let before = mask.foreground_count();
        let after = smoothed.foreground_count();
        assert!(after.abs_diff(before) < before / 10, "{before} vs {after}");
    }

    #[test]
    fn smoothing_removes_isolated_speck() {
        let mask = Mask::from_fn(30, 30, |x, y| x == 15 && y == 15);
        assert_eq!(smooth_mask(&mask, 7).foreground_count(), 0);
    }
}
