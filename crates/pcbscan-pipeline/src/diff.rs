//! Highlighted-difference image for human review.
//!
//! Not used for region extraction: the review image thresholds the
//! absolute difference at a fixed cutoff, while extraction uses an
//! XOR mask with an automatic threshold.

use image::{Luma, Rgb};

use crate::color::{HIGHLIGHT_RED, to_gray};
use crate::mask::{FOREGROUND, threshold_binary};
use crate::resize::{ResampleFilter, resize_to_match};
use crate::types::{Dimensions, GrayImage, PipelineError, RgbImage};

/// Per-channel absolute difference of two same-sized images.
#[must_use = "returns the difference image"]
pub fn abs_diff(a: &RgbImage, b: &RgbImage) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let (pa, pb) = (a.get_pixel(x, y).0, b.get_pixel(x, y).0);
        Rgb(std::array::from_fn(|c| pa[c].abs_diff(pb[c])))
    })
}

/// Mask of pixels whose grayscale difference exceeds `threshold`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// size.
pub fn changed_mask(
    test: &RgbImage,
    reference: &RgbImage,
    threshold: u8,
) -> Result<GrayImage, PipelineError> {
    ensure_same_dimensions(test, reference)?;
    let difference = to_gray(&abs_diff(test, reference));
    Ok(threshold_binary(&difference, threshold))
}

/// Highlighted-difference image together with its change mask.
#[derive(Debug, Clone)]
pub struct Highlight {
    /// Test image (resized if needed) with changed pixels painted red.
    pub image: RgbImage,
    /// Mask of the painted pixels.
    pub changed: GrayImage,
}

/// Copy of the test image with every changed pixel painted pure red.
///
/// If the dimensions differ, the test image is first resized to the
/// reference dimensions with its aspect ratio preserved.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the aspect ratios
/// differ so that the resized test image still does not match.
pub fn visualize(
    test: &RgbImage,
    reference: &RgbImage,
    threshold: u8,
    filter: ResampleFilter,
) -> Result<RgbImage, PipelineError> {
    highlight(test, reference, threshold, filter).map(|h| h.image)
}

/// [`visualize`], also returning the change mask.
///
/// # Errors
///
/// Same as [`visualize`].
pub fn highlight(
    test: &RgbImage,
    reference: &RgbImage,
    threshold: u8,
    filter: ResampleFilter,
) -> Result<Highlight, PipelineError> {
    let resized;
    let test = if test.dimensions() == reference.dimensions() {
        test
    } else {
        resized = resize_to_match(test, Dimensions::of(reference), filter);
        &resized
    };

    let changed = changed_mask(test, reference, threshold)?;
    let mut image = test.clone();
    for (pixel, Luma([m])) in image.pixels_mut().zip(changed.pixels()) {
        if *m == FOREGROUND {
            *pixel = HIGHLIGHT_RED;
        }
    }
    Ok(Highlight { image, changed })
}

pub(crate) fn ensure_same_dimensions(
    test: &RgbImage,
    reference: &RgbImage,
) -> Result<(), PipelineError> {
    if test.dimensions() == reference.dimensions() {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch {
            test: Dimensions::of(test),
            reference: Dimensions::of(reference),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::count_foreground;

    #[test]
    fn abs_diff_is_per_channel() {
        let a = RgbImage::from_pixel(1, 1, Rgb([10, 200, 50]));
        let b = RgbImage::from_pixel(1, 1, Rgb([30, 100, 50]));
        assert_eq!(abs_diff(&a, &b).get_pixel(0, 0), &Rgb([20, 100, 0]));
    }

    #[test]
    fn identical_images_highlight_nothing() {
        let img = RgbImage::from_fn(10, 10, |x, y| Rgb([x as u8 * 20, y as u8 * 20, 0]));
        let out = visualize(&img, &img, 30, ResampleFilter::Triangle).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn large_difference_is_painted_red() {
        let reference = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let mut test = reference.clone();
        test.put_pixel(3, 4, Rgb([255, 255, 255]));
        let out = visualize(&test, &reference, 30, ResampleFilter::Triangle).unwrap();
        assert_eq!(out.get_pixel(3, 4), &HIGHLIGHT_RED);
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn difference_at_cutoff_is_not_highlighted() {
        let reference = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let test = RgbImage::from_pixel(4, 4, Rgb([130, 130, 130]));
        let mask = changed_mask(&test, &reference, 30).unwrap();
        assert_eq!(count_foreground(&mask), 0);
        let test = RgbImage::from_pixel(4, 4, Rgb([131, 131, 131]));
        let mask = changed_mask(&test, &reference, 30).unwrap();
        assert_eq!(count_foreground(&mask), 16);
    }

    #[test]
    fn highlight_mask_matches_painted_pixels() {
        let reference = RgbImage::from_pixel(6, 6, Rgb([255, 0, 0]));
        let mut test = RgbImage::from_pixel(6, 6, Rgb([0, 0, 0]));
        test.put_pixel(2, 2, Rgb([255, 0, 0]));
        let h = highlight(&test, &reference, 30, ResampleFilter::Triangle).unwrap();
        assert_eq!(count_foreground(&h.changed), 35);
        assert_eq!(h.image.get_pixel(0, 0), &HIGHLIGHT_RED);
    }

    #[test]
    fn larger_test_is_resized_to_reference() {
        let reference = RgbImage::from_pixel(20, 10, Rgb([50, 50, 50]));
        let test = RgbImage::from_pixel(40, 20, Rgb([50, 50, 50]));
        let out = visualize(&test, &reference, 30, ResampleFilter::Triangle).unwrap();
        assert_eq!(out.dimensions(), (20, 10));
    }

    #[test]
    fn irreconcilable_aspect_is_an_error() {
        let reference = RgbImage::new(20, 10);
        let test = RgbImage::new(10, 20);
        assert!(matches!(
            visualize(&test, &reference, 30, ResampleFilter::Triangle),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }
}
