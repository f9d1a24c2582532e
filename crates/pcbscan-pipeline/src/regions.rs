//! Changed-region extraction.
//!
//! Isolates what differs between a test image and its reference without
//! pixel-perfect registration:
//!
//! 1. Bring both images onto a common grid (aspect-preserving resize to
//!    the per-axis maximum of the two sizes)
//! 2. Per-channel bitwise XOR
//! 3. Grayscale, inverted Otsu threshold -> "unchanged" mask
//! 4. Paint every changed test pixel with the marker color
//! 5. HSV conversion and marker-band filter, restricted to changed
//!    pixels so board colors inside the band never count on their own
//! 6. Opening then closing to drop specks and fill pinholes
//! 7. External contours -> bounding rectangles
//! 8. Pad each rectangle so the classifier sees surrounding context

use image::{Luma, Rgb};
use tracing::debug;

use crate::color::{MARKER_GREEN, in_range, to_gray, to_hsv};
use crate::contour::external_boxes;
use crate::diff::ensure_same_dimensions;
use crate::mask::{FOREGROUND, count_foreground, open_close, otsu_inverted, subtract};
use crate::resize::{ResampleFilter, resize_to_match};
use crate::types::{BoundingBox, Dimensions, GrayImage, InspectionConfig, PipelineError, RgbImage};

/// Output of [`extract_regions`].
#[derive(Debug, Clone)]
pub struct RegionExtraction {
    /// Test image on the common grid. Region boxes are in its
    /// coordinates, so crops must come from this image.
    pub test_image: RgbImage,
    /// Padded candidate boxes in contour discovery order.
    pub boxes: Vec<BoundingBox>,
    /// Cleaned candidate mask (after morphology).
    pub mask: GrayImage,
    /// Otsu level chosen for the XOR image.
    pub otsu_level: u8,
}

/// Resize `test` and `reference` onto a common grid.
///
/// Images that already match are returned unchanged. Otherwise both are
/// fitted to the per-axis maximum of their dimensions.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the aspect ratios
/// differ enough that the fitted sizes still disagree.
pub fn normalize_pair(
    test: &RgbImage,
    reference: &RgbImage,
    filter: ResampleFilter,
) -> Result<(RgbImage, RgbImage), PipelineError> {
    if test.dimensions() == reference.dimensions() {
        return Ok((test.clone(), reference.clone()));
    }

    let target = Dimensions::of(test).max_per_axis(Dimensions::of(reference));
    let test = resize_to_match(test, target, filter);
    let reference = resize_to_match(reference, target, filter);
    debug!(
        test = %Dimensions::of(&test),
        reference = %Dimensions::of(&reference),
        %target,
        "normalized image pair"
    );
    ensure_same_dimensions(&test, &reference)?;
    Ok((test, reference))
}

/// Per-channel bitwise XOR of two same-sized images.
#[must_use = "returns the XOR image"]
pub fn xor_images(a: &RgbImage, b: &RgbImage) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let (pa, pb) = (a.get_pixel(x, y).0, b.get_pixel(x, y).0);
        Rgb(std::array::from_fn(|c| pa[c] ^ pb[c]))
    })
}

/// Copy of `test` with every pixel outside `unchanged` set to `marker`.
#[must_use = "returns the painted image"]
pub fn paint_changed(test: &RgbImage, unchanged: &GrayImage, marker: Rgb<u8>) -> RgbImage {
    let mut painted = test.clone();
    for (pixel, Luma([m])) in painted.pixels_mut().zip(unchanged.pixels()) {
        if *m != FOREGROUND {
            *pixel = marker;
        }
    }
    painted
}

/// Extract padded candidate boxes for every region where `test`
/// differs from `reference`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the two images cannot
/// be brought onto a common grid.
pub fn extract_regions(
    test: &RgbImage,
    reference: &RgbImage,
    config: &InspectionConfig,
) -> Result<RegionExtraction, PipelineError> {
    let (test, reference) = normalize_pair(test, reference, config.resample_filter)?;

    let xor = xor_images(&test, &reference);
    let (unchanged, otsu_level) = otsu_inverted(&to_gray(&xor));
    let painted = paint_changed(&test, &unchanged, MARKER_GREEN);
    let candidates = subtract(&in_range(&to_hsv(&painted), &config.marker_band), &unchanged);
    let mask = open_close(&candidates, config.morphology_radius);

    let boxes: Vec<BoundingBox> = external_boxes(&mask)
        .into_iter()
        .map(|b| b.padded(config.region_padding))
        .collect();

    debug!(
        otsu_level,
        candidate_pixels = count_foreground(&candidates),
        cleaned_pixels = count_foreground(&mask),
        regions = boxes.len(),
        "extracted candidate regions"
    );

    Ok(RegionExtraction {
        test_image: test,
        boxes,
        mask,
        otsu_level,
    })
}
