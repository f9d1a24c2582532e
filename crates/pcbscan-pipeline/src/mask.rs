//! Binary mask construction and cleanup.
//!
//! Masks are `GrayImage`s holding only 0 and 255. Thresholding follows
//! the usual strict convention: a pixel is "above" the threshold when
//! its value is greater than it, never equal.

use image::Luma;
use imageproc::distance_transform::Norm;

use crate::types::GrayImage;

/// Foreground value in every mask.
pub const FOREGROUND: u8 = 255;

/// `255` where `value > threshold`, `0` elsewhere.
#[must_use = "returns the binary mask"]
pub fn threshold_binary(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if image.get_pixel(x, y).0[0] > threshold {
            FOREGROUND
        } else {
            0
        }])
    })
}

/// `0` where `value > threshold`, `255` elsewhere.
#[must_use = "returns the inverted binary mask"]
pub fn threshold_binary_inverted(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if image.get_pixel(x, y).0[0] > threshold {
            0
        } else {
            FOREGROUND
        }])
    })
}

/// Inverted binary mask at the Otsu level of `image`.
///
/// Returns the mask together with the chosen level. A uniform image has
/// level 0, so every non-zero pixel lands in the background.
#[must_use = "returns the inverted Otsu mask"]
pub fn otsu_inverted(image: &GrayImage) -> (GrayImage, u8) {
    let mut values = image.pixels().map(|p| p.0[0]);
    let first = values.next().unwrap_or(0);
    let level = if values.all(|v| v == first) {
        0
    } else {
        imageproc::contrast::otsu_level(image)
    };
    (threshold_binary_inverted(image, level), level)
}

/// Morphological opening then closing with a square structuring
/// element of side `2 * radius + 1`.
///
/// Opening removes specks smaller than the element; closing then fills
/// gaps of the same size. A radius of zero returns the mask unchanged.
#[must_use = "returns the cleaned mask"]
pub fn open_close(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let opened = imageproc::morphology::open(mask, Norm::LInf, radius);
    imageproc::morphology::close(&opened, Norm::LInf, radius)
}

/// Foreground of `mask` minus the foreground of `excluded`.
///
/// Both masks must have the same dimensions.
#[must_use = "returns the difference mask"]
pub fn subtract(mask: &GrayImage, excluded: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let keep = mask.get_pixel(x, y).0[0] == FOREGROUND
            && excluded.get_pixel(x, y).0[0] != FOREGROUND;
        Luma([if keep { FOREGROUND } else { 0 }])
    })
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels()
        .map(|p| u64::from(u8::from(p.0[0] == FOREGROUND)))
        .sum()
}
