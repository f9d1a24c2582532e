//! Color-space conversions.
//!
//! Every image in the pipeline carries its color space in its type:
//! [`RgbImage`] for decoded color images, [`GrayImage`] for luminance
//! and masks, and [`HsvImage`] for hue/saturation/value. Moving between
//! them only happens through the named functions in this module, so a
//! channel-order mix-up cannot compile.
//!
//! HSV uses the 8-bit convention common to machine-vision tooling:
//! hue is halved into `0..=180`, saturation and value span `0..=255`.

use image::{ImageBuffer, Luma, Rgb};
use serde::{Deserialize, Serialize};

use crate::types::{GrayImage, RgbImage};

/// Pure red, used to highlight changed pixels in the review image.
pub const HIGHLIGHT_RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Pure green, painted over changed pixels before the HSV filter.
pub const MARKER_GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// A single HSV pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue in half-degrees (`0..=180`).
    pub h: u8,
    /// Saturation (`0..=255`).
    pub s: u8,
    /// Value (`0..=255`).
    pub v: u8,
}

impl Hsv {
    /// Largest hue a band may select (`359` degrees, halved).
    pub const MAX_HUE: u8 = 180;
}

/// Inclusive per-channel HSV range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    /// Lower bound, inclusive on every channel.
    pub lower: Hsv,
    /// Upper bound, inclusive on every channel.
    pub upper: Hsv,
}

impl HsvRange {
    /// Whether `pixel` lies within the range on all three channels.
    #[must_use]
    pub const fn contains(&self, pixel: Hsv) -> bool {
        pixel.h >= self.lower.h
            && pixel.h <= self.upper.h
            && pixel.s >= self.lower.s
            && pixel.s <= self.upper.s
            && pixel.v >= self.lower.v
            && pixel.v <= self.upper.v
    }
}

/// An image in 8-bit HSV.
///
/// Stored as three interleaved bytes per pixel but deliberately not an
/// `RgbImage`: the only way to read it is through [`HsvImage::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsvImage(ImageBuffer<Rgb<u8>, Vec<u8>>);

impl HsvImage {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// HSV value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds, like
    /// [`ImageBuffer::get_pixel`].
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Hsv {
        let [h, s, v] = self.0.get_pixel(x, y).0;
        Hsv { h, s, v }
    }
}

/// Convert one RGB pixel to 8-bit HSV.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> Hsv {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = f32::from(max - min);
    let v = max;

    let s = if max == 0 {
        0
    } else {
        (delta * 255.0 / f32::from(max)).round() as u8
    };

    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let hue_degrees = if max == min {
        0.0
    } else if max == r {
        60.0 * (gf - bf) / delta
    } else if max == g {
        60.0f32.mul_add((bf - rf) / delta, 120.0)
    } else {
        60.0f32.mul_add((rf - gf) / delta, 240.0)
    };
    let hue_degrees = if hue_degrees < 0.0 {
        hue_degrees + 360.0
    } else {
        hue_degrees
    };

    Hsv {
        h: (hue_degrees / 2.0).round() as u8,
        s,
        v,
    }
}

/// Convert an RGB image to HSV.
#[must_use = "returns the converted image"]
pub fn to_hsv(image: &RgbImage) -> HsvImage {
    HsvImage(ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let Hsv { h, s, v } = rgb_to_hsv(*image.get_pixel(x, y));
        Rgb([h, s, v])
    }))
}

/// Convert an RGB image to single-channel luminance.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}

/// Binary mask of pixels inside `range`: 255 inside, 0 outside.
#[must_use = "returns the range mask"]
pub fn in_range(image: &HsvImage, range: &HsvRange) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if range.contains(image.get(x, y)) { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_colors_convert_to_expected_hues() {
        assert_eq!(
            rgb_to_hsv(Rgb([255, 0, 0])),
            Hsv {
                h: 0,
                s: 255,
                v: 255
            }
        );
        assert_eq!(
            rgb_to_hsv(MARKER_GREEN),
            Hsv {
                h: 60,
                s: 255,
                v: 255
            }
        );
        assert_eq!(
            rgb_to_hsv(Rgb([0, 0, 255])),
            Hsv {
                h: 120,
                s: 255,
                v: 255
            }
        );
    }

    #[test]
    fn grays_have_zero_hue_and_saturation() {
        for level in [0u8, 64, 200, 255] {
            let hsv = rgb_to_hsv(Rgb([level, level, level]));
            assert_eq!(hsv.h, 0);
            assert_eq!(hsv.s, 0);
            assert_eq!(hsv.v, level);
        }
    }

    #[test]
    fn magenta_wraps_negative_hue() {
        // 300 degrees -> 150 in half-degree units.
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 255])).h, 150);
    }

    #[test]
    fn marker_band_selects_marker_only() {
        let band = crate::InspectionConfig::DEFAULT_MARKER_BAND;
        assert!(band.contains(rgb_to_hsv(MARKER_GREEN)));
        assert!(!band.contains(rgb_to_hsv(HIGHLIGHT_RED)));
        assert!(!band.contains(rgb_to_hsv(Rgb([255, 255, 255]))));
        assert!(!band.contains(rgb_to_hsv(Rgb([0, 0, 0]))));
    }

    #[test]
    fn in_range_produces_binary_mask() {
        let img = RgbImage::from_fn(4, 1, |x, _| {
            if x % 2 == 0 {
                MARKER_GREEN
            } else {
                Rgb([255, 255, 255])
            }
        });
        let mask = in_range(&to_hsv(&img), &crate::InspectionConfig::DEFAULT_MARKER_BAND);
        let values: Vec<u8> = mask.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, [255, 0, 255, 0]);
    }

    #[test]
    fn hsv_image_preserves_dimensions() {
        let hsv = to_hsv(&RgbImage::new(7, 3));
        assert_eq!((hsv.width(), hsv.height()), (7, 3));
    }
}
