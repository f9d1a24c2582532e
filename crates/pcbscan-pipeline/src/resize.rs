//! Aspect-preserving resize used to bring test and reference images
//! onto a common pixel grid.
//!
//! The longer source side is scaled to the matching target side and the
//! other side follows by the same ratio, truncated. Square and landscape
//! sources scale by width; portrait sources scale by height.

use std::fmt;

use image::{GenericImageView, ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Resampling filter used for every resize in the pipeline.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, close to area averaging when
    /// shrinking by small factors.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    #[must_use]
    pub const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Dimensions `source` takes when fitted to `target` with its aspect
/// ratio preserved.
///
/// When the source is taller than wide the output height equals
/// `target.height`; otherwise the output width equals `target.width`.
/// The dependent side is truncated and never drops below one pixel.
#[must_use]
pub fn fit_dimensions(source: Dimensions, target: Dimensions) -> Dimensions {
    let (w, h) = (u64::from(source.width), u64::from(source.height.max(1)));
    if source.height > source.width {
        let scaled = w * u64::from(target.height) / h;
        Dimensions::new(clamp_side(scaled), target.height.max(1))
    } else {
        let scaled = h * u64::from(target.width) / w.max(1);
        Dimensions::new(target.width.max(1), clamp_side(scaled))
    }
}

fn clamp_side(side: u64) -> u32 {
    u32::try_from(side).unwrap_or(u32::MAX).max(1)
}

/// Resize `image` to fit `target` while preserving its aspect ratio.
#[must_use = "returns the resized image"]
pub fn resize_to_match<I>(
    image: &I,
    target: Dimensions,
    filter: ResampleFilter,
) -> ImageBuffer<I::Pixel, Vec<<I::Pixel as Pixel>::Subpixel>>
where
    I: GenericImageView,
    I::Pixel: 'static,
{
    let fitted = fit_dimensions(Dimensions::of(image), target);
    resize_exact(image, fitted, filter)
}

/// Resize `image` to exactly `target`, ignoring aspect ratio.
#[must_use = "returns the resized image"]
pub fn resize_exact<I>(
    image: &I,
    target: Dimensions,
    filter: ResampleFilter,
) -> ImageBuffer<I::Pixel, Vec<<I::Pixel as Pixel>::Subpixel>>
where
    I: GenericImageView,
    I::Pixel: 'static,
{
    image::imageops::resize(image, target.width, target.height, filter.to_image_filter())
}
