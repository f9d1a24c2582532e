//! Shared types for the pcbscan inspection pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierError;
use crate::color::{Hsv, HsvRange};
use crate::resize::ResampleFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference decoded
/// and annotated images without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimension pair.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of any image buffer or view.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Per-axis maximum of two dimension pairs.
    #[must_use]
    pub fn max_per_axis(self, other: Self) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned box in pixel coordinates, `x2`/`y2` exclusive.
///
/// A well-formed box has `x1 < x2` and `y1 < y2`. Boxes produced by
/// region extraction are padded and may extend past the image on any
/// side; use [`clamp_to`](Self::clamp_to) before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge (exclusive).
    pub x2: i32,
    /// Bottom edge (exclusive).
    pub y2: i32,
}

impl BoundingBox {
    /// Create a box, returning `None` unless `x1 < x2` and `y1 < y2`.
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Box from a top-left corner and a size, as produced by contour
    /// bounding rectangles. Zero sizes are widened to one pixel.
    #[must_use]
    pub fn from_rect(x: u32, y: u32, width: u32, height: u32) -> Self {
        let x1 = i32::try_from(x).unwrap_or(i32::MAX);
        let y1 = i32::try_from(y).unwrap_or(i32::MAX);
        let w = i32::try_from(width.max(1)).unwrap_or(i32::MAX);
        let h = i32::try_from(height.max(1)).unwrap_or(i32::MAX);
        Self {
            x1,
            y1,
            x2: x1.saturating_add(w),
            y2: y1.saturating_add(h),
        }
    }

    /// Grow the box by `offset` pixels on all four sides.
    #[must_use]
    pub const fn padded(self, offset: i32) -> Self {
        Self {
            x1: self.x1.saturating_sub(offset),
            y1: self.y1.saturating_sub(offset),
            x2: self.x2.saturating_add(offset),
            y2: self.y2.saturating_add(offset),
        }
    }

    /// Intersect with the `[0, width) x [0, height)` image frame.
    ///
    /// Returns `None` when the intersection is empty.
    #[must_use]
    pub fn clamp_to(self, dimensions: Dimensions) -> Option<Self> {
        let w = i32::try_from(dimensions.width).unwrap_or(i32::MAX);
        let h = i32::try_from(dimensions.height).unwrap_or(i32::MAX);
        Self::new(
            self.x1.clamp(0, w),
            self.y1.clamp(0, h),
            self.x2.clamp(0, w),
            self.y2.clamp(0, h),
        )
    }

    /// Horizontal extent (`x2 - x1`).
    #[must_use]
    pub const fn width(self) -> i32 {
        self.x2 - self.x1
    }

    /// Vertical extent (`y2 - y1`).
    #[must_use]
    pub const fn height(self) -> i32 {
        self.y2 - self.y1
    }
}

/// The closed set of defect categories.
///
/// The declaration order is the classifier's output order: score index
/// `i` belongs to `DefectCategory::ALL[i]`. Reordering the variants
/// without retraining the model silently mislabels every defect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DefectCategory {
    /// Broken trace.
    Open,
    /// Unintended connection between traces.
    Short,
    /// Bitten-out trace edge.
    Mousebite,
    /// Spur extending from a trace.
    Protrusion,
    /// Spurious copper deposit.
    Copper,
    /// Small hole in copper.
    PinHole,
}

impl DefectCategory {
    /// Every category, in classifier output order.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Short,
        Self::Mousebite,
        Self::Protrusion,
        Self::Copper,
        Self::PinHole,
    ];

    /// Position of this category in [`ALL`](Self::ALL).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Category for a classifier output index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short lowercase name used in labels, reports, and file names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Short => "short",
            Self::Mousebite => "mousebite",
            Self::Protrusion => "protrusion",
            Self::Copper => "copper",
            Self::PinHole => "pin-hole",
        }
    }
}

impl fmt::Display for DefectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unrecognized category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown defect category {0:?}")]
pub struct ParseCategoryError(pub String);

impl FromStr for DefectCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// A classified region. Order in a defect list is discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    /// Padded region, possibly extending outside the image.
    pub bbox: BoundingBox,
    /// Predicted category.
    pub category: DefectCategory,
}

/// Letter grade derived from a similarity percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// `>= 90`.
    A,
    /// `>= 80`.
    B,
    /// `>= 70`.
    C,
    /// `>= 60`.
    D,
    /// Everything else, including NaN.
    F,
}

impl Grade {
    /// Grade for a percentage. Lower bounds are inclusive.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::A
        } else if percentage >= 80.0 {
            Self::B
        } else if percentage >= 70.0 {
            Self::C
        } else if percentage >= 60.0 {
            Self::D
        } else {
            Self::F
        }
    }

    /// Single-letter representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural similarity between a test image and its reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Mean SSIM scaled to `[0, 100]`.
    pub percentage: f64,
    /// Grade band for `percentage`.
    pub grade: Grade,
}

impl SimilarityResult {
    /// Build a result, clamping the percentage into `[0, 100]`.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        let percentage = percentage.clamp(0.0, 100.0);
        Self {
            percentage,
            grade: Grade::from_percentage(percentage),
        }
    }
}

/// Configuration for the inspection pipeline.
///
/// Every field has a `DEFAULT_*` associated constant so the CLI and
/// tests can refer to the same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// Grayscale difference above which a pixel is highlighted in the
    /// review image.
    pub diff_threshold: u8,

    /// HSV band selecting marker-painted pixels during region extraction.
    /// Hue uses the 8-bit `0..180` convention.
    pub marker_band: HsvRange,

    /// Structuring element radius for opening/closing (`1` = 3x3 square).
    pub morphology_radius: u8,

    /// Context margin added on every side of an extracted region.
    pub region_padding: i32,

    /// Side length of the square classifier input.
    pub classifier_input_size: u32,

    /// Grayscale cutoff separating foreground shapes for the netlist.
    pub netlist_threshold: u8,

    /// Resampling filter for every resize in the pipeline.
    pub resample_filter: ResampleFilter,
}

impl InspectionConfig {
    /// Default review-image difference cutoff.
    pub const DEFAULT_DIFF_THRESHOLD: u8 = 30;
    /// Default marker band: green hues, any saturation and value.
    pub const DEFAULT_MARKER_BAND: HsvRange = HsvRange {
        lower: Hsv { h: 36, s: 0, v: 0 },
        upper: Hsv {
            h: 70,
            s: 255,
            v: 255,
        },
    };
    /// Default morphology radius (3x3 element).
    pub const DEFAULT_MORPHOLOGY_RADIUS: u8 = 1;
    /// Default region padding in pixels.
    pub const DEFAULT_REGION_PADDING: i32 = 20;
    /// Default classifier input side length.
    pub const DEFAULT_CLASSIFIER_INPUT_SIZE: u32 = 224;
    /// Default netlist foreground cutoff.
    pub const DEFAULT_NETLIST_THRESHOLD: u8 = 127;
    /// Default resampling filter.
    pub const DEFAULT_RESAMPLE_FILTER: ResampleFilter = ResampleFilter::Triangle;

    /// Check invariants that serde and the CLI cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.region_padding < 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "region_padding must be non-negative, got {}",
                self.region_padding
            )));
        }
        if self.classifier_input_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "classifier_input_size must be positive".to_string(),
            ));
        }
        let HsvRange { lower, upper } = self.marker_band;
        if lower.h > upper.h || lower.s > upper.s || lower.v > upper.v {
            return Err(PipelineError::InvalidConfig(format!(
                "marker_band lower bound {lower:?} exceeds upper bound {upper:?}"
            )));
        }
        if upper.h > Hsv::MAX_HUE {
            return Err(PipelineError::InvalidConfig(format!(
                "marker_band hue must be at most {}, got {}",
                Hsv::MAX_HUE,
                upper.h
            )));
        }
        Ok(())
    }
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            diff_threshold: Self::DEFAULT_DIFF_THRESHOLD,
            marker_band: Self::DEFAULT_MARKER_BAND,
            morphology_radius: Self::DEFAULT_MORPHOLOGY_RADIUS,
            region_padding: Self::DEFAULT_REGION_PADDING,
            classifier_input_size: Self::DEFAULT_CLASSIFIER_INPUT_SIZE,
            netlist_threshold: Self::DEFAULT_NETLIST_THRESHOLD,
            resample_filter: Self::DEFAULT_RESAMPLE_FILTER,
        }
    }
}

/// Errors that abort a whole inspection run.
///
/// Per-region crop failures are not represented here; they are
/// recovered as [`RegionGeometryError`](crate::RegionGeometryError)
/// skips.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input file could not be opened or decoded.
    #[error("failed to read image {}: {source}", path.display())]
    ImageOpen {
        /// The offending path.
        path: PathBuf,
        /// Underlying decoder or I/O error.
        #[source]
        source: image::ImageError,
    },

    /// In-memory image bytes could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Test and reference shapes differ even after normalization.
    #[error("cannot reconcile image dimensions: test is {test}, reference is {reference}")]
    DimensionMismatch {
        /// Test image dimensions after resizing.
        test: Dimensions,
        /// Reference image dimensions after resizing.
        reference: Dimensions,
    },

    /// The image is too small for a similarity window.
    #[error("image {dimensions} is too small to score, need at least {minimum}x{minimum}")]
    ImageTooSmall {
        /// Offending image dimensions.
        dimensions: Dimensions,
        /// Minimum side length.
        minimum: u32,
    },

    /// The classifier picked an index with no matching category.
    #[error("classifier predicted class index {index}, only {known} defect categories exist")]
    UnknownCategory {
        /// Predicted index.
        index: usize,
        /// Number of known categories.
        known: usize,
    },

    /// The classifier's output width does not match the category table.
    #[error("classifier produces {actual} scores, expected {expected}")]
    ClassifierWidth {
        /// Number of categories.
        expected: usize,
        /// Scores the classifier produces.
        actual: usize,
    },

    /// The inference backend failed.
    #[error("classifier inference failed: {0}")]
    Inference(#[from] ClassifierError),

    /// Inspection configuration is invalid.
    #[error("invalid inspection configuration: {0}")]
    InvalidConfig(String),
}
