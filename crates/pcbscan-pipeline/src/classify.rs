//! Defect classification of candidate regions.
//!
//! This module defines the [`Classifier`] trait for pluggable inference
//! backends and the adapter that turns a padded candidate box into a
//! [`DefectCategory`].
//!
//! # Strategy pattern
//!
//! The model is an injected capability: anything that maps a square RGB
//! crop to one score per category can back the pipeline. The crate ships
//! [`FixedClassifier`], which returns the same scores for every crop and
//! serves as a test double, and, with the `onnx` feature,
//! `OnnxClassifier` for exported models.

use image::imageops;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::resize::{ResampleFilter, resize_exact};
use crate::types::{BoundingBox, Defect, DefectCategory, Dimensions, PipelineError, RgbImage};

/// Channel order of a flattened classifier tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red (models trained on BGR-decoded images).
    Bgr,
}

/// A square RGB crop ready for inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierInput {
    image: RgbImage,
}

impl ClassifierInput {
    /// The crop as an image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Side length in pixels.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    /// Flatten into a batch-of-one `NHWC` tensor with raw `0..=255`
    /// intensities in the requested channel order.
    #[must_use]
    pub fn to_nhwc(&self, order: ChannelOrder) -> Vec<f32> {
        self.image
            .pixels()
            .flat_map(|p| {
                let [r, g, b] = p.0;
                match order {
                    ChannelOrder::Rgb => [r, g, b],
                    ChannelOrder::Bgr => [b, g, r],
                }
            })
            .map(f32::from)
            .collect()
    }
}

/// Failure reported by an inference backend.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The model could not be loaded.
    #[error("failed to load model {}: {reason}", path.display())]
    Load {
        /// Model file.
        path: std::path::PathBuf,
        /// Loader message.
        reason: String,
    },

    /// The backend rejected or failed the request.
    #[error("inference backend error: {0}")]
    Backend(String),
}

/// Trait for inference backends.
///
/// Input: one square RGB crop. Output: one score per category, indexed
/// in [`DefectCategory::ALL`] order. Backends are shared read-only, so
/// `predict` takes `&self`; a backend that is not thread-safe simply
/// does not implement `Sync`.
pub trait Classifier {
    /// Number of scores every prediction returns.
    fn num_classes(&self) -> usize;

    /// Score a single crop.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError`] if the backend fails.
    fn predict(&self, input: &ClassifierInput) -> Result<Vec<f32>, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn predict(&self, input: &ClassifierInput) -> Result<Vec<f32>, ClassifierError> {
        (**self).predict(input)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn predict(&self, input: &ClassifierInput) -> Result<Vec<f32>, ClassifierError> {
        (**self).predict(input)
    }
}

/// Classifier that returns the same scores for every crop.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedClassifier {
    scores: Vec<f32>,
}

impl FixedClassifier {
    /// Return `scores` for every prediction.
    #[must_use]
    pub const fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }

    /// One-hot scores selecting `category`.
    #[must_use]
    pub fn for_category(category: DefectCategory) -> Self {
        let scores = DefectCategory::ALL
            .iter()
            .map(|&c| if c == category { 1.0 } else { 0.0 })
            .collect();
        Self { scores }
    }
}

impl Classifier for FixedClassifier {
    fn num_classes(&self) -> usize {
        self.scores.len()
    }

    fn predict(&self, _input: &ClassifierInput) -> Result<Vec<f32>, ClassifierError> {
        Ok(self.scores.clone())
    }
}

/// Why a candidate region was dropped instead of classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionGeometryError {
    /// The box does not overlap the image at all.
    #[error("region {bbox:?} lies entirely outside the {dimensions} image")]
    OutOfBounds {
        /// The offending box.
        bbox: BoundingBox,
        /// Image it was cropped from.
        dimensions: Dimensions,
    },
}

/// A region that was dropped, kept so coverage loss stays observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRegion {
    /// The padded candidate box.
    pub bbox: BoundingBox,
    /// Human-readable reason.
    pub reason: String,
}

/// Result of classifying one candidate region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionOutcome {
    /// The region was classified.
    Classified(DefectCategory),
    /// The region could not be cropped and was dropped.
    Skipped(RegionGeometryError),
}

/// Crop `image` to `bbox` after clamping it to the image frame.
///
/// # Errors
///
/// Returns [`RegionGeometryError::OutOfBounds`] if the clamped box is
/// empty.
pub fn crop_region(image: &RgbImage, bbox: BoundingBox) -> Result<RgbImage, RegionGeometryError> {
    let dimensions = Dimensions::of(image);
    let clamped = bbox
        .clamp_to(dimensions)
        .ok_or(RegionGeometryError::OutOfBounds { bbox, dimensions })?;
    let view = imageops::crop_imm(
        image,
        clamped.x1.unsigned_abs(),
        clamped.y1.unsigned_abs(),
        clamped.width().unsigned_abs(),
        clamped.height().unsigned_abs(),
    );
    Ok(view.to_image())
}

/// Crop `bbox` out of `image` and resize it to the classifier's square
/// input.
///
/// # Errors
///
/// Returns [`RegionGeometryError`] if the box cannot be cropped.
pub fn prepare_input(
    image: &RgbImage,
    bbox: BoundingBox,
    size: u32,
    filter: ResampleFilter,
) -> Result<ClassifierInput, RegionGeometryError> {
    let crop = crop_region(image, bbox)?;
    let image = if crop.dimensions() == (size, size) {
        crop
    } else {
        resize_exact(&crop, Dimensions::new(size, size), filter)
    };
    Ok(ClassifierInput { image })
}

/// Index of the largest score; the first one wins ties.
///
/// NaN scores never beat a number; an all-NaN slice yields index 0.
/// Returns `None` for an empty slice.
#[must_use]
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b || s.is_nan() => {}
            None if s.is_nan() => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i).or_else(|| (!scores.is_empty()).then_some(0))
}

/// Map a score vector to a category.
///
/// # Errors
///
/// Returns [`PipelineError::ClassifierWidth`] for an empty vector and
/// [`PipelineError::UnknownCategory`] when the winning index has no
/// category.
pub fn category_from_scores(scores: &[f32]) -> Result<DefectCategory, PipelineError> {
    let index = argmax(scores).ok_or(PipelineError::ClassifierWidth {
        expected: DefectCategory::ALL.len(),
        actual: 0,
    })?;
    DefectCategory::from_index(index).ok_or(PipelineError::UnknownCategory {
        index,
        known: DefectCategory::ALL.len(),
    })
}

/// Check that a classifier produces one score per category.
///
/// # Errors
///
/// Returns [`PipelineError::ClassifierWidth`] on a mismatch.
pub fn check_width<C: Classifier + ?Sized>(classifier: &C) -> Result<(), PipelineError> {
    let actual = classifier.num_classes();
    let expected = DefectCategory::ALL.len();
    if actual == expected {
        Ok(())
    } else {
        Err(PipelineError::ClassifierWidth { expected, actual })
    }
}

/// Classify one candidate region of `image`.
///
/// Geometry failures are recovered as [`RegionOutcome::Skipped`] and
/// logged; backend failures and unknown class indices abort.
///
/// # Errors
///
/// Returns [`PipelineError::Inference`] if the backend fails, or the
/// errors of [`category_from_scores`].
pub fn classify_region<C: Classifier + ?Sized>(
    classifier: &C,
    image: &RgbImage,
    bbox: BoundingBox,
    input_size: u32,
    filter: ResampleFilter,
) -> Result<RegionOutcome, PipelineError> {
    let input = match prepare_input(image, bbox, input_size, filter) {
        Ok(input) => input,
        Err(e) => {
            warn!(?bbox, error = %e, "skipping region");
            return Ok(RegionOutcome::Skipped(e));
        }
    };

    let scores = classifier.predict(&input)?;
    let category = category_from_scores(&scores)?;
    debug!(?bbox, %category, ?scores, "classified region");
    Ok(RegionOutcome::Classified(category))
}

/// Classify every box in `boxes`, in order.
///
/// Boxes that cannot be cropped are recorded as skipped and do not
/// disturb the defects classified before or after them.
///
/// # Errors
///
/// Same as [`classify_region`]; the first fatal error aborts the batch.
pub fn classify_regions<C: Classifier + ?Sized>(
    classifier: &C,
    image: &RgbImage,
    boxes: &[BoundingBox],
    input_size: u32,
    filter: ResampleFilter,
) -> Result<(Vec<Defect>, Vec<SkippedRegion>), PipelineError> {
    let mut defects = Vec::with_capacity(boxes.len());
    let mut skipped = Vec::new();
    for &bbox in boxes {
        match classify_region(classifier, image, bbox, input_size, filter)? {
            RegionOutcome::Classified(category) => defects.push(Defect { bbox, category }),
            RegionOutcome::Skipped(e) => skipped.push(SkippedRegion {
                bbox,
                reason: e.to_string(),
            }),
        }
    }
    Ok((defects, skipped))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    fn image() -> RgbImage {
        RgbImage::from_fn(100, 80, |x, y| Rgb([x as u8, y as u8, 7]))
    }

    fn bbox(x1: i32, y1: i32, x2: i32, y2: i32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.0, 0.0, 0.9]), Some(2));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn argmax_ignores_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.1]), Some(1));
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), Some(0));
    }

    #[test]
    fn category_from_scores_maps_index() {
        let scores = [0.0, 0.1, 0.0, 0.0, 0.0, 0.8];
        assert_eq!(category_from_scores(&scores).unwrap(), DefectCategory::PinHole);
    }

    #[test]
    fn out_of_table_index_is_fatal() {
        let scores = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.9];
        assert!(matches!(
            category_from_scores(&scores),
            Err(PipelineError::UnknownCategory { index: 6, known: 6 })
        ));
    }

    #[test]
    fn crop_clamps_padded_box() {
        let crop = crop_region(&image(), bbox(-20, -10, 30, 25)).unwrap();
        assert_eq!(crop.dimensions(), (30, 25));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([0, 0, 7]));
    }

    #[test]
    fn crop_inside_keeps_offsets() {
        let crop = crop_region(&image(), bbox(10, 20, 15, 22)).unwrap();
        assert_eq!(crop.dimensions(), (5, 2));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([10, 20, 7]));
    }

    #[test]
    fn crop_outside_is_a_geometry_error() {
        let err = crop_region(&image(), bbox(150, 10, 170, 30)).unwrap_err();
        assert!(matches!(err, RegionGeometryError::OutOfBounds { .. }));
    }

    #[test]
    fn prepared_input_has_model_shape() {
        let input = prepare_input(&image(), bbox(5, 5, 40, 60), 224, ResampleFilter::Triangle)
            .unwrap();
        assert_eq!(input.image().dimensions(), (224, 224));
        assert_eq!(input.size(), 224);
        assert_eq!(input.to_nhwc(ChannelOrder::Rgb).len(), 224 * 224 * 3);
    }

    #[test]
    fn nhwc_respects_channel_order() {
        let input = ClassifierInput {
            image: RgbImage::from_pixel(1, 1, Rgb([1, 2, 3])),
        };
        assert_eq!(input.to_nhwc(ChannelOrder::Rgb), [1.0, 2.0, 3.0]);
        assert_eq!(input.to_nhwc(ChannelOrder::Bgr), [3.0, 2.0, 1.0]);
    }

    #[test]
    fn classify_region_uses_classifier_scores() {
        let classifier = FixedClassifier::for_category(DefectCategory::Mousebite);
        let outcome = classify_region(
            &classifier,
            &image(),
            bbox(10, 10, 50, 50),
            224,
            ResampleFilter::Triangle,
        )
        .unwrap();
        assert_eq!(outcome, RegionOutcome::Classified(DefectCategory::Mousebite));
    }

    #[test]
    fn classify_region_skips_unreachable_box() {
        let classifier = FixedClassifier::for_category(DefectCategory::Open);
        let outcome = classify_region(
            &classifier,
            &image(),
            bbox(-50, -50, -10, -10),
            224,
            ResampleFilter::Triangle,
        )
        .unwrap();
        assert!(matches!(outcome, RegionOutcome::Skipped(_)));
    }

    #[test]
    fn malformed_box_in_a_batch_is_skipped_alone() {
        let classifier = FixedClassifier::for_category(DefectCategory::Protrusion);
        let boxes = [bbox(5, 5, 30, 30), bbox(150, 10, 170, 30), bbox(40, 20, 90, 70)];
        let (defects, skipped) =
            classify_regions(&classifier, &image(), &boxes, 32, ResampleFilter::Nearest).unwrap();
        assert_eq!(
            defects,
            [
                Defect {
                    bbox: boxes[0],
                    category: DefectCategory::Protrusion
                },
                Defect {
                    bbox: boxes[2],
                    category: DefectCategory::Protrusion
                },
            ]
        );
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].bbox, boxes[1]);
        assert!(skipped[0].reason.contains("outside"));
    }

    #[test]
    fn classify_region_propagates_backend_failure() {
        struct Failing;
        impl Classifier for Failing {
            fn num_classes(&self) -> usize {
                6
            }
            fn predict(&self, _: &ClassifierInput) -> Result<Vec<f32>, ClassifierError> {
                Err(ClassifierError::Backend("session closed".to_string()))
            }
        }
        let result = classify_region(
            &Failing,
            &image(),
            bbox(0, 0, 10, 10),
            224,
            ResampleFilter::Triangle,
        );
        assert!(matches!(result, Err(PipelineError::Inference(_))));
    }

    #[test]
    fn check_width_rejects_mismatched_model() {
        assert!(check_width(&FixedClassifier::new(vec![0.0; 6])).is_ok());
        assert!(matches!(
            check_width(&FixedClassifier::new(vec![0.0; 5])),
            Err(PipelineError::ClassifierWidth {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn boxed_classifier_is_a_classifier() {
        let boxed: Box<dyn Classifier> =
            Box::new(FixedClassifier::for_category(DefectCategory::Copper));
        assert_eq!(boxed.num_classes(), 6);
        assert!(check_width(&boxed).is_ok());
    }
}
