//! Report assembly.
//!
//! A [`DefectReport`] bundles everything a renderer needs: the defect
//! list, counts, annotated images, similarity and remediation text.
//! [`ReportSummary`] is its image-free, serializable part.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{CategoryCounts, LabelStyle, aggregate};
use crate::classify::SkippedRegion;
use crate::feedback::feedback;
use crate::types::{Defect, DefectCategory, RgbImage, SimilarityResult};

/// Complete inspection report.
#[derive(Debug, Clone)]
pub struct DefectReport {
    /// Classified defects in discovery order.
    pub defects: Vec<Defect>,
    /// Defects per category, all six present.
    pub counts: CategoryCounts,
    /// Test image annotated with one category's defects, per category.
    pub category_images: BTreeMap<DefectCategory, RgbImage>,
    /// Test image annotated with every defect.
    pub combined_image: RgbImage,
    /// Similarity to the reference.
    pub similarity: SimilarityResult,
    /// One remediation line per category with defects.
    pub feedback: Vec<String>,
    /// Candidate regions dropped before classification.
    pub skipped_regions: Vec<SkippedRegion>,
}

impl DefectReport {
    /// Attach the regions that were dropped during classification.
    #[must_use]
    pub fn with_skipped(mut self, skipped: Vec<SkippedRegion>) -> Self {
        self.skipped_regions = skipped;
        self
    }

    /// Image-free summary for serialization.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            similarity: self.similarity,
            defects: self.defects.clone(),
            counts: self.counts.clone(),
            feedback: self.feedback.clone(),
            skipped_regions: self.skipped_regions.clone(),
        }
    }
}

/// Serializable part of a [`DefectReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Similarity to the reference.
    pub similarity: SimilarityResult,
    /// Classified defects in discovery order.
    pub defects: Vec<Defect>,
    /// Defects per category.
    pub counts: CategoryCounts,
    /// Remediation lines.
    pub feedback: Vec<String>,
    /// Dropped candidate regions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_regions: Vec<SkippedRegion>,
}

/// Assemble the report for `defects` found on `test_image`.
///
/// Never fails: an empty defect list yields zero counts, unannotated
/// images and no feedback.
#[must_use = "returns the report"]
pub fn build_report(
    test_image: &RgbImage,
    defects: &[Defect],
    similarity: SimilarityResult,
    style: &LabelStyle,
) -> DefectReport {
    let annotated = aggregate(test_image, defects, style);
    let feedback = feedback(&annotated.counts);

    info!(
        defects = defects.len(),
        similarity = similarity.percentage,
        grade = %similarity.grade,
        "built defect report"
    );

    DefectReport {
        defects: defects.to_vec(),
        counts: annotated.counts,
        category_images: annotated.per_category,
        combined_image: annotated.combined,
        similarity,
        feedback,
        skipped_regions: Vec::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::types::{BoundingBox, Grade};

    fn defect(category: DefectCategory) -> Defect {
        Defect {
            bbox: BoundingBox::new(4, 4, 20, 20).unwrap(),
            category,
        }
    }

    #[test]
    fn empty_defects_build_an_empty_report() {
        let img = RgbImage::from_pixel(32, 32, Rgb([1, 2, 3]));
        let report = build_report(
            &img,
            &[],
            SimilarityResult::from_percentage(100.0),
            &LabelStyle::default(),
        );
        assert!(report.defects.is_empty());
        assert!(report.feedback.is_empty());
        assert_eq!(report.counts.total(), 0);
        assert_eq!(report.category_images.len(), 6);
        assert_eq!(report.combined_image, img);
        assert_eq!(report.similarity.grade, Grade::A);
    }

    #[test]
    fn feedback_matches_counts() {
        let img = RgbImage::new(32, 32);
        let defects = [
            defect(DefectCategory::Copper),
            defect(DefectCategory::Open),
            defect(DefectCategory::Copper),
        ];
        let report = build_report(
            &img,
            &defects,
            SimilarityResult::from_percentage(72.0),
            &LabelStyle::default(),
        );
        assert_eq!(report.counts.total(), 3);
        assert_eq!(report.feedback.len(), 2);
        assert!(report.feedback[0].starts_with("1 open(s)"));
        assert!(report.feedback[1].starts_with("2 copper(s)"));
    }

    #[test]
    fn summary_serializes_without_images() {
        let img = RgbImage::new(32, 32);
        let skipped = vec![SkippedRegion {
            bbox: BoundingBox::new(-50, -50, -40, -40).unwrap(),
            reason: "outside".to_owned(),
        }];
        let report = build_report(
            &img,
            &[defect(DefectCategory::Short)],
            SimilarityResult::from_percentage(85.5),
            &LabelStyle::default(),
        )
        .with_skipped(skipped);

        let summary = report.summary();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["similarity"]["grade"], "B");
        assert_eq!(json["defects"][0]["category"], "short");
        assert_eq!(json["counts"]["short"], 1);
        assert_eq!(json["skipped_regions"].as_array().unwrap().len(), 1);

        let back: ReportSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}
