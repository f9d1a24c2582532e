//! The inspection entry point.
//!
//! An [`Inspector`] is built once with a classifier backend and a
//! configuration, then analyzes any number of test/reference pairs.
//! It holds no state between calls.
//!
//! # Stages
//!
//! 1. Decode both inputs (path entry only)
//! 2. Similarity score and grade
//! 3. Highlighted-difference image
//! 4. Candidate region extraction
//! 5. Per-region classification; uncroppable regions are skipped

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::aggregate::LabelStyle;
use crate::classify::{Classifier, SkippedRegion, check_width, classify_regions};
use crate::decode::open_rgb;
use crate::diagnostics::{
    Clock, InspectionDiagnostics, InspectionSummary, StageDiagnostics, StageMetrics,
};
use crate::diff::highlight;
use crate::mask::count_foreground;
use crate::netlist::{Netlist, synthesize};
use crate::regions::extract_regions;
use crate::report::{DefectReport, build_report};
use crate::similarity::score;
use crate::types::{
    Defect, Dimensions, InspectionConfig, PipelineError, RgbImage, SimilarityResult,
};

/// Result of analyzing one test/reference pair.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Test image on the common comparison grid. Defect boxes are in
    /// its coordinates.
    pub test_image: RgbImage,
    /// Classified defects in discovery order.
    pub defects: Vec<Defect>,
    /// Similarity to the reference.
    pub similarity: SimilarityResult,
    /// Test image with changed pixels painted red.
    pub diff_image: RgbImage,
    /// Candidate regions dropped before classification.
    pub skipped: Vec<SkippedRegion>,
}

impl Analysis {
    /// Assemble the defect report, including skipped regions.
    #[must_use = "returns the report"]
    pub fn report(&self, style: &LabelStyle) -> DefectReport {
        build_report(&self.test_image, &self.defects, self.similarity, style)
            .with_skipped(self.skipped.clone())
    }
}

/// Netlist for `defects` on `test_image` with the default foreground
/// threshold.
#[must_use = "returns the netlist"]
pub fn synthesize_netlist(test_image: &RgbImage, defects: &[Defect]) -> Netlist {
    synthesize(
        test_image,
        defects,
        InspectionConfig::DEFAULT_NETLIST_THRESHOLD,
    )
}

/// Defect inspector bound to one classifier backend.
///
/// `Inspector<C>` is `Sync` whenever `C` is, so a thread-safe backend can
/// serve concurrent analyses from a shared reference.
#[derive(Debug)]
pub struct Inspector<C> {
    classifier: C,
    config: InspectionConfig,
}

impl<C: Classifier> Inspector<C> {
    /// Bind `classifier` to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` is
    /// inconsistent and [`PipelineError::ClassifierWidth`] if the
    /// classifier does not produce exactly one score per category.
    pub fn new(classifier: C, config: InspectionConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        check_width(&classifier)?;
        Ok(Self { classifier, config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &InspectionConfig {
        &self.config
    }

    /// The classifier backend.
    #[must_use]
    pub const fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Analyze the images stored at `test_path` and `reference_path`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageOpen`] if either file cannot be read,
    /// plus every error of [`analyze_images`](Self::analyze_images).
    pub fn analyze(&self, test_path: &Path, reference_path: &Path) -> Result<Analysis, PipelineError> {
        self.analyze_with_diagnostics(test_path, reference_path, &NoClock)
            .map(|(analysis, _)| analysis)
    }

    /// Analyze already decoded images.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the images cannot
    /// be brought onto a common grid, [`PipelineError::ImageTooSmall`] if
    /// the reference is too small to score, and classification errors
    /// ([`PipelineError::Inference`], [`PipelineError::UnknownCategory`]).
    pub fn analyze_images(
        &self,
        test: &RgbImage,
        reference: &RgbImage,
    ) -> Result<Analysis, PipelineError> {
        self.run(test, reference, None, &NoClock)
            .map(|(analysis, _)| analysis)
    }

    /// Like [`analyze`](Self::analyze), also returning per-stage
    /// diagnostics timed with `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`analyze`](Self::analyze).
    pub fn analyze_with_diagnostics<K: Clock>(
        &self,
        test_path: &Path,
        reference_path: &Path,
        clock: &K,
    ) -> Result<(Analysis, InspectionDiagnostics), PipelineError> {
        let start = clock.now();
        let test = open_rgb(test_path)?;
        let reference = open_rgb(reference_path)?;
        let decode = StageDiagnostics {
            duration: clock.elapsed(&start),
            metrics: StageMetrics::Decode {
                test: Dimensions::of(&test),
                reference: Dimensions::of(&reference),
            },
        };
        let (analysis, mut diagnostics) = self.run(&test, &reference, Some(decode), clock)?;
        diagnostics.total_duration = clock.elapsed(&start);
        Ok((analysis, diagnostics))
    }

    /// Like [`analyze_images`](Self::analyze_images), also returning
    /// per-stage diagnostics timed with `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`analyze_images`](Self::analyze_images).
    pub fn analyze_images_with_diagnostics<K: Clock>(
        &self,
        test: &RgbImage,
        reference: &RgbImage,
        clock: &K,
    ) -> Result<(Analysis, InspectionDiagnostics), PipelineError> {
        self.run(test, reference, None, clock)
    }

    /// Netlist for an analysis, using the configured threshold.
    #[must_use = "returns the netlist"]
    pub fn netlist(&self, analysis: &Analysis) -> Netlist {
        synthesize(
            &analysis.test_image,
            &analysis.defects,
            self.config.netlist_threshold,
        )
    }

    fn run<K: Clock>(
        &self,
        test: &RgbImage,
        reference: &RgbImage,
        decode: Option<StageDiagnostics>,
        clock: &K,
    ) -> Result<(Analysis, InspectionDiagnostics), PipelineError> {
        let config = &self.config;
        let start = clock.now();

        let t = clock.now();
        let similarity = score(test, reference, config.resample_filter)?;
        let similarity_diag = StageDiagnostics {
            duration: clock.elapsed(&t),
            metrics: StageMetrics::Similarity {
                percentage: similarity.percentage,
                grade: similarity.grade,
            },
        };

        let t = clock.now();
        let highlighted = highlight(test, reference, config.diff_threshold, config.resample_filter)?;
        let difference_diag = StageDiagnostics {
            duration: clock.elapsed(&t),
            metrics: StageMetrics::Difference {
                highlighted_pixels: count_foreground(&highlighted.changed),
                total_pixel_count: Dimensions::of(&highlighted.image).pixel_count(),
            },
        };
        let diff_image = highlighted.image;

        let t = clock.now();
        let regions = extract_regions(test, reference, config)?;
        let extraction_diag = StageDiagnostics {
            duration: clock.elapsed(&t),
            metrics: StageMetrics::RegionExtraction {
                otsu_level: regions.otsu_level,
                mask_pixels: count_foreground(&regions.mask),
                region_count: regions.boxes.len(),
            },
        };

        let t = clock.now();
        let (defects, skipped) = classify_regions(
            &self.classifier,
            &regions.test_image,
            &regions.boxes,
            config.classifier_input_size,
            config.resample_filter,
        )?;
        let classification_diag = StageDiagnostics {
            duration: clock.elapsed(&t),
            metrics: StageMetrics::Classification {
                classified: defects.len(),
                skipped: skipped.len(),
            },
        };

        let dimensions = Dimensions::of(&regions.test_image);
        info!(
            %dimensions,
            similarity = similarity.percentage,
            grade = %similarity.grade,
            regions = regions.boxes.len(),
            defects = defects.len(),
            skipped = skipped.len(),
            "analysis complete"
        );

        let diagnostics = InspectionDiagnostics {
            decode,
            similarity: similarity_diag,
            difference: difference_diag,
            region_extraction: extraction_diag,
            classification: classification_diag,
            total_duration: clock.elapsed(&start),
            summary: InspectionSummary {
                dimensions,
                region_count: regions.boxes.len(),
                defect_count: defects.len(),
                skipped_count: skipped.len(),
            },
        };

        let analysis = Analysis {
            test_image: regions.test_image,
            defects,
            similarity,
            diff_image,
            skipped,
        };
        Ok((analysis, diagnostics))
    }
}

/// Clock that never advances, for callers that skip diagnostics.
struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}
