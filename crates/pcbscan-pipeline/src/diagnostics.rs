//! Inspection diagnostics: timing and counts for each stage.
//!
//! Collected by [`Inspector::analyze_with_diagnostics`](crate::Inspector::analyze_with_diagnostics)
//! alongside the analysis itself. Time is read through the [`Clock`]
//! trait so the core never touches a platform timer directly; callers
//! supply one backed by `std::time::Instant` or a test double.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Grade};

/// Monotonic time source.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single inspection.
///
/// `decode` is `None` when the caller supplied decoded images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionDiagnostics {
    /// Decoding both input files.
    pub decode: Option<StageDiagnostics>,
    /// SSIM scoring.
    pub similarity: StageDiagnostics,
    /// Highlighted-difference image.
    pub difference: StageDiagnostics,
    /// XOR masking, morphology and contour boxes.
    pub region_extraction: StageDiagnostics,
    /// Cropping and classifying every candidate region.
    pub classification: StageDiagnostics,
    /// Total wall-clock duration of the inspection (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: InspectionSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Input decoding.
    Decode {
        /// Decoded test image size.
        test: Dimensions,
        /// Decoded reference image size.
        reference: Dimensions,
    },
    /// SSIM scoring.
    Similarity {
        /// Similarity percentage.
        percentage: f64,
        /// Grade band.
        grade: Grade,
    },
    /// Difference highlighting.
    Difference {
        /// Pixels painted as changed.
        highlighted_pixels: u64,
        /// Total pixel count for computing the changed share.
        total_pixel_count: u64,
    },
    /// Region extraction.
    RegionExtraction {
        /// Otsu level of the XOR image.
        otsu_level: u8,
        /// Foreground pixels in the cleaned candidate mask.
        mask_pixels: u64,
        /// Candidate boxes found.
        region_count: usize,
    },
    /// Region classification.
    Classification {
        /// Regions classified into a category.
        classified: usize,
        /// Regions dropped as uncroppable.
        skipped: usize,
    },
}

/// High-level summary counts for the inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionSummary {
    /// Size of the common grid both images were compared on.
    pub dimensions: Dimensions,
    /// Candidate regions found.
    pub region_count: usize,
    /// Defects classified.
    pub defect_count: usize,
    /// Regions skipped.
    pub skipped_count: usize,
}

impl InspectionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Inspection Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {} ({} pixels)",
            self.summary.dimensions,
            self.summary.dimensions.pixel_count(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Regions: {}  |  Defects: {}  |  Skipped: {}",
            self.summary.region_count, self.summary.defect_count, self.summary.skipped_count,
        ));

        lines.join("\n")
    }

    /// Stages that ran, in execution order.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = Vec::with_capacity(5);
        if let Some(decode) = &self.decode {
            stages.push(("Decode", decode));
        }
        stages.push(("Similarity", &self.similarity));
        stages.push(("Difference", &self.difference));
        stages.push(("Region Extraction", &self.region_extraction));
        stages.push(("Classification", &self.classification));
        stages
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode { test, reference } => {
            format!("test {test}, reference {reference}")
        }
        StageMetrics::Similarity { percentage, grade } => {
            format!("{percentage:.2}% grade {grade}")
        }
        StageMetrics::Difference {
            highlighted_pixels,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let share = if *total_pixel_count > 0 {
                *highlighted_pixels as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("{highlighted_pixels} changed ({share:.1}%)")
        }
        StageMetrics::RegionExtraction {
            otsu_level,
            mask_pixels,
            region_count,
        } => {
            format!("otsu={otsu_level} mask={mask_pixels} px, {region_count} regions")
        }
        StageMetrics::Classification {
            classified,
            skipped,
        } => format!("{classified} classified, {skipped} skipped"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample(decode: bool) -> InspectionDiagnostics {
        InspectionDiagnostics {
            decode: decode.then(|| {
                stage(
                    4,
                    StageMetrics::Decode {
                        test: Dimensions::new(100, 80),
                        reference: Dimensions::new(100, 80),
                    },
                )
            }),
            similarity: stage(
                10,
                StageMetrics::Similarity {
                    percentage: 93.25,
                    grade: Grade::A,
                },
            ),
            difference: stage(
                3,
                StageMetrics::Difference {
                    highlighted_pixels: 80,
                    total_pixel_count: 8000,
                },
            ),
            region_extraction: stage(
                12,
                StageMetrics::RegionExtraction {
                    otsu_level: 41,
                    mask_pixels: 120,
                    region_count: 2,
                },
            ),
            classification: stage(
                21,
                StageMetrics::Classification {
                    classified: 2,
                    skipped: 0,
                },
            ),
            total_duration: Duration::from_millis(50),
            summary: InspectionSummary {
                dimensions: Dimensions::new(100, 80),
                region_count: 2,
                defect_count: 2,
                skipped_count: 0,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn report_lists_every_stage_that_ran() {
        let report = sample(true).report();
        assert!(report.contains("Inspection Diagnostics Report"));
        assert!(report.contains("Image: 100x80 (8000 pixels)"));
        assert!(report.contains("Decode"));
        assert!(report.contains("93.25% grade A"));
        assert!(report.contains("80 changed (1.0%)"));
        assert!(report.contains("otsu=41"));
        assert!(report.contains("2 classified, 0 skipped"));
    }

    #[test]
    fn decode_row_is_omitted_for_in_memory_input() {
        let diag = sample(false);
        assert_eq!(diag.stages().len(), 4);
        assert!(!diag.report().contains("Decode"));
    }

    #[test]
    fn json_uses_fractional_seconds() {
        let json = serde_json::to_value(sample(true)).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.05).abs() < 1e-9);
        assert!((json["similarity"]["duration"].as_f64().unwrap() - 0.01).abs() < 1e-9);
        let back: InspectionDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.summary.defect_count, 2);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample(false)).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<InspectionDiagnostics>(json).is_err());
    }
}
